#[cfg(feature = "wavpack")]
mod build_wavpack;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "wavpack")]
    build_wavpack::build();
}
