use std::env;
use std::path::PathBuf;
use std::process::Command;

const WAVPACK_REPO: &str = "https://github.com/dbry/WavPack.git";

pub fn build() {
    println!("cargo:rerun-if-changed=build_wavpack.rs");
    println!("cargo:rerun-if-env-changed=WAVPACK_SRC_DIR");

    let wavpack_dir = locate_sources();

    let mut config = cc::Build::new();
    config.include(wavpack_dir.join("include"));

    // Decoder, encoder and the stream-reader entry points; no file-name or tag editing code.
    let source_files = [
        "src/common_utils.c",
        "src/decorr_utils.c",
        "src/entropy_utils.c",
        "src/extra1.c",
        "src/extra2.c",
        "src/open_utils.c",
        "src/open_legacy.c",
        "src/read_words.c",
        "src/unpack.c",
        "src/unpack_floats.c",
        "src/unpack_seek.c",
        "src/unpack_utils.c",
        "src/write_words.c",
        "src/pack.c",
        "src/pack_floats.c",
        "src/pack_utils.c",
        "src/pack_dns.c",
        "src/tags.c",
        "src/tag_utils.c",
    ];

    for file in &source_files {
        config.file(wavpack_dir.join(file));
    }

    config.define("PACKAGE_VERSION", "\"5.6.0\"");
    config.define("_FILE_OFFSET_BITS", "64");
    config.flag_if_supported("-w");

    config.compile("wavpack");
    println!("cargo:rustc-link-lib=static=wavpack");
}

fn locate_sources() -> PathBuf {
    if let Ok(dir) = env::var("WAVPACK_SRC_DIR") {
        let dir = PathBuf::from(dir);
        assert!(
            dir.join("include/wavpack.h").exists(),
            "WAVPACK_SRC_DIR does not contain include/wavpack.h"
        );
        return dir;
    }

    let vendored = PathBuf::from("vendor/wavpack-src");
    if vendored.join("include/wavpack.h").exists() {
        println!("cargo:warning=Using local WavPack source from vendor directory");
        return vendored;
    }

    let out_dir = PathBuf::from(env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let downloaded = out_dir.join("wavpack");
    if !downloaded.exists() {
        println!("cargo:warning=Cloning WavPack repository...");
        let status = Command::new("git")
            .args(["clone", "--depth", "1", WAVPACK_REPO])
            .arg(&downloaded)
            .status()
            .expect("Failed to run git. Set WAVPACK_SRC_DIR to a WavPack source tree instead.");
        assert!(status.success(), "Failed to clone WavPack repository");
    }
    assert!(
        downloaded.join("include/wavpack.h").exists(),
        "WavPack clone appears incomplete - missing include/wavpack.h"
    );
    downloaded
}
