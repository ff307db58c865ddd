//! Conversion between codec-native sample words and the internal sample domain.
//!
//! The internal domain is a full-range signed 32-bit integer. Narrower native
//! depths are widened into its high-order bits; narrowing rounds to the nearest
//! native step and clamps at the positive boundary, counting each clamp.
//!
//! Nothing here holds state: clip counts are returned or accumulated into a
//! caller-owned counter, so disjoint buffers can be converted concurrently.

use crate::codecs::SampleFormat;
use crate::prelude::*;

/// Buffers shorter than this are converted on the calling thread
const PARALLEL_THRESHOLD: usize = 64 * 1024;
const PARALLEL_CHUNK: usize = 16 * 1024;

/// 2^31, the magnitude of the internal domain
const SAMPLE_SCALE: f64 = SAMPLE_MAX as f64 + 1.0;

#[inline]
pub fn signed_8bit_to_sample(d: i32) -> Sample {
    d << 24
}

#[inline]
pub fn signed_16bit_to_sample(d: i32) -> Sample {
    d << 16
}

#[inline]
pub fn signed_24bit_to_sample(d: i32) -> Sample {
    d << 8
}

#[inline]
pub fn signed_32bit_to_sample(d: i32) -> Sample {
    d
}

/// Scale a float in [-1, 1) to the internal domain, rounding half away from zero
#[inline]
pub fn float_32bit_to_sample(d: f32, clips: &mut u64) -> Sample {
    let v = d as f64 * SAMPLE_SCALE;
    if v < 0.0 {
        if v <= SAMPLE_MIN as f64 - 0.5 {
            *clips += 1;
            SAMPLE_MIN
        } else {
            (v - 0.5) as Sample
        }
    } else if v >= SAMPLE_MAX as f64 + 0.5 {
        // Exactly +1.0 lands here too; only values beyond it count as clipped.
        if v > SAMPLE_SCALE {
            *clips += 1;
        }
        SAMPLE_MAX
    } else {
        (v + 0.5) as Sample
    }
}

/// Round to `bits` significant bits. The result holds the native value in its
/// low `bits` bits but is not sign-extended.
#[inline]
fn sample_to_signed(bits: u32, d: Sample, clips: &mut u64) -> u32 {
    let half = 1i32 << (31 - bits);
    if d > SAMPLE_MAX - half {
        *clips += 1;
        return (1u32 << (bits - 1)) - 1;
    }
    (d.wrapping_add(half) as u32) >> (32 - bits)
}

#[inline]
pub fn sample_to_signed_8bit(d: Sample, clips: &mut u64) -> i32 {
    sample_to_signed(8, d, clips) as u8 as i8 as i32
}

#[inline]
pub fn sample_to_signed_16bit(d: Sample, clips: &mut u64) -> i32 {
    sample_to_signed(16, d, clips) as u16 as i16 as i32
}

/// The narrowed value is shifted to the top of the word and back down so the
/// 24-bit sign bit extends through the whole native word.
#[inline]
pub fn sample_to_signed_24bit(d: Sample, clips: &mut u64) -> i32 {
    ((sample_to_signed(24, d, clips) << 8) as i32) >> 8
}

#[inline]
pub fn sample_to_signed_32bit(d: Sample) -> i32 {
    d
}

#[inline]
pub fn sample_to_float_32bit(d: Sample) -> f32 {
    (d as f64 / SAMPLE_SCALE) as f32
}

/// Widen one native word. For `F32` the word carries the IEEE bit pattern.
#[inline]
pub fn decode_sample(native: i32, format: SampleFormat, clips: &mut u64) -> Sample {
    match format {
        SampleFormat::I8 => signed_8bit_to_sample(native),
        SampleFormat::I16 => signed_16bit_to_sample(native),
        SampleFormat::I24 => signed_24bit_to_sample(native),
        SampleFormat::I32 => signed_32bit_to_sample(native),
        SampleFormat::F32 => float_32bit_to_sample(f32::from_bits(native as u32), clips),
    }
}

/// Narrow one internal sample to a native word
#[inline]
pub fn encode_sample(sample: Sample, format: SampleFormat, clips: &mut u64) -> i32 {
    match format {
        SampleFormat::I8 => sample_to_signed_8bit(sample, clips),
        SampleFormat::I16 => sample_to_signed_16bit(sample, clips),
        SampleFormat::I24 => sample_to_signed_24bit(sample, clips),
        SampleFormat::I32 => sample_to_signed_32bit(sample),
        SampleFormat::F32 => sample_to_float_32bit(sample).to_bits() as i32,
    }
}

/// Widen a buffer of native words in place; returns the number of clips
pub fn decode_block(buf: &mut [i32], format: SampleFormat) -> u64 {
    let decode = |chunk: &mut [i32]| {
        let mut clips = 0;
        for value in chunk.iter_mut() {
            *value = decode_sample(*value, format, &mut clips);
        }
        clips
    };

    if buf.len() < PARALLEL_THRESHOLD {
        decode(buf)
    } else {
        buf.par_chunks_mut(PARALLEL_CHUNK).map(decode).sum()
    }
}

/// Narrow `input` into `output` (same length); returns the number of clips
pub fn encode_block(input: &[Sample], output: &mut [i32], format: SampleFormat) -> u64 {
    debug_assert_eq!(input.len(), output.len());

    let encode = |(src, dst): (&[Sample], &mut [i32])| {
        let mut clips = 0;
        for (s, d) in src.iter().zip(dst.iter_mut()) {
            *d = encode_sample(*s, format, &mut clips);
        }
        clips
    };

    if input.len() < PARALLEL_THRESHOLD {
        encode((input, output))
    } else {
        input
            .par_chunks(PARALLEL_CHUNK)
            .zip(output.par_chunks_mut(PARALLEL_CHUNK))
            .map(encode)
            .sum()
    }
}
