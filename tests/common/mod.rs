//! Shared fixtures: a deterministic codec engine and NSP container builders

#![allow(dead_code)]

use anyhow::{Result, anyhow, bail};
use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use streamcodex::adapter::CodecStream;
use streamcodex::engine::{CodecEngine, EngineConfig, EngineInfo};

/// signature, frame count, channels, bytes per sample, rate, float flag
pub const RAW_HEADER_LEN: usize = 4 + 4 + 2 + 2 + 4 + 1;
pub const UNKNOWN_FRAMES: u32 = u32::MAX;

/// Stores native words uncompressed after a `wvpk` header block. Blocks are
/// written per pack call, so the first block is exactly the header.
#[derive(Default)]
pub struct RawEngine {
    pub channels: usize,
    pub declared: Option<u64>,
    pub index: u64,
    pub flushes: u32,
    pub fail_pack: bool,
    pub fail_flush: bool,
    pub signature: Option<[u8; 4]>,
}

impl RawEngine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CodecEngine for RawEngine {
    fn open_input(&mut self, io: &mut dyn CodecStream) -> Result<EngineInfo> {
        let mut header = [0u8; RAW_HEADER_LEN];
        if io.read_bytes(&mut header)? < RAW_HEADER_LEN || &header[..4] != b"wvpk" {
            bail!("not a raw wvpk stream");
        }
        let frames = LittleEndian::read_u32(&header[4..8]);
        let info = EngineInfo {
            num_samples: (frames != UNKNOWN_FRAMES).then_some(frames as u64),
            channels: LittleEndian::read_u16(&header[8..10]),
            bytes_per_sample: LittleEndian::read_u16(&header[10..12]),
            sample_rate: LittleEndian::read_u32(&header[12..16]),
            float: header[16] != 0,
        };
        self.channels = info.channels as usize;
        self.declared = info.num_samples;
        self.index = 0;
        Ok(info)
    }

    fn unpack_samples(
        &mut self,
        io: &mut dyn CodecStream,
        buf: &mut [i32],
        frames: usize,
    ) -> Result<usize> {
        let mut bytes = vec![0u8; frames * self.channels * 4];
        let n = io.read_bytes(&mut bytes)?;
        let got = n / (self.channels * 4);
        for (dst, word) in buf.iter_mut().zip(bytes[..got * self.channels * 4].chunks_exact(4)) {
            *dst = LittleEndian::read_i32(word);
        }
        self.index += got as u64;
        Ok(got)
    }

    fn seek_sample(&mut self, io: &mut dyn CodecStream, frame: u64) -> Result<()> {
        let offset = RAW_HEADER_LEN as u64 + frame * self.channels as u64 * 4;
        io.seek_abs(offset)?;
        self.index = frame;
        Ok(())
    }

    fn open_output(
        &mut self,
        io: &mut dyn CodecStream,
        config: &EngineConfig,
        total_frames: Option<u64>,
    ) -> Result<()> {
        self.channels = config.num_channels as usize;
        self.declared = total_frames;
        self.index = 0;

        let mut header = self.signature.unwrap_or(*b"wvpk").to_vec();
        header.write_u32::<LittleEndian>(total_frames.map_or(UNKNOWN_FRAMES, |n| n as u32))?;
        header.write_u16::<LittleEndian>(config.num_channels as u16)?;
        header.write_u16::<LittleEndian>(config.bytes_per_sample as u16)?;
        header.write_u32::<LittleEndian>(config.sample_rate as u32)?;
        header.write_u8(config.float as u8)?;
        io.write_bytes(&header)?;
        Ok(())
    }

    fn pack_samples(&mut self, io: &mut dyn CodecStream, buf: &mut [i32], frames: usize) -> Result<()> {
        if self.fail_pack {
            bail!("pack rejected");
        }
        let mut block = Vec::with_capacity(buf.len() * 4);
        for &word in &buf[..frames * self.channels] {
            block.write_i32::<LittleEndian>(word)?;
        }
        io.write_bytes(&block)?;
        self.index += frames as u64;
        Ok(())
    }

    fn flush(&mut self, _io: &mut dyn CodecStream) -> Result<()> {
        self.flushes += 1;
        if self.fail_flush {
            return Err(anyhow!("flush rejected"));
        }
        Ok(())
    }

    fn num_samples(&self) -> Option<u64> {
        self.declared
    }

    fn sample_index(&self) -> u64 {
        self.index
    }

    fn update_num_samples(&mut self, first_block: &mut [u8]) -> Result<()> {
        LittleEndian::write_u32(&mut first_block[4..8], self.index as u32);
        self.declared = Some(self.index);
        Ok(())
    }
}

pub fn nsp_chunk(tag: &[u8; 4], body: &[u8]) -> Vec<u8> {
    let mut out = tag.to_vec();
    out.write_u32::<LittleEndian>(body.len() as u32).unwrap();
    out.extend_from_slice(body);
    out
}

pub fn nsp_hedr(rate: u32, slot_a: u16, slot_b: u16) -> Vec<u8> {
    let mut body = b"Jan 01 00:00:00 2000".to_vec();
    body.write_u32::<LittleEndian>(rate).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    body.write_u16::<LittleEndian>(slot_a).unwrap();
    body.write_u16::<LittleEndian>(slot_b).unwrap();
    nsp_chunk(b"HEDR", &body)
}

pub fn nsp_hdr8(rate: u32, slots: [u16; 8]) -> Vec<u8> {
    let mut body = b"Jan 01 00:00:00 2000".to_vec();
    body.write_u32::<LittleEndian>(rate).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    for slot in slots {
        body.write_u16::<LittleEndian>(slot).unwrap();
    }
    nsp_chunk(b"HDR8", &body)
}

pub fn nsp_payload(samples: &[i16]) -> Vec<u8> {
    let mut body = Vec::new();
    for &s in samples {
        body.write_i16::<LittleEndian>(s).unwrap();
    }
    nsp_chunk(b"SDA_", &body)
}

pub fn nsp_container(chunks: &[Vec<u8>]) -> Vec<u8> {
    let area = chunks.concat();
    let mut out = b"FORMDS16".to_vec();
    out.write_u32::<LittleEndian>(area.len() as u32).unwrap();
    out.extend_from_slice(&area);
    out
}
