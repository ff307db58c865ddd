//! The byte-level contract a codec engine drives while it decodes or encodes.
//!
//! An engine sees a stream only through [`CodecStream`]. Each operation maps
//! straight onto one [`ByteStream`] primitive; failures come back unchanged.
//! [`CodecIo`] adds one piece of state: the size of the first block written,
//! which the finalize step needs to re-read and patch the stream header.

use crate::prelude::*;
use crate::stream::ByteStream;
use std::io;

/// Reference point for a relative seek
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Start,
    Current,
    End,
}

impl Origin {
    /// Decode a C `whence` value (`SEEK_SET`, `SEEK_CUR`, `SEEK_END`)
    pub fn from_whence(whence: i32) -> Option<Self> {
        match whence {
            0 => Some(Origin::Start),
            1 => Some(Origin::Current),
            2 => Some(Origin::End),
            _ => None,
        }
    }

    fn to_seek_from(self, offset: i64) -> io::Result<SeekFrom> {
        Ok(match self {
            Origin::Start => SeekFrom::Start(u64::try_from(offset).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidInput, "negative absolute offset")
            })?),
            Origin::Current => SeekFrom::Current(offset),
            Origin::End => SeekFrom::End(offset),
        })
    }
}

/// Stream operations available to a codec engine
pub trait CodecStream {
    /// Read up to `buf.len()` bytes; a short count means the stream ended
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn tell(&self) -> u64;

    fn seek_abs(&mut self, offset: u64) -> io::Result<()>;

    fn seek_rel(&mut self, offset: i64, origin: Origin) -> io::Result<()>;

    /// Un-consume one byte
    fn push_back(&mut self, byte: u8) -> io::Result<()>;

    fn length(&mut self) -> Option<u64>;

    fn is_seekable(&self) -> bool;

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize>;
}

/// Adapter from a [`ByteStream`] to [`CodecStream`]
pub struct CodecIo<S> {
    stream: S,
    first_block_size: Option<usize>,
}

impl<S: ByteStream> CodecIo<S> {
    pub fn new(stream: S) -> Self {
        Self {
            stream,
            first_block_size: None,
        }
    }

    /// Size of the first `write_bytes` call of the session, if one happened
    pub fn first_block_size(&self) -> Option<usize> {
        self.first_block_size
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl<S: ByteStream> CodecStream for CodecIo<S> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read_full(buf)
    }

    fn tell(&self) -> u64 {
        self.stream.tell()
    }

    fn seek_abs(&mut self, offset: u64) -> io::Result<()> {
        self.stream.seek(SeekFrom::Start(offset)).map(|_| ())
    }

    fn seek_rel(&mut self, offset: i64, origin: Origin) -> io::Result<()> {
        let target = origin.to_seek_from(offset)?;
        self.stream.seek(target).map(|_| ())
    }

    fn push_back(&mut self, byte: u8) -> io::Result<()> {
        self.stream.unread(byte)
    }

    fn length(&mut self) -> Option<u64> {
        self.stream.length()
    }

    fn is_seekable(&self) -> bool {
        self.stream.is_seekable()
    }

    fn write_bytes(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.first_block_size.is_none() {
            self.first_block_size = Some(buf.len());
        }
        self.stream.write_all(buf)?;
        Ok(buf.len())
    }
}
