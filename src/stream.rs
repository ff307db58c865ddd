//! Byte-stream primitives the container scanner and codec adapter sit on.
//!
//! Every stream kind tracks its own absolute position so `tell` works on pipes,
//! and keeps a one-byte pushback slot for engines that peek while probing.

use crate::prelude::*;
use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

/// Blocking byte stream with optional random access
pub trait ByteStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream is not writable",
        ))
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64>;

    fn tell(&self) -> u64;

    /// Total length, when it can be determined
    fn length(&mut self) -> Option<u64>;

    fn is_seekable(&self) -> bool;

    /// Un-consume one byte; the next read returns it first
    fn unread(&mut self, byte: u8) -> io::Result<()>;

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    /// Read until `buf` is full or the stream ends; returns the byte count
    fn read_full(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn write_all(&mut self, mut buf: &[u8]) -> io::Result<()> {
        while !buf.is_empty() {
            match self.write(buf) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => buf = &buf[n..],
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}

impl<S: ByteStream + ?Sized> ByteStream for &mut S {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        (**self).read(buf)
    }
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        (**self).write(buf)
    }
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        (**self).seek(pos)
    }
    fn tell(&self) -> u64 {
        (**self).tell()
    }
    fn length(&mut self) -> Option<u64> {
        (**self).length()
    }
    fn is_seekable(&self) -> bool {
        (**self).is_seekable()
    }
    fn unread(&mut self, byte: u8) -> io::Result<()> {
        (**self).unread(byte)
    }
    fn flush(&mut self) -> io::Result<()> {
        (**self).flush()
    }
}

/// Read through a pushback slot first, then `read_more`
fn read_with_pushback(
    pushback: &mut Option<u8>,
    buf: &mut [u8],
    read_more: impl FnOnce(&mut [u8]) -> io::Result<usize>,
) -> io::Result<usize> {
    if buf.is_empty() {
        return Ok(0);
    }
    match pushback.take() {
        Some(byte) => {
            buf[0] = byte;
            Ok(1)
        }
        None => read_more(buf),
    }
}

fn push_back(pushback: &mut Option<u8>, pos: &mut u64, byte: u8) -> io::Result<()> {
    if pushback.is_some() || *pos == 0 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "cannot push back more than one byte",
        ));
    }
    *pushback = Some(byte);
    *pos -= 1;
    Ok(())
}

fn not_seekable() -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, "stream is not seekable")
}

fn resolve_seek(pos: SeekFrom, current: u64, len: u64) -> io::Result<u64> {
    let target = match pos {
        SeekFrom::Start(offset) => Some(offset),
        SeekFrom::Current(delta) => current.checked_add_signed(delta),
        SeekFrom::End(delta) => len.checked_add_signed(delta),
    };
    target.ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "seek to a negative position")
    })
}

/// Seekable, read-write file
pub struct FileStream {
    file: File,
    pos: u64,
    pushback: Option<u8>,
}

impl FileStream {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(File::open(path)?))
    }

    /// Create (or truncate) a file that can be rewound and re-read at close
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self::new(file))
    }

    pub fn new(file: File) -> Self {
        Self {
            file,
            pos: 0,
            pushback: None,
        }
    }

    pub fn into_inner(self) -> File {
        self.file
    }
}

impl ByteStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = &mut self.file;
        let n = read_with_pushback(&mut self.pushback, buf, |b| file.read(b))?;
        self.pos += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.pushback.take().is_some() {
            self.file.seek(SeekFrom::Start(self.pos))?;
        }
        let n = self.file.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        // The file cursor runs one byte ahead of `pos` while a byte is pushed back.
        let pos = match pos {
            SeekFrom::Current(_) => SeekFrom::Start(resolve_seek(pos, self.pos, 0)?),
            other => other,
        };
        self.pushback = None;
        self.pos = self.file.seek(pos)?;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Option<u64> {
        self.file.metadata().ok().map(|m| m.len())
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn unread(&mut self, byte: u8) -> io::Result<()> {
        push_back(&mut self.pushback, &mut self.pos, byte)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Read-only view of a memory-mapped file
pub struct MappedStream {
    map: Mmap,
    pos: u64,
    pushback: Option<u8>,
}

impl MappedStream {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        let map = unsafe { Mmap::map(&file)? };
        Ok(Self {
            map,
            pos: 0,
            pushback: None,
        })
    }
}

impl ByteStream for MappedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (map, pos) = (&self.map, self.pos);
        let n = read_with_pushback(&mut self.pushback, buf, |b| {
            let start = (pos as usize).min(map.len());
            let n = b.len().min(map.len() - start);
            b[..n].copy_from_slice(&map[start..start + n]);
            Ok(n)
        })?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pushback = None;
        self.pos = resolve_seek(pos, self.pos, self.map.len() as u64)?;
        Ok(self.pos)
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Option<u64> {
        Some(self.map.len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn unread(&mut self, byte: u8) -> io::Result<()> {
        push_back(&mut self.pushback, &mut self.pos, byte)
    }
}

/// Seekable in-memory buffer
#[derive(Debug, Default, Clone)]
pub struct MemoryStream {
    cursor: Cursor<Vec<u8>>,
    pushback: Option<u8>,
}

impl MemoryStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(data: Vec<u8>) -> Self {
        Self {
            cursor: Cursor::new(data),
            pushback: None,
        }
    }

    pub fn get_ref(&self) -> &[u8] {
        self.cursor.get_ref()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.cursor.into_inner()
    }
}

impl ByteStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let cursor = &mut self.cursor;
        read_with_pushback(&mut self.pushback, buf, |b| cursor.read(b))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.pushback.take().is_some() {
            let pos = self.cursor.position();
            self.cursor.set_position(pos - 1);
        }
        self.cursor.write(buf)
    }

    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let target = resolve_seek(pos, self.tell(), self.cursor.get_ref().len() as u64)?;
        self.pushback = None;
        self.cursor.set_position(target);
        Ok(target)
    }

    fn tell(&self) -> u64 {
        self.cursor.position() - self.pushback.map_or(0, |_| 1)
    }

    fn length(&mut self) -> Option<u64> {
        Some(self.cursor.get_ref().len() as u64)
    }

    fn is_seekable(&self) -> bool {
        true
    }

    fn unread(&mut self, byte: u8) -> io::Result<()> {
        let mut pos = self.tell();
        push_back(&mut self.pushback, &mut pos, byte)
    }
}

/// Forward-only reader, e.g. stdin or a child process pipe
pub struct PipeReader<R> {
    inner: R,
    pos: u64,
    pushback: Option<u8>,
}

impl<R: Read> PipeReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pos: 0,
            pushback: None,
        }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ByteStream for PipeReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = &mut self.inner;
        let n = read_with_pushback(&mut self.pushback, buf, |b| inner.read(b))?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(not_seekable())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn unread(&mut self, byte: u8) -> io::Result<()> {
        push_back(&mut self.pushback, &mut self.pos, byte)
    }
}

/// Forward-only writer, e.g. stdout
pub struct PipeWriter<W> {
    inner: W,
    pos: u64,
}

impl<W: Write> PipeWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, pos: 0 }
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> ByteStream for PipeWriter<W> {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "stream is not readable",
        ))
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.pos += n as u64;
        Ok(n)
    }

    fn seek(&mut self, _pos: SeekFrom) -> io::Result<u64> {
        Err(not_seekable())
    }

    fn tell(&self) -> u64 {
        self.pos
    }

    fn length(&mut self) -> Option<u64> {
        None
    }

    fn is_seekable(&self) -> bool {
        false
    }

    fn unread(&mut self, _byte: u8) -> io::Result<()> {
        Err(not_seekable())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Forward-only discard of up to `count` bytes through a small buffer, so it
/// behaves identically on pipes and files. Returns the number of bytes consumed,
/// which is short only when the stream ends first.
pub fn discard<S: ByteStream + ?Sized>(stream: &mut S, count: u64) -> io::Result<u64> {
    let mut trash = [0u8; 512];
    let mut remaining = count;
    while remaining > 0 {
        let want = remaining.min(trash.len() as u64) as usize;
        let n = match stream.read(&mut trash[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        remaining -= n as u64;
    }
    Ok(count - remaining)
}
