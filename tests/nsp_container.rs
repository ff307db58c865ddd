mod common;

use common::*;
use std::io::Cursor;
use streamcodex::codecs::NspReader;
use streamcodex::stream::{ByteStream, FileStream, MemoryStream, PipeReader};
use streamcodex::{ReadOptions, probe_file};

fn open_memory(data: Vec<u8>) -> streamcodex::R<NspReader<MemoryStream>> {
    NspReader::open(MemoryStream::from_vec(data), &ReadOptions::default())
}

#[test]
fn short_header_channel_counts() {
    for (a, b, expected) in [(10, 0xFFFF, 1), (0xFFFF, 10, 1), (10, 20, 2)] {
        let data = nsp_container(&[nsp_hedr(8000, a, b), nsp_payload(&[0; 4])]);
        assert_eq!(open_memory(data).unwrap().params().channels, expected);
    }

    let data = nsp_container(&[nsp_hedr(8000, 0xFFFF, 0xFFFF), nsp_payload(&[0; 4])]);
    assert!(open_memory(data).err().unwrap().is_format());
}

#[test]
fn extended_header_counts_seven_slots() {
    let data = nsp_container(&[
        nsp_hdr8(8000, [0, 0xFFFF, 0, 0xFFFF, 0, 0, 0xFFFF, 0]),
        nsp_payload(&[0; 8]),
    ]);
    assert_eq!(open_memory(data).unwrap().params().channels, 4);

    let data = nsp_container(&[
        nsp_hdr8(8000, [0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0xFFFF, 0]),
        nsp_payload(&[0; 8]),
    ]);
    assert!(open_memory(data).err().unwrap().is_format());
}

#[test]
fn trailing_annotation_is_not_sample_data() {
    let header = nsp_hedr(16000, 1, 0xFFFF);
    let payload_offset = (8 + 4 + header.len() + 8) as u64;
    let data = nsp_container(&[
        header,
        nsp_payload(&[1, 2, 3]),
        nsp_chunk(b"NOTE", b"recorded on site\0"),
    ]);

    let mut reader = open_memory(data).unwrap();
    assert_eq!(reader.stream().tell(), payload_offset);
    assert_eq!(reader.params().length, Some(3));

    let mut buf = vec![0; 64];
    let n = reader.read_samples(&mut buf).unwrap();
    assert_eq!(n, 3);
    assert_eq!(&buf[..3], &[1 << 16, 2 << 16, 3 << 16]);
}

#[test]
fn pipe_source_never_seeks() {
    // Everything after the payload header is sample data as far as a pipe
    // reader is concerned, including bytes that look like chunks.
    let data = nsp_container(&[
        nsp_hedr(8000, 1, 0xFFFF),
        nsp_payload(&[5, 6]),
        b"garbage that is not a chunk".to_vec(),
    ]);
    let mut reader =
        NspReader::open(PipeReader::new(Cursor::new(data)), &ReadOptions::default()).unwrap();
    let mut buf = [0; 8];
    assert_eq!(reader.read_samples(&mut buf).unwrap(), 2);
    assert_eq!(&buf[..2], &[5 << 16, 6 << 16]);
    assert_eq!(reader.read_samples(&mut buf).unwrap(), 0);
}

#[test]
fn unknown_tag_with_odd_length_is_skipped() {
    let data = nsp_container(&[
        nsp_chunk(b"XTRA", &[0x55; 37]),
        nsp_hedr(22050, 3, 4),
        nsp_chunk(b"INST", &[0; 6]),
        nsp_payload(&[-7, 7]),
    ]);

    for seekable in [true, false] {
        let mut buf = [0; 2];
        let n = if seekable {
            open_memory(data.clone()).unwrap().read_samples(&mut buf).unwrap()
        } else {
            NspReader::open(PipeReader::new(Cursor::new(data.clone())), &ReadOptions::default())
                .unwrap()
                .read_samples(&mut buf)
                .unwrap()
        };
        assert_eq!(n, 2);
        assert_eq!(buf, [-7 << 16, 7 << 16]);
    }
}

#[test]
fn eof_before_payload_is_format_error() {
    let mut data = nsp_container(&[nsp_hedr(8000, 1, 0xFFFF)]);
    data.extend_from_slice(b"SDA");
    assert!(open_memory(data).err().unwrap().is_format());
}

#[test]
fn parsing_twice_gives_identical_params() {
    let data = nsp_container(&[
        nsp_chunk(b"NOTE", b"take 2"),
        nsp_hedr(44100, 100, 200),
        nsp_payload(&[0; 10]),
    ]);
    let first = open_memory(data.clone()).unwrap().params().clone();
    let second = open_memory(data).unwrap().params().clone();
    assert_eq!(first, second);
}

#[test]
fn file_backed_info_and_read() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("speech.nsp");
    std::fs::write(
        &path,
        nsp_container(&[nsp_hedr(10000, 1, 0xFFFF), nsp_payload(&[0; 25000])]),
    )
    .unwrap();

    let info = probe_file(path.to_str().unwrap()).unwrap();
    assert_eq!(info.channels, 1);
    assert_eq!(info.sample_rate, 10000.0);
    assert_eq!(info.bit_depth, 16);
    assert_eq!(info.duration, "0:02");

    let mut reader = NspReader::open(FileStream::open(&path).unwrap(), &ReadOptions::default())
        .unwrap();
    let mut buf = vec![0; 30000];
    assert_eq!(reader.read_samples(&mut buf).unwrap(), 25000);
}
