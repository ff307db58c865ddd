//! Decoding of the NSP `HEDR` and `HDR8` header chunks

use crate::config::Endian;
use crate::prelude::*;

/// Per-channel peak slot value meaning "channel not present"
pub const CHANNEL_ABSENT: u16 = 0xFFFF;

pub const DATE_LEN: usize = 20;

// date + rate + data length + channel slots
const SHORT_HEADER_LEN: usize = DATE_LEN + 4 + 4 + 2 * 2;
const EXTENDED_HEADER_LEN: usize = DATE_LEN + 4 + 4 + 8 * 2;

/// Only the first seven `HDR8` slots take part in the channel count
const EXTENDED_COUNTED_SLOTS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    /// `HEDR`: two channel slots
    Short,
    /// `HDR8`: eight channel slots
    Extended,
}

impl HeaderKind {
    pub fn slots(&self) -> usize {
        match self {
            HeaderKind::Short => 2,
            HeaderKind::Extended => 8,
        }
    }

    /// Bytes of chunk payload the decoder consumes
    pub fn encoded_len(&self) -> usize {
        match self {
            HeaderKind::Short => SHORT_HEADER_LEN,
            HeaderKind::Extended => EXTENDED_HEADER_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderChunk {
    pub kind: HeaderKind,
    /// Recording timestamp, kept verbatim
    pub date: [u8; DATE_LEN],
    pub sample_rate: u32,
    /// Advisory; the payload chunk's own size is authoritative
    pub declared_length: u32,
    /// Maximum absolute value per slot, `CHANNEL_ABSENT` for unused slots
    pub max_abs: Vec<u16>,
    pub channels: u16,
}

impl HeaderChunk {
    pub fn decode(kind: HeaderKind, payload: &[u8], order: Endian) -> R<Self> {
        if payload.len() < kind.encoded_len() {
            return Err(Error::format(format!(
                "NSP {:?} header chunk truncated: {} of {} bytes",
                kind,
                payload.len(),
                kind.encoded_len()
            )));
        }

        let mut cursor = Cursor::new(payload);
        let mut date = [0u8; DATE_LEN];
        cursor.read_exact(&mut date)?;

        let sample_rate = read_u32(&mut cursor, order)?;
        let declared_length = read_u32(&mut cursor, order)?;
        let max_abs = (0..kind.slots())
            .map(|_| read_u16(&mut cursor, order))
            .collect::<std::io::Result<Vec<u16>>>()?;

        let channels = match kind {
            HeaderKind::Short => match (max_abs[0], max_abs[1]) {
                (CHANNEL_ABSENT, CHANNEL_ABSENT) => {
                    return Err(Error::format("Channels A and B undefined"));
                }
                (CHANNEL_ABSENT, _) | (_, CHANNEL_ABSENT) => 1,
                _ => 2,
            },
            HeaderKind::Extended => {
                let present = max_abs[..EXTENDED_COUNTED_SLOTS]
                    .iter()
                    .filter(|&&slot| slot != CHANNEL_ABSENT)
                    .count();
                if present == 0 {
                    return Err(Error::format("No channels defined"));
                }
                present as u16
            }
        };

        Ok(Self {
            kind,
            date,
            sample_rate,
            declared_length,
            max_abs,
            channels,
        })
    }

    pub fn date_text(&self) -> String {
        String::from_utf8_lossy(&self.date)
            .trim_end_matches('\0')
            .trim()
            .to_string()
    }
}

fn read_u32(cursor: &mut Cursor<&[u8]>, order: Endian) -> std::io::Result<u32> {
    match order {
        Endian::Little => cursor.read_u32::<LittleEndian>(),
        Endian::Big => cursor.read_u32::<BigEndian>(),
    }
}

fn read_u16(cursor: &mut Cursor<&[u8]>, order: Endian) -> std::io::Result<u16> {
    match order {
        Endian::Little => cursor.read_u16::<LittleEndian>(),
        Endian::Big => cursor.read_u16::<BigEndian>(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(rate: u32, slots: &[u16]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(b"Mar 02 10:11:12 2017");
        out.write_u32::<LittleEndian>(rate).unwrap();
        out.write_u32::<LittleEndian>(1234).unwrap();
        for &slot in slots {
            out.write_u16::<LittleEndian>(slot).unwrap();
        }
        out
    }

    #[test]
    fn test_short_header_channel_presence() {
        let one = HeaderChunk::decode(HeaderKind::Short, &payload(8000, &[100, 0xFFFF]), Endian::Little)
            .unwrap();
        assert_eq!(one.channels, 1);
        assert_eq!(one.sample_rate, 8000);
        assert_eq!(one.declared_length, 1234);
        assert_eq!(one.date_text(), "Mar 02 10:11:12 2017");

        let other = HeaderChunk::decode(HeaderKind::Short, &payload(8000, &[0xFFFF, 7]), Endian::Little)
            .unwrap();
        assert_eq!(other.channels, 1);

        let two = HeaderChunk::decode(HeaderKind::Short, &payload(8000, &[0, 7]), Endian::Little)
            .unwrap();
        assert_eq!(two.channels, 2);

        let none = HeaderChunk::decode(
            HeaderKind::Short,
            &payload(8000, &[0xFFFF, 0xFFFF]),
            Endian::Little,
        );
        assert!(none.unwrap_err().is_format());
    }

    #[test]
    fn test_extended_header_counts_first_seven_slots() {
        let slots = [1, 0xFFFF, 3, 0xFFFF, 5, 0xFFFF, 0xFFFF, 0xFFFF];
        let hdr = HeaderChunk::decode(HeaderKind::Extended, &payload(22050, &slots), Endian::Little)
            .unwrap();
        assert_eq!(hdr.channels, 3);
        assert_eq!(hdr.max_abs.len(), 8);

        // The eighth slot never counts.
        let mut slots = [0xFFFF; 8];
        slots[7] = 42;
        let err = HeaderChunk::decode(HeaderKind::Extended, &payload(22050, &slots), Endian::Little)
            .unwrap_err();
        assert!(err.is_format());

        let all = HeaderChunk::decode(HeaderKind::Extended, &payload(22050, &[0; 8]), Endian::Little)
            .unwrap();
        assert_eq!(all.channels, 7);
    }

    #[test]
    fn test_truncated_header_is_format_error() {
        let mut data = payload(8000, &[1, 2]);
        data.truncate(30);
        let err = HeaderChunk::decode(HeaderKind::Short, &data, Endian::Little).unwrap_err();
        assert!(err.is_format());
    }

    #[test]
    fn test_big_endian_fields() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; DATE_LEN]);
        data.write_u32::<BigEndian>(16000).unwrap();
        data.write_u32::<BigEndian>(0).unwrap();
        data.write_u16::<BigEndian>(0x00FF).unwrap();
        data.write_u16::<BigEndian>(0xFFFF).unwrap();
        let hdr = HeaderChunk::decode(HeaderKind::Short, &data, Endian::Big).unwrap();
        assert_eq!(hdr.sample_rate, 16000);
        assert_eq!(hdr.max_abs, vec![0x00FF, 0xFFFF]);
        assert_eq!(hdr.channels, 1);
        assert_eq!(hdr.date_text(), "");
    }
}
