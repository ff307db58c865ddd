pub use crate::error::{Error, R};
pub use crate::*;
pub use anyhow::anyhow;
pub use byteorder::{BigEndian, LittleEndian, ReadBytesExt, WriteBytesExt};
pub use log::{debug, warn};

pub use rayon::prelude::*;
pub use std::io::{Cursor, Read, Seek, SeekFrom, Write};
