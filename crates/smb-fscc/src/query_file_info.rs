//! The two FSCC (MS-FSCC 2.4) file information classes this workspace
//! synthesizes for a Trans2QueryFile request against a named pipe: a pipe
//! has no real allocation, link count, or object id, so these are fixed
//! values rather than anything read off a filesystem.

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::{FsccError, Result};

/// Trans2 "query file information" pass-through level, i.e. `1000 +`
/// the native FSCC information class number (MS-CIFS 2.2.8.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryFileInfoLevel {
    /// `FileStandardInformation`, FSCC class 5, pass-through level 1005.
    Standard,
    /// `FileInternalInformation`, FSCC class 6, pass-through level 1006.
    Internal,
}

impl QueryFileInfoLevel {
    pub const STANDARD_RAW: u16 = 1005;
    pub const INTERNAL_RAW: u16 = 1006;

    pub fn from_raw(level: u16) -> Result<Self> {
        match level {
            Self::STANDARD_RAW => Ok(Self::Standard),
            Self::INTERNAL_RAW => Ok(Self::Internal),
            other => Err(FsccError::UnsupportedInfoLevel(other)),
        }
    }

    pub fn raw(self) -> u16 {
        match self {
            Self::Standard => Self::STANDARD_RAW,
            Self::Internal => Self::INTERNAL_RAW,
        }
    }
}

/// MS-FSCC 2.4.38. `delete_pending`/`directory` are wire booleans: one byte,
/// nonzero is true.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct FileStandardInformation {
    pub allocation_size: u64,
    pub end_of_file: u64,
    pub number_of_links: u32,
    pub delete_pending: u8,
    pub directory: u8,
    #[bw(calc = 0)]
    #[br(temp)]
    _reserved: u16,
}

/// MS-FSCC 2.4.20.
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct FileInternalInformation {
    pub index_number: u64,
}

/// A pipe is never a directory, never pending deletion, and has exactly one
/// link (itself); `allocation_size` is the only field a real server varies.
pub fn synth_standard_info(allocation_size: u64) -> FileStandardInformation {
    FileStandardInformation {
        allocation_size,
        end_of_file: 0,
        number_of_links: 1,
        delete_pending: 0,
        directory: 0,
    }
}

pub fn synth_internal_info(index_number: u64) -> FileInternalInformation {
    FileInternalInformation { index_number }
}

/// Packs the fixed 4096-byte-allocation pipe info at `level` into wire
/// bytes, or `UnsupportedInfoLevel` for anything this core doesn't
/// synthesize (the caller maps that to `STATUS_INVALID_PARAMETER`).
pub fn pack(level: u16, allocation_size: u64, index_number: u64) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    match QueryFileInfoLevel::from_raw(level)? {
        QueryFileInfoLevel::Standard => {
            synth_standard_info(allocation_size).write(&mut cursor).expect("write to Vec cannot fail");
        }
        QueryFileInfoLevel::Internal => {
            synth_internal_info(index_number).write(&mut cursor).expect("write to Vec cannot fail");
        }
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_info_packs_to_22_bytes() {
        let bytes = pack(QueryFileInfoLevel::STANDARD_RAW, 4096, 0).unwrap();
        assert_eq!(bytes.len(), 22);
        assert_eq!(&bytes[0..8], &4096u64.to_le_bytes());
        assert_eq!(&bytes[8..16], &0u64.to_le_bytes());
        assert_eq!(&bytes[16..20], &1u32.to_le_bytes());
        assert_eq!(bytes[20], 0);
        assert_eq!(bytes[21], 0);
    }

    #[test]
    fn internal_info_packs_to_8_bytes() {
        let bytes = pack(QueryFileInfoLevel::INTERNAL_RAW, 4096, 0xAABB_CCDD).unwrap();
        assert_eq!(bytes, 0xAABB_CCDDu64.to_le_bytes());
    }

    #[test]
    fn unknown_level_is_rejected() {
        let err = pack(0x0004, 4096, 0).unwrap_err();
        assert_eq!(err, FsccError::UnsupportedInfoLevel(0x0004));
    }

    #[test]
    fn level_raw_round_trips() {
        assert_eq!(
            QueryFileInfoLevel::from_raw(QueryFileInfoLevel::Standard.raw()).unwrap(),
            QueryFileInfoLevel::Standard
        );
        assert_eq!(
            QueryFileInfoLevel::from_raw(QueryFileInfoLevel::Internal.raw()).unwrap(),
            QueryFileInfoLevel::Internal
        );
    }
}
