//! A back-patch slot for a length/offset field whose value is only known
//! once the rest of a buffer has been written. Plain `Vec<u8>`-oriented,
//! since the structures this crate builds incrementally (a DCE response,
//! an SMB1 reply frame) are grown by hand rather than serialized from a
//! single `#[binrw]` struct.

use crate::codec::{write_u16_le, write_u32_le};

/// Reserves `width` bytes in `buf` at the current end, to be filled in later
/// via [`PosMarker::patch_u16`]/[`PosMarker::patch_u32`] once the value is
/// known.
#[derive(Debug, Clone, Copy)]
pub struct PosMarker {
    offset: usize,
}

impl PosMarker {
    /// Reserves a 2-byte slot at the end of `buf`.
    pub fn reserve_u16(buf: &mut Vec<u8>) -> Self {
        let offset = buf.len();
        buf.extend_from_slice(&0u16.to_le_bytes());
        Self { offset }
    }

    /// Reserves a 4-byte slot at the end of `buf`.
    pub fn reserve_u32(buf: &mut Vec<u8>) -> Self {
        let offset = buf.len();
        buf.extend_from_slice(&0u32.to_le_bytes());
        Self { offset }
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn patch_u16(&self, buf: &mut [u8], value: u16) {
        write_u16_le(buf, self.offset, value).expect("slot was reserved");
    }

    pub fn patch_u32(&self, buf: &mut [u8], value: u32) {
        write_u32_le(buf, self.offset, value).expect("slot was reserved");
    }
}
