//! DCE/RPC PDU header layout (MS-RPCE 2.2.2.9) and the bits of it this core
//! reads or writes. Offsets are relative to the start of one PDU buffer,
//! not to any surrounding SMB framing.

use modular_bitfield::prelude::*;

pub const HEADER_LEN: usize = 16;

pub const OFF_VERSION: usize = 0;
pub const OFF_VERSION_MINOR: usize = 1;
pub const OFF_PDU_TYPE: usize = 2;
pub const OFF_FLAGS: usize = 3;
pub const OFF_DATA_REP: usize = 4;
pub const OFF_FRAG_LEN: usize = 8;
pub const OFF_AUTH_LEN: usize = 10;
pub const OFF_CALL_ID: usize = 12;

pub const VERSION_MAJOR: u8 = 5;
pub const VERSION_MINOR: u8 = 0;

/// Little-endian / ASCII / IEEE float, the only data representation this
/// core emits or expects.
pub const DATA_REP_LE_ASCII_IEEE: [u8; 4] = [0x10, 0, 0, 0];

/// PDU types used by the core; all others are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PduType {
    Request = 0x00,
    Response = 0x02,
    Bind = 0x0B,
    BindAck = 0x0C,
}

impl PduType {
    pub fn from_u8(v: u8) -> Option<Self> {
        use PduType::*;
        Some(match v {
            0x00 => Request,
            0x02 => Response,
            0x0B => Bind,
            0x0C => BindAck,
            _ => return None,
        })
    }
}

/// DCE/RPC PDU flags (MS-RPCE 2.2.2.9). Bit order:
/// bit0 first-frag, bit1 last-frag, bit2 cancel-pending, bit3 reserved,
/// bit4 multiplex, bit5 did-not-execute, bit6 maybe, bit7 object.
#[bitfield]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct DceFlags {
    pub first_frag: bool,
    pub last_frag: bool,
    pub cancel_pending: bool,
    pub reserved: bool,
    pub multiplex: bool,
    pub did_not_execute: bool,
    pub maybe: bool,
    pub object: bool,
}

impl DceFlags {
    pub fn from_raw(v: u8) -> Self {
        Self::from_bytes([v])
    }

    pub fn to_raw(self) -> u8 {
        Self::into_bytes(self)[0]
    }

    /// A single-fragment PDU: both `first_frag` and `last_frag` set, the
    /// shape of every PDU this core ever emits.
    pub fn only_frag() -> Self {
        Self::new().with_first_frag(true).with_last_frag(true)
    }
}

use binrw::prelude::*;
