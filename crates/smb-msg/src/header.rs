//! SMB1 wire layout constants, command codes, and NT status codes.
//!
//! Reference: MS-CIFS 2.2.3 (header), MS-SMB 2.2.1 (status codes). Offsets
//! are relative to the start of the buffer, which is expected to begin with
//! the 4-byte NBT/transport prefix (MS-CIFS 2.2.2).

use modular_bitfield::prelude::*;

/// Size of the transport (NetBIOS-over-TCP) prefix: 1 byte type, 3 bytes length.
pub const NBT_PREFIX_LEN: usize = 4;

/// Size of the fixed SMB1 header, starting right after the NBT prefix.
pub const SMB_HEADER_LEN: usize = 32;

/// Offset of the 4-byte `0xFF 'S' 'M' 'B'` protocol signature.
pub const OFF_MAGIC: usize = NBT_PREFIX_LEN;
pub const MAGIC: [u8; 4] = [0xFF, b'S', b'M', b'B'];

pub const OFF_COMMAND: usize = OFF_MAGIC + 4;
pub const OFF_STATUS: usize = OFF_COMMAND + 1;
pub const OFF_FLAGS: usize = OFF_STATUS + 4;
pub const OFF_FLAGS2: usize = OFF_FLAGS + 1;
/// 12 bytes of PID-high/security-signature/reserved, preserved but unused here.
pub const OFF_PAD: usize = OFF_FLAGS2 + 2;
pub const OFF_TREE_ID: usize = OFF_PAD + 12;
pub const OFF_PROCESS_ID: usize = OFF_TREE_ID + 2;
pub const OFF_USER_ID: usize = OFF_PROCESS_ID + 2;
pub const OFF_MULTIPLEX_ID: usize = OFF_USER_ID + 2;

/// Offset of the 1-byte parameter word count, just past the fixed header.
pub const OFF_PARAM_COUNT: usize = NBT_PREFIX_LEN + SMB_HEADER_LEN;
/// Offset of the first parameter word.
pub const OFF_PARAMS: usize = OFF_PARAM_COUNT + 1;

/// Bit 0 of the `flags` byte: this frame is a response.
pub const FLAGS_RESPONSE: u8 = 0x80;

/// SMB1 command codes used by the IPC$ core (MS-CIFS 2.2.2.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Command {
    Open = 0x02,
    Close = 0x04,
    Read = 0x0A,
    Write = 0x0B,
    Transaction = 0x25,
    TransactionSecondary = 0x26,
    WriteAndX = 0x2F,
    OpenAndX = 0x2D,
    ReadAndX = 0x2E,
    Transaction2 = 0x32,
    Transaction2Secondary = 0x33,
    NtTransact = 0xA0,
    NtTransactSecondary = 0xA1,
    NtCreateAndX = 0xA2,
}

impl Command {
    pub fn from_u8(v: u8) -> Option<Self> {
        use Command::*;
        Some(match v {
            0x02 => Open,
            0x04 => Close,
            0x0A => Read,
            0x0B => Write,
            0x25 => Transaction,
            0x26 => TransactionSecondary,
            0x2D => OpenAndX,
            0x2E => ReadAndX,
            0x2F => WriteAndX,
            0x32 => Transaction2,
            0x33 => Transaction2Secondary,
            0xA0 => NtTransact,
            0xA1 => NtTransactSecondary,
            0xA2 => NtCreateAndX,
            _ => return None,
        })
    }
}

/// `flags2` bits this core reads or writes. All other bits are preserved
/// verbatim (see [`crate::frame::Smb1Frame::flags2`]).
#[bitfield]
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[bw(map = |&x| Self::into_bytes(x))]
#[br(map = Self::from_bytes)]
pub struct Flags2 {
    #[skip]
    __: B14,
    /// `SMB_FLAGS2_NT_STATUS`: the `status` field carries a 32-bit NTSTATUS
    /// rather than a DOS (class, code) pair. Set by [`crate::frame::Smb1Frame::set_long_error_code`].
    pub nt_status: bool,
    /// `SMB_FLAGS2_UNICODE`: byte-region strings are UTF-16LE rather than ASCII.
    pub unicode: bool,
}

impl Flags2 {
    pub fn from_raw(v: u16) -> Self {
        Self::from_bytes(v.to_le_bytes())
    }

    pub fn to_raw(self) -> u16 {
        u16::from_le_bytes(Self::into_bytes(self))
    }
}

use binrw::prelude::*;

macro_rules! make_status {
    ($($name:ident = $value:literal: $description:literal,)+) => {
        /// NT status codes used in SMB1 IPC$/DCE-RPC responses.
        ///
        /// A `U32_*` const is also generated for each variant, e.g.
        /// [`Status::U32_SUCCESS`], for use where a raw `u32` is needed (the
        /// `status` field itself, or a legacy DOS mapping table).
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        #[repr(u32)]
        pub enum Status {
            $(
                #[doc = concat!($description, " (", stringify!($value), ")")]
                $name = $value,
            )+
        }

        impl Status {
            pastey::paste! {
                $(
                    #[doc = concat!("[`", stringify!($name), "`][Self::", stringify!($name), "] as u32")]
                    pub const [<U32_ $name:snake:upper>]: u32 = $value;
                )+
            }
        }

        impl std::fmt::Display for Status {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let s = match self {
                    $(Status::$name => $description,)+
                };
                write!(f, "{} ({:#010x})", s, *self as u32)
            }
        }
    };
}

make_status! {
    Success = 0x0000_0000: "Success",
    BufferOverflow = 0x8000_0005: "Buffer Overflow",
    InvalidParameter = 0xC000_000D: "Invalid Parameter",
    AccessDenied = 0xC000_0022: "Access Denied",
    ObjectNameNotFound = 0xC000_0034: "Object Name Not Found",
    NotSupported = 0xC000_00BB: "Not Supported",
    TooManyOpenFiles = 0xC000_011F: "Too Many Open Files",
    UnrecognizedCommand = 0x0016_0002: "Unrecognized Command",
    InvalidHandle = 0xC000_0008: "Invalid Handle",
    InvalidData = 0xC000_0E8F: "Invalid Data",
    InvalidDrive = 0x0005_0002: "Invalid Drive",
}

/// The legacy (class, code) pair carried alongside a status when
/// `flags2.nt_status` is clear. Class values per MS-CIFS 2.2.2.4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyClass {
    Success = 0x00,
    Dos = 0x01,
    Server = 0x02,
}
