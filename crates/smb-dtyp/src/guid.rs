//! GUID/UUID packing (MS-DTYP 2.3.4), including the DCE/RPC "referent
//! present" pointer convention.

use binrw::prelude::*;

/// A 16-byte GUID, in the little-endian MS-DTYP 2.3.4 wire layout:
/// `Data1` (u32), `Data2` (u16), `Data3` (u16), `Data4` (8 bytes, big-endian
/// as a byte string).
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct Guid {
    pub data1: u32,
    pub data2: u16,
    pub data3: u16,
    pub data4: [u8; 8],
}

impl Guid {
    pub const fn new(data1: u32, data2: u16, data3: u16, data4: [u8; 8]) -> Self {
        Self {
            data1,
            data2,
            data3,
            data4,
        }
    }

    pub fn to_bytes(self) -> [u8; 16] {
        let mut cursor = std::io::Cursor::new(Vec::with_capacity(16));
        self.write_le(&mut cursor).expect("Guid is fixed-size");
        cursor.into_inner().try_into().unwrap()
    }

    pub fn from_bytes(bytes: &[u8; 16]) -> binrw::BinResult<Self> {
        let mut cursor = std::io::Cursor::new(bytes);
        Self::read_le(&mut cursor)
    }
}

impl std::fmt::Display for Guid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:08x}-{:04x}-{:04x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            self.data1,
            self.data2,
            self.data3,
            self.data4[0],
            self.data4[1],
            self.data4[2],
            self.data4[3],
            self.data4[4],
            self.data4[5],
            self.data4[6],
            self.data4[7],
        )
    }
}

/// A 4-byte "referent present" marker that DCE/RPC writes ahead of every
/// embedded pointer (here: the interface/transfer-syntax UUIDs in a BIND
/// presentation context). A non-zero value means the pointer is present.
pub const REFERENT_PRESENT: u32 = 0x0002_0000;
