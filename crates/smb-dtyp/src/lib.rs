//! Little-endian wire primitives shared by the SMB1/DCE-RPC crates above
//! this one: integer/byte codec, alignment, ASCII/UTF-16LE strings, and
//! GUID packing.

pub mod codec;
pub mod error;
pub mod guid;
pub mod pos_marker;
pub mod strings;

pub use error::{Result, WireError};
pub use guid::{Guid, REFERENT_PRESENT};
pub use pos_marker::PosMarker;
