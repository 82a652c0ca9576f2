//! SMB1 (CIFS) frame view, header/status constants, and transaction buffers
//! for the IPC$ named-pipe core.

pub mod error;
pub mod frame;
pub mod header;
pub mod open;
pub mod transaction;

pub use error::{Result, SmbMsgError};
pub use frame::Smb1Frame;
pub use header::{Command, Flags2, LegacyClass, Status};
pub use transaction::{TransactionAccumulator, TransactionBuffer, TransactionKind};
