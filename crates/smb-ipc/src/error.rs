//! IPC dispatch error kinds and their NT-status/legacy-class mapping.

use smb_msg::{LegacyClass, Status};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    #[error("tree id not found on the virtual circuit")]
    InvalidTreeId,

    #[error("unknown file id {0:#06x} on this tree")]
    InvalidHandle(u16),

    #[error("expected DataBlock marker in write payload")]
    InvalidData,

    #[error(transparent)]
    MalformedFrame(#[from] smb_msg::SmbMsgError),

    #[error(transparent)]
    Rpc(#[from] smb_rpc::SmbRpcError),

    #[error("unsupported transaction sub-function {0:#06x}")]
    UnsupportedFunction(u16),

    #[error(transparent)]
    Fscc(#[from] smb_fscc::FsccError),

    #[error("open-file table is full")]
    TooManyFiles,
}

pub type Result<T> = std::result::Result<T, IpcError>;

impl IpcError {
    /// Maps an `IpcError` to the (status, legacy class) pair the dispatcher
    /// writes back to the client. `BufferOverflow` has no
    /// variant here: it is never an error, and is handled as a status value
    /// directly inside `smb_rpc::handler::transact_nmpipe`.
    pub fn to_status(&self) -> (Status, LegacyClass) {
        match self {
            Self::InvalidTreeId => (Status::InvalidDrive, LegacyClass::Dos),
            Self::InvalidHandle(_) => (Status::InvalidHandle, LegacyClass::Dos),
            Self::InvalidData => (Status::InvalidData, LegacyClass::Dos),
            Self::MalformedFrame(_) => (Status::UnrecognizedCommand, LegacyClass::Server),
            Self::Rpc(smb_rpc::SmbRpcError::ProtocolViolation(_)) => {
                (Status::AccessDenied, LegacyClass::Server)
            }
            Self::Rpc(_) => (Status::UnrecognizedCommand, LegacyClass::Server),
            Self::UnsupportedFunction(_) => (Status::UnrecognizedCommand, LegacyClass::Server),
            Self::Fscc(_) => (Status::InvalidParameter, LegacyClass::Server),
            Self::TooManyFiles => (Status::TooManyOpenFiles, LegacyClass::Dos),
        }
    }

    /// Writes this error to `frame` as an SMB error response.
    pub fn send_to(&self, frame: &mut smb_msg::Smb1Frame) -> smb_msg::Result<()> {
        let (status, legacy) = self.to_status();
        frame.send_error(status, legacy)
    }
}
