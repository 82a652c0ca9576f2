//! Errors raised while decoding an SMB1 frame or transaction buffer.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SmbMsgError {
    #[error(transparent)]
    Wire(#[from] smb_dtyp::WireError),

    #[error("truncated or misaligned frame: {0}")]
    MalformedFrame(String),

    #[error("duplicate or out-of-range transaction fragment displacement")]
    MalformedFragment,
}

pub type Result<T> = std::result::Result<T, SmbMsgError>;
