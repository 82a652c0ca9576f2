use thiserror::Error;

#[derive(Debug, Error)]
pub enum SmbRpcError {
    #[error(transparent)]
    Wire(#[from] smb_dtyp::WireError),

    #[error(transparent)]
    Msg(#[from] smb_msg::SmbMsgError),

    #[error("malformed DCE/RPC PDU: {0}")]
    MalformedPdu(String),

    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

pub type Result<T> = std::result::Result<T, SmbRpcError>;
