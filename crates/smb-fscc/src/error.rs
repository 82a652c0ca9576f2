use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FsccError {
    #[error("unsupported Trans2 query-file information level {0:#06x}")]
    UnsupportedInfoLevel(u16),
}

pub type Result<T> = std::result::Result<T, FsccError>;
