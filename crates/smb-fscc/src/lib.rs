//! The narrow slice of MS-FSCC (File System Control Codes) file information
//! classes the IPC$ named-pipe core needs to answer Trans2QueryFile: just
//! enough to synthesize a fixed reply, never anything read off a real
//! filesystem object.

pub mod error;
pub mod query_file_info;

pub use error::{FsccError, Result};
pub use query_file_info::{
    FileInternalInformation, FileStandardInformation, QueryFileInfoLevel, pack, synth_internal_info,
    synth_standard_info,
};
