//! External interfaces this dispatcher invokes but never implements.
//! `Session`/`PacketPool`/`RpcEndpoint` are defined in
//! `smb-rpc` rather than here (the DCE/RPC handler needs them too, and
//! `smb-ipc` depends on `smb-rpc`, not the other way around); they are
//! re-exported so callers only need this one module.

pub use smb_rpc::collaborators::{AssociatedPacket, PacketPool, RpcEndpoint, Session};

use smb_msg::{Smb1Frame, TransactionBuffer};
use smb_rpc::PipeFile;

use crate::error::IpcError;

/// A tree connection's open-file table, keyed by 16-bit file id.
/// Realized with `&mut self` throughout, since a
/// lookup that must hand back `&mut PipeFile` cannot be expressed on a
/// shared receiver.
pub trait TreeConnection {
    fn find_file(&mut self, fid: u16) -> Option<&mut PipeFile>;
    fn add_file(&mut self, file: PipeFile) -> Result<u16, IpcError>;
    fn remove_file(&mut self, fid: u16) -> Result<(), IpcError>;
}

/// The external `\PIPE\LANMAN` handler. Returns
/// `false` to let the dispatcher fall through to its own handling.
pub trait PipeLanmanHandler {
    fn process(&self, tbuf: &TransactionBuffer, session: &mut dyn Session, frame: &mut Smb1Frame) -> bool;
}
