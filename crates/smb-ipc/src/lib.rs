//! IPC$ command dispatch: ties the SMB1 frame view, transaction parsing,
//! and DCE/RPC handler into the single `process_ipc` entry point.

pub mod collaborators;
pub mod dispatcher;
pub mod error;

pub use collaborators::{AssociatedPacket, PacketPool, PipeLanmanHandler, RpcEndpoint, Session, TreeConnection};
pub use dispatcher::process_ipc;
pub use error::{IpcError, Result};
