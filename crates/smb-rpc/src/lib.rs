//! DCE/RPC PDU framing, the BIND handshake, per-pipe state, and the
//! TransactNmPipe/Read/Write glue that turns an SMB1 TRANSACTION or
//! Read/WriteAndX into a dispatched DCE REQUEST.
//!
//! Endpoint implementations (SRVSVC, WKSSVC, ...) live outside this crate;
//! [`registry::EndpointRegistry`] only routes a bound pipe's REQUEST PDUs
//! to whichever [`collaborators::RpcEndpoint`] is registered for its kind.

pub mod bind;
pub mod buffer;
pub mod collaborators;
pub mod error;
pub mod handler;
pub mod header;
pub mod pipe;
pub mod registry;

pub use bind::{BindRequest, build_bind_ack, parse_bind_request};
pub use buffer::DceBuffer;
pub use collaborators::{AssociatedPacket, PacketPool, RpcEndpoint, Session};
pub use error::{Result, SmbRpcError};
pub use handler::{process_pdu, read_andx, read_file, transact_nmpipe, write_andx, write_file};
pub use header::{DceFlags, PduType};
pub use pipe::{ACCESS_READ_WRITE, PipeFile, PipeKind, PipeState};
pub use registry::EndpointRegistry;
