//! External interfaces this layer invokes but never implements.

use crate::buffer::DceBuffer;
use crate::error::SmbRpcError;
use crate::pipe::PipeFile;
use smb_msg::{LegacyClass, Smb1Frame};

/// A reply buffer allocated mid-request because the original one was too
/// small, linked one-way to the request buffer that spawned it so the
/// caller can release both at completion. The link is
/// strictly parent→child; no cycles are constructible.
pub struct AssociatedPacket {
    pub buf: Vec<u8>,
    child: Option<Box<AssociatedPacket>>,
}

impl AssociatedPacket {
    pub fn new(buf: Vec<u8>) -> Self {
        Self { buf, child: None }
    }

    pub fn attach(&mut self, child: AssociatedPacket) {
        self.child = Some(Box::new(child));
    }

    pub fn child(&self) -> Option<&AssociatedPacket> {
        self.child.as_deref()
    }
}

/// Process-wide packet allocator. Implementations must be
/// safe for concurrent calls; this core never assumes exclusivity over it.
pub trait PacketPool {
    /// Allocates a buffer of `size` bytes, copying the first
    /// `preserve_prefix` bytes of `parent` into it so the SMB header need
    /// not be rebuilt.
    fn allocate(&self, size: usize, parent: &[u8], preserve_prefix: usize) -> AssociatedPacket;
}

/// The owning session, used to send responses/errors and reach the packet
/// pool.
pub trait Session {
    fn send_response(&mut self, frame: &[u8]) -> std::io::Result<()>;
    fn send_error(
        &mut self,
        frame: &mut Smb1Frame,
        status: u32,
        class: LegacyClass,
    ) -> std::io::Result<()>;
    fn packet_pool(&self) -> &dyn PacketPool;
}

/// A pipe-name-addressed RPC service. The endpoint marshals its response
/// into a fresh [`DceBuffer`] with a `RESPONSE` header (call id echoed,
/// `ONLY_FRAG`, fragment length set) and leaves it as `pipe.pending`.
/// Endpoint implementations (SRVSVC, WKSSVC, ...) are
/// out of scope here; only the dispatch skeleton is.
pub trait RpcEndpoint {
    fn process_request(
        &self,
        session: &mut dyn Session,
        dce_in: &mut DceBuffer,
        pipe: &mut PipeFile,
        frame: &mut Smb1Frame,
    ) -> Result<(), SmbRpcError>;
}
