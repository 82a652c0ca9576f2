//! Per-open-handle named-pipe state.

use crate::buffer::DceBuffer;
use crate::error::{Result, SmbRpcError};

/// The named pipes this core knows how to route to a registered RPC
/// endpoint. Anything else opens
/// as `Invalid` and is refused once no handler is found for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipeKind {
    Srvsvc,
    Wkssvc,
    Lsarpc,
    Samr,
    Winreg,
    Netlogon,
    Eventlog,
    Atsvc,
    Spoolss,
    Invalid,
}

impl PipeKind {
    /// Resolves a `\PIPE\<name>` path (case-insensitive, optional leading
    /// `\PIPE\`) to a kind.
    pub fn from_path(path: &str) -> Self {
        let name = path
            .rsplit('\\')
            .next()
            .unwrap_or(path)
            .to_ascii_lowercase();
        match name.as_str() {
            "srvsvc" => Self::Srvsvc,
            "wkssvc" => Self::Wkssvc,
            "lsarpc" => Self::Lsarpc,
            "samr" => Self::Samr,
            "winreg" => Self::Winreg,
            "netlogon" => Self::Netlogon,
            "eventlog" => Self::Eventlog,
            "atsvc" => Self::Atsvc,
            "spoolss" => Self::Spoolss,
            _ => Self::Invalid,
        }
    }

    /// The canonical lowercase pipe name, as advertised in a BIND_ACK
    /// secondary address (`\PIPE\<name>`).
    pub fn path_name(self) -> &'static str {
        match self {
            Self::Srvsvc => "srvsvc",
            Self::Wkssvc => "wkssvc",
            Self::Lsarpc => "lsarpc",
            Self::Samr => "samr",
            Self::Winreg => "winreg",
            Self::Netlogon => "netlogon",
            Self::Eventlog => "eventlog",
            Self::Atsvc => "atsvc",
            Self::Spoolss => "spoolss",
            Self::Invalid => "",
        }
    }
}

/// The pipe-state bits set by `SetNmPHandState`. Bits 0..13
/// are preserved verbatim without this core interpreting them; only the
/// two unambiguous top bits get named accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PipeState(u16);

impl PipeState {
    pub fn from_raw(v: u16) -> Self {
        Self(v)
    }

    pub fn raw(self) -> u16 {
        self.0
    }

    pub fn blocking(self) -> bool {
        self.0 & 0x8000 != 0
    }

    pub fn endpoint_is_server(self) -> bool {
        self.0 & 0x4000 != 0
    }
}

/// Read/write access granted at open time. The core only ever opens pipes
/// read/write.
pub const ACCESS_READ_WRITE: u32 = 0x0003;

/// Per-open-handle state for one IPC$ named pipe.
/// Owned by a tree connection's open-file table.
pub struct PipeFile {
    kind: PipeKind,
    access: u32,
    max_tx_frag: u16,
    max_rx_frag: u16,
    state: PipeState,
    bound: bool,
    pending: Option<DceBuffer>,
}

impl PipeFile {
    pub fn new(kind: PipeKind) -> Self {
        Self {
            kind,
            access: ACCESS_READ_WRITE,
            max_tx_frag: 0,
            max_rx_frag: 0,
            state: PipeState::default(),
            bound: false,
            pending: None,
        }
    }

    pub fn kind(&self) -> PipeKind {
        self.kind
    }

    pub fn access(&self) -> u32 {
        self.access
    }

    pub fn is_bound(&self) -> bool {
        self.bound
    }

    /// Records the fragment sizes negotiated by a BIND and marks the pipe
    /// bound.
    pub fn negotiate(&mut self, max_tx_frag: u16, max_rx_frag: u16) {
        self.max_tx_frag = max_tx_frag;
        self.max_rx_frag = max_rx_frag;
        self.bound = true;
    }

    pub fn max_tx_frag(&self) -> u16 {
        self.max_tx_frag
    }

    pub fn max_rx_frag(&self) -> u16 {
        self.max_rx_frag
    }

    pub fn pipe_state(&self) -> PipeState {
        self.state
    }

    /// `SetNmPHandState`: overwrites the state bits verbatim.
    pub fn set_pipe_state(&mut self, bits: u16) {
        self.state = PipeState::from_raw(bits);
    }

    pub fn has_buffered_data(&self) -> bool {
        self.pending.is_some()
    }

    pub fn peek_buffered_data(&self) -> Option<&DceBuffer> {
        self.pending.as_ref()
    }

    pub fn buffered_data_mut(&mut self) -> Option<&mut DceBuffer> {
        self.pending.as_mut()
    }

    pub fn take_buffered_data(&mut self) -> Option<DceBuffer> {
        self.pending.take()
    }

    /// The single mutation point for the pending reply. Setting `Some` over
    /// an already-`Some` slot is a protocol violation:
    /// a new reply must never silently clobber an undelivered one.
    pub fn set_buffered_data(&mut self, data: Option<DceBuffer>) -> Result<()> {
        if data.is_some() && self.pending.is_some() {
            return Err(SmbRpcError::ProtocolViolation(
                "pipe already has an undelivered pending reply".into(),
            ));
        }
        self.pending = data;
        Ok(())
    }
}
