//! Map from pipe kind to the RPC endpoint that services its DCE REQUEST
//! opcodes. The registry only dispatches; endpoint
//! implementations are external.

use std::collections::HashMap;

use crate::collaborators::RpcEndpoint;
use crate::pipe::PipeKind;

#[derive(Default)]
pub struct EndpointRegistry {
    handlers: HashMap<PipeKind, Box<dyn RpcEndpoint>>,
}

impl EndpointRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: PipeKind, handler: Box<dyn RpcEndpoint>) {
        self.handlers.insert(kind, handler);
    }

    pub fn lookup(&self, kind: PipeKind) -> Option<&dyn RpcEndpoint> {
        self.handlers.get(&kind).map(|b| b.as_ref())
    }
}
