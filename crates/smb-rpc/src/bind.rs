//! BIND / BIND_ACK handshake.
//!
//! This core only implements the minimal handshake shape: max fragment
//! sizes, one presentation context, and the two embedded UUIDs.
//! It does not parse or emit syntax version numbers, multiple context
//! elements, or security context negotiation; none of those are in scope.

use smb_dtyp::guid::Guid;

use crate::buffer::DceBuffer;
use crate::error::Result;
use crate::header::{DceFlags, PduType};

/// The assoc-group id every BIND_ACK this core emits advertises.
pub const ASSOC_GROUP: u32 = 0x53F0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BindRequest {
    pub call_id: u32,
    pub max_tx_frag: u16,
    pub max_rx_frag: u16,
    pub group_id: u32,
    pub pres_context_id: u16,
    pub interface_uuid: Guid,
    pub transfer_syntax_uuid: Guid,
}

/// Parses a BIND PDU body: max_tx, max_rx, group id, one presentation
/// context (`pres_ctx_id`, transfer-syntax count), then the interface and
/// transfer-syntax UUIDs, each preceded by a referent-present marker.
pub fn parse_bind_request(dce: &mut DceBuffer) -> Result<BindRequest> {
    let call_id = dce.call_id()?;
    let max_tx_frag = dce.get_short(true)?;
    let max_rx_frag = dce.get_short(true)?;
    let group_id = dce.get_int(true)?;
    let _n_context_elements = dce.get_byte(false)?;
    let pres_context_id = dce.get_short(true)?;
    let _n_transfer_syntaxes = dce.get_byte(false)?;
    let interface_uuid = dce.get_uuid(true)?;
    let transfer_syntax_uuid = dce.get_uuid(true)?;
    Ok(BindRequest {
        call_id,
        max_tx_frag,
        max_rx_frag,
        group_id,
        pres_context_id,
        interface_uuid,
        transfer_syntax_uuid,
    })
}

/// Builds a BIND_ACK: header (call id echoed, `ONLY_FRAG`), max_tx, max_rx,
/// the fixed assoc-group, the pipe's server-side secondary address
/// (ASCII+NUL, 4-byte aligned), one accepted result, and the echoed
/// transfer-syntax UUID with its referent marker.
pub fn build_bind_ack(
    call_id: u32,
    max_tx_frag: u16,
    max_rx_frag: u16,
    secondary_address: &str,
    transfer_syntax_uuid: Guid,
) -> Result<DceBuffer> {
    let mut dce = DceBuffer::new();
    dce.put_bind_ack_header(call_id)?;
    dce.put_short(false, max_tx_frag);
    dce.put_short(false, max_rx_frag);
    dce.put_int(false, ASSOC_GROUP);

    let mut addr = secondary_address.as_bytes().to_vec();
    addr.push(0);
    dce.put_short(false, addr.len() as u16);
    dce.put_bytes(&addr);

    dce.put_int(true, 1); // one accepted result
    dce.put_short(false, 0); // result
    dce.put_short(false, 0); // ack reason
    dce.put_uuid(transfer_syntax_uuid, true);

    dce.finalize_frag_length()?;
    Ok(dce)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRVSVC_INTERFACE: Guid = Guid::new(
        0x4B32_4FC8,
        0x1670,
        0x01D3,
        [0x12, 0x78, 0x5A, 0x47, 0xBF, 0x6E, 0xE1, 0x88],
    );
    const NDR_TRANSFER_SYNTAX: Guid = Guid::new(
        0x8A88_5D04,
        0x1CEB,
        0x11C9,
        [0x9F, 0xE8, 0x08, 0x00, 0x2B, 0x10, 0x48, 0x60],
    );

    fn build_bind_pdu(call_id: u32, max_tx: u16, max_rx: u16, group: u32) -> Vec<u8> {
        let mut dce = DceBuffer::new();
        dce.put_header(PduType::Bind, DceFlags::only_frag(), call_id)
            .unwrap();
        dce.put_short(false, max_tx);
        dce.put_short(false, max_rx);
        dce.put_int(true, group);
        dce.put_byte(1); // n context elements
        dce.put_short(true, 0); // pres context id
        dce.put_byte(1); // n transfer syntaxes
        dce.put_uuid(SRVSVC_INTERFACE, true);
        dce.put_uuid(NDR_TRANSFER_SYNTAX, true);
        dce.finalize_frag_length().unwrap();
        dce.into_bytes()
    }

    #[test]
    fn parses_srvsvc_bind() {
        let pdu = build_bind_pdu(1, 4280, 4280, 0);
        let mut dce = DceBuffer::from_pdu(&pdu);
        let bind = parse_bind_request(&mut dce).unwrap();
        assert_eq!(bind.call_id, 1);
        assert_eq!(bind.max_tx_frag, 4280);
        assert_eq!(bind.max_rx_frag, 4280);
        assert_eq!(bind.interface_uuid, SRVSVC_INTERFACE);
        assert_eq!(bind.transfer_syntax_uuid, NDR_TRANSFER_SYNTAX);
    }

    #[test]
    fn bind_ack_correlates_call_id_and_echoes_sizes() {
        let pdu = build_bind_pdu(7, 4280, 2048, 0);
        let mut dce = DceBuffer::from_pdu(&pdu);
        let bind = parse_bind_request(&mut dce).unwrap();

        let ack = build_bind_ack(
            bind.call_id,
            bind.max_tx_frag,
            bind.max_rx_frag,
            r"\PIPE\srvsvc",
            bind.transfer_syntax_uuid,
        )
        .unwrap();

        assert_eq!(ack.call_id().unwrap(), 7);
        assert_eq!(ack.pdu_type().unwrap(), PduType::BindAck);
        assert_eq!(ack.frag_length().unwrap() as usize, ack.len());

        let body = &ack.as_bytes()[16..];
        assert_eq!(u16::from_le_bytes([body[0], body[1]]), 4280);
        assert_eq!(u16::from_le_bytes([body[2], body[3]]), 2048);
        assert!(ack.as_bytes().windows(13).any(|w| w == b"\\PIPE\\srvsvc\0"));
    }
}
