//! Framing of Transact/Write/Read onto DCE PDUs, and the `process_pdu`
//! BIND/REQUEST dispatch.
//!
//! `Smb1Frame` is a non-owning view over a caller-supplied `&mut [u8]`, so
//! a reply that doesn't fit the buffer the request arrived in can't be
//! handled by resizing that view in place. The Transact and Read reply
//! paths work around this by checking the required size up front: when it
//! exceeds the frame's buffer, they ask `Session::packet_pool()` for a
//! bigger one (seeded with the original buffer's header prefix), build the
//! reply into a fresh `Smb1Frame` over that, and hand it to
//! `Session::send_response` directly instead of leaving it in the
//! caller's (too-small) frame.

use smb_msg::header::OFF_PARAMS;
use smb_msg::{LegacyClass, Smb1Frame, Status, TransactionBuffer};

use crate::bind;
use crate::buffer::DceBuffer;
use crate::collaborators::Session;
use crate::error::{Result, SmbRpcError};
use crate::header::{DceFlags, PduType};
use crate::pipe::PipeFile;
use crate::registry::EndpointRegistry;

/// Allocates a larger buffer from `session`'s packet pool, preserving the
/// first `preserve_prefix` bytes of `frame`'s current buffer (the SMB
/// header and anything else the reply shape leaves untouched), and sends
/// whatever `build` writes into it straight through
/// `Session::send_response`.
fn deliver_grown<F>(
    frame: &Smb1Frame,
    session: &mut dyn Session,
    needed: usize,
    preserve_prefix: usize,
    build: F,
) -> Result<()>
where
    F: FnOnce(&mut Smb1Frame) -> Result<()>,
{
    let mut grown = session.packet_pool().allocate(needed, frame.raw(), preserve_prefix);
    let mut bigger = Smb1Frame::new(&mut grown.buf);
    build(&mut bigger)?;
    session
        .send_response(bigger.raw())
        .map_err(|e| SmbRpcError::ProtocolViolation(format!("sending grown reply: {e}")))?;
    Ok(())
}

/// The Transact-NmPipe reply path writes `max_data + OPERATIONDATA` bytes
/// even when the buffered reply was exactly `max_data` long: a documented compatibility quirk, reproduced verbatim rather than
/// "corrected".
pub const OPERATIONDATA: usize = 4;

/// Dispatches on the DCE PDU type.
///
/// `REQUEST` on a pipe that hasn't seen `BIND` is rejected.
pub fn process_pdu(
    dce: &mut DceBuffer,
    pipe: &mut PipeFile,
    registry: &EndpointRegistry,
    session: &mut dyn Session,
    frame: &mut Smb1Frame,
) -> Result<()> {
    match dce.pdu_type()? {
        PduType::Bind => {
            let req = bind::parse_bind_request(dce)?;
            pipe.negotiate(req.max_tx_frag, req.max_rx_frag);
            let secondary_address = format!("\\PIPE\\{}", pipe.kind().path_name());
            let ack = bind::build_bind_ack(
                req.call_id,
                req.max_tx_frag,
                req.max_rx_frag,
                &secondary_address,
                req.transfer_syntax_uuid,
            )?;
            log::debug!(
                "BIND call_id={} pipe={:?} max_tx={} max_rx={}",
                req.call_id,
                pipe.kind(),
                req.max_tx_frag,
                req.max_rx_frag
            );
            pipe.set_buffered_data(Some(ack))?;
            Ok(())
        }
        PduType::Request => {
            if !pipe.is_bound() {
                return Err(SmbRpcError::ProtocolViolation(
                    "REQUEST received before BIND".into(),
                ));
            }
            let _alloc_hint = dce.get_int(true)?;
            let _context_id = dce.get_short(true)?;
            let _opnum = dce.get_short(true)?;
            let endpoint = registry.lookup(pipe.kind()).ok_or_else(|| {
                SmbRpcError::ProtocolViolation(format!(
                    "no RPC endpoint registered for {:?}",
                    pipe.kind()
                ))
            })?;
            endpoint.process_request(session, dce, pipe, frame)
        }
        other => Err(SmbRpcError::ProtocolViolation(format!(
            "PDU type {other:?} is neither BIND nor REQUEST"
        ))),
    }
}

/// A TRANSACTION reply's parameter count: parameter 1 and parameter 6 both
/// carry the data length, the rest are zero.
const TRANSACTION_REPLY_PARAMS: usize = 10;

/// Packs a TRANSACTION reply carrying `data` at the given status: parameter
/// 1 and parameter 6 both set to the data length, byte-count the bytes
/// written, status as a long error code.
fn pack_transaction_reply(frame: &mut Smb1Frame, data: &[u8], status: Status) -> Result<()> {
    frame.set_parameter_count(TRANSACTION_REPLY_PARAMS as u8)?;
    frame.set_parameter(1, data.len() as u16)?;
    frame.set_parameter(6, data.len() as u16)?;
    frame.set_byte_count(data.len() as u16)?;
    frame.write_bytes_at(0, data)?;
    frame.set_long_error_code(status as u32)?;
    frame.set_response()?;
    Ok(())
}

/// Packs and delivers a TRANSACTION reply, growing into a packet-pool
/// buffer when `frame`'s own buffer is too small for `data`.
fn deliver_transaction_reply(
    frame: &mut Smb1Frame,
    session: &mut dyn Session,
    data: &[u8],
    status: Status,
) -> Result<()> {
    let reply_byte_offset = OFF_PARAMS + TRANSACTION_REPLY_PARAMS * 2 + 2;
    let needed = reply_byte_offset + data.len();
    if needed <= frame.raw().len() {
        return pack_transaction_reply(frame, data, status);
    }

    log::debug!("TransactNmPipe: reply of {needed} bytes does not fit the request buffer, growing");
    deliver_grown(frame, session, needed, OFF_PARAMS, |bigger| {
        pack_transaction_reply(bigger, data, status)
    })
}

/// The `TransactNmPipe` path.
pub fn transact_nmpipe(
    frame: &mut Smb1Frame,
    tbuf: &TransactionBuffer,
    pipe: &mut PipeFile,
    registry: &EndpointRegistry,
    session: &mut dyn Session,
) -> Result<()> {
    let max_data = tbuf.return_data_limit().saturating_sub(OPERATIONDATA);
    let mut dce_in = DceBuffer::from_pdu(tbuf.data_buf());

    if let Err(e) = process_pdu(&mut dce_in, pipe, registry, session, frame) {
        log::debug!("TransactNmPipe: process_pdu rejected the request: {e}");
        frame.send_error(Status::AccessDenied, LegacyClass::Server)?;
        return Ok(());
    }

    let buffered_len = pipe.peek_buffered_data().map(|b| b.len());
    let (status, out) = match buffered_len {
        None => (Status::Success, Vec::new()),
        Some(len) if len <= max_data => {
            (Status::Success, pipe.take_buffered_data().unwrap().into_bytes())
        }
        Some(_) => {
            let take = max_data + OPERATIONDATA;
            let pending = pipe.buffered_data_mut().expect("checked Some above");
            let n = take.min(pending.available());
            let mut out = vec![0u8; n];
            pending.copy_data(&mut out, 0, n)?;
            (Status::BufferOverflow, out)
        }
    };

    deliver_transaction_reply(frame, session, &out, status)
}

/// `WriteFile`: payload is prefixed by a `DataBlock`
/// marker byte (`0x01`) and a 16-bit length.
pub fn write_file(
    frame: &mut Smb1Frame,
    pipe: &mut PipeFile,
    registry: &EndpointRegistry,
    session: &mut dyn Session,
) -> Result<()> {
    let bytes = frame.bytes()?;
    if bytes.len() < 3 || bytes[0] != 0x01 {
        frame.send_error(Status::InvalidData, LegacyClass::Dos)?;
        return Ok(());
    }
    let len = u16::from_le_bytes([bytes[1], bytes[2]]) as usize;
    let payload = bytes
        .get(3..3 + len)
        .ok_or_else(|| {
            SmbRpcError::MalformedPdu("WriteFile DataBlock length exceeds byte region".into())
        })?
        .to_vec();

    let mut dce_in = DceBuffer::from_pdu(&payload);
    if let Err(e) = process_pdu(&mut dce_in, pipe, registry, session, frame) {
        log::debug!("WriteFile: process_pdu rejected the request: {e}");
        frame.send_error(Status::AccessDenied, LegacyClass::Server)?;
        return Ok(());
    }

    frame.set_parameter_count(1)?;
    frame.set_parameter(0, len as u16)?;
    frame.set_byte_count(0)?;
    frame.set_response()
}

/// `WriteAndX`: length at parameter word 10, the
/// SMB-header-relative data offset at word 11.
pub fn write_andx(
    frame: &mut Smb1Frame,
    pipe: &mut PipeFile,
    registry: &EndpointRegistry,
    session: &mut dyn Session,
) -> Result<()> {
    let len = frame.parameter_word(10)? as usize;
    let data_offset_word = frame.parameter_word(11)? as usize;
    let abs_offset = smb_msg::header::NBT_PREFIX_LEN + data_offset_word;
    let payload = smb_dtyp::codec::read_bytes(frame.raw(), abs_offset, len)?.to_vec();

    let mut dce_in = DceBuffer::from_pdu(&payload);
    if let Err(e) = process_pdu(&mut dce_in, pipe, registry, session, frame) {
        log::debug!("WriteAndX: process_pdu rejected the request: {e}");
        frame.send_error(Status::AccessDenied, LegacyClass::Server)?;
        return Ok(());
    }

    let pending_len = pipe.peek_buffered_data().map(|b| b.len()).unwrap_or(0) as u16;

    frame.set_parameter_count(6)?;
    frame.set_parameter(0, 0xFF)?;
    frame.set_parameter(1, 0)?;
    frame.set_parameter(2, len as u16)?;
    frame.set_parameter(3, pending_len)?;
    frame.set_parameter(4, 0)?;
    frame.set_parameter(5, 0)?;
    frame.set_byte_count(0)?;
    frame.set_response()
}

fn drain_pending(pipe: &mut PipeFile, requested: usize) -> Result<Vec<u8>> {
    let pending = pipe
        .buffered_data_mut()
        .expect("caller checked has_buffered_data");
    pending.set_flags(DceFlags::only_frag())?;
    pending.finalize_frag_length()?;
    let rd_len = requested.min(pending.available());
    let mut payload = vec![0u8; rd_len];
    pending.copy_data(&mut payload, 0, rd_len)?;
    if pending.available() == 0 {
        pipe.take_buffered_data();
    }
    Ok(payload)
}

fn write_read_file_reply(frame: &mut Smb1Frame, payload: &[u8]) -> Result<()> {
    let rd_len = payload.len();
    frame.set_parameter_count(5)?;
    frame.set_parameter(0, rd_len as u16)?;
    frame.set_byte_count((rd_len + 3) as u16)?;
    frame.write_bytes_at(0, &[0x01])?;
    frame.write_bytes_at(1, &(rd_len as u16).to_le_bytes())?;
    frame.write_bytes_at(3, payload)?;
    frame.set_response()
}

/// `ReadFile`: zero-length read when
/// `pending` is empty, else up to `requested` bytes prefixed by a
/// `DataBlock` marker and 16-bit length. Grows into a packet-pool buffer,
/// delivered through `session`, when the drained payload doesn't fit the
/// request's own buffer.
pub fn read_file(
    frame: &mut Smb1Frame,
    requested: u16,
    pipe: &mut PipeFile,
    session: &mut dyn Session,
) -> Result<()> {
    if !pipe.has_buffered_data() {
        frame.set_parameter_count(5)?;
        frame.set_byte_count(0)?;
        return frame.set_response();
    }

    let avail = pipe.peek_buffered_data().map(|b| b.len()).unwrap_or(0);
    let rd_len = (requested as usize).min(avail);
    let needed = frame.byte_offset()? + 3 + rd_len;

    if needed <= frame.raw().len() {
        let payload = drain_pending(pipe, requested as usize)?;
        return write_read_file_reply(frame, &payload);
    }

    log::debug!("ReadFile: reply of {needed} bytes does not fit the request buffer, growing");
    let preserve = OFF_PARAMS;
    let payload = drain_pending(pipe, requested as usize)?;
    deliver_grown(frame, session, needed, preserve, |bigger| {
        write_read_file_reply(bigger, &payload)
    })
}

fn write_read_andx_reply(frame: &mut Smb1Frame, payload: &[u8]) -> Result<()> {
    let rd_len = payload.len();
    frame.set_parameter_count(12)?;
    frame.set_parameter(0, 0xFF)?;
    let byte_offset = frame.byte_offset()?;
    let aligned_offset = smb_dtyp::codec::longword_align(byte_offset);
    frame.set_parameter(5, rd_len as u16)?;
    frame.set_parameter(6, aligned_offset as u16)?;
    let byte_count = (aligned_offset + rd_len).saturating_sub(byte_offset);
    frame.set_byte_count(byte_count as u16)?;
    frame.write_bytes_at(aligned_offset - byte_offset, payload)?;
    frame.set_response()
}

/// `ReadAndX`: 12 parameter words,
/// `AndX=0xFF`, a longword-aligned data offset relative to the transport
/// header at parameter 6. Grows into a packet-pool buffer, delivered
/// through `session`, when the drained payload doesn't fit the request's
/// own buffer.
pub fn read_andx(
    frame: &mut Smb1Frame,
    requested: u16,
    pipe: &mut PipeFile,
    session: &mut dyn Session,
) -> Result<()> {
    if !pipe.has_buffered_data() {
        frame.set_parameter_count(12)?;
        frame.set_parameter(0, 0xFF)?;
        frame.set_byte_count(0)?;
        return frame.set_response();
    }

    let avail = pipe.peek_buffered_data().map(|b| b.len()).unwrap_or(0);
    let rd_len = (requested as usize).min(avail);
    let aligned_offset = smb_dtyp::codec::longword_align(frame.byte_offset()?);
    let needed = aligned_offset + rd_len;

    if needed <= frame.raw().len() {
        let payload = drain_pending(pipe, requested as usize)?;
        return write_read_andx_reply(frame, &payload);
    }

    log::debug!("ReadAndX: reply of {needed} bytes does not fit the request buffer, growing");
    let preserve = OFF_PARAMS;
    let payload = drain_pending(pipe, requested as usize)?;
    deliver_grown(frame, session, needed, preserve, |bigger| {
        write_read_andx_reply(bigger, &payload)
    })
}
