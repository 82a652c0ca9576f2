//! A growable DCE/RPC PDU container with independent read/write cursors.
//! Used both to view an incoming PDU (cursor starts past
//! the header) and to build an outgoing one (header written first, body
//! appended as the container grows).

use smb_dtyp::codec::{
    longword_align, octaword_align, read_bytes, read_u16_le, read_u32_le, read_u64_le, read_u8,
    word_align, write_bytes, write_u16_le, write_u32_le, write_u8,
};
use smb_dtyp::guid::{Guid, REFERENT_PRESENT};

use crate::error::{Result, SmbRpcError};
use crate::header::{
    DATA_REP_LE_ASCII_IEEE, DceFlags, HEADER_LEN, OFF_AUTH_LEN, OFF_CALL_ID, OFF_DATA_REP,
    OFF_FLAGS, OFF_FRAG_LEN, OFF_PDU_TYPE, OFF_VERSION, OFF_VERSION_MINOR, PduType, VERSION_MAJOR,
    VERSION_MINOR,
};

#[derive(Debug, Clone)]
pub struct DceBuffer {
    buf: Vec<u8>,
    read_pos: usize,
}

impl DceBuffer {
    /// Wraps a complete incoming PDU (header + body); the read cursor
    /// starts just past the 16-byte header.
    pub fn from_pdu(bytes: &[u8]) -> Self {
        Self {
            buf: bytes.to_vec(),
            read_pos: HEADER_LEN.min(bytes.len()),
        }
    }

    /// An empty container for building an outgoing PDU from scratch.
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            read_pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Bytes not yet consumed by the read cursor.
    pub fn available(&self) -> usize {
        self.buf.len().saturating_sub(self.read_pos)
    }

    // -- header accessors --

    pub fn pdu_type(&self) -> Result<PduType> {
        let raw = read_u8(&self.buf, OFF_PDU_TYPE)?;
        PduType::from_u8(raw)
            .ok_or_else(|| SmbRpcError::MalformedPdu(format!("unknown PDU type {raw:#04x}")))
    }

    pub fn flags(&self) -> Result<DceFlags> {
        Ok(DceFlags::from_raw(read_u8(&self.buf, OFF_FLAGS)?))
    }

    pub fn call_id(&self) -> Result<u32> {
        read_u32_le(&self.buf, OFF_CALL_ID).map_err(Into::into)
    }

    pub fn frag_length(&self) -> Result<u16> {
        read_u16_le(&self.buf, OFF_FRAG_LEN).map_err(Into::into)
    }

    /// Writes the 16-byte PDU header: version 5.0, `pdu_type`, `flags`,
    /// LE/ASCII/IEEE data rep, zero auth length, `call_id`. Fragment
    /// length is left at zero; call [`Self::finalize_frag_length`] once
    /// the body is complete.
    pub fn put_header(&mut self, pdu_type: PduType, flags: DceFlags, call_id: u32) -> Result<()> {
        self.buf.clear();
        self.buf.resize(HEADER_LEN, 0);
        write_u8(&mut self.buf, OFF_VERSION, VERSION_MAJOR)?;
        write_u8(&mut self.buf, OFF_VERSION_MINOR, VERSION_MINOR)?;
        write_u8(&mut self.buf, OFF_PDU_TYPE, pdu_type as u8)?;
        write_u8(&mut self.buf, OFF_FLAGS, flags.to_raw())?;
        write_bytes(&mut self.buf, OFF_DATA_REP, &DATA_REP_LE_ASCII_IEEE)?;
        write_u16_le(&mut self.buf, OFF_FRAG_LEN, 0)?;
        write_u16_le(&mut self.buf, OFF_AUTH_LEN, 0)?;
        write_u32_le(&mut self.buf, OFF_CALL_ID, call_id)?;
        Ok(())
    }

    /// `put_bind_ack_header`: a complete BIND_ACK header,
    /// single-fragment, zero auth length, the caller's call id.
    pub fn put_bind_ack_header(&mut self, call_id: u32) -> Result<()> {
        self.put_header(PduType::BindAck, DceFlags::only_frag(), call_id)
    }

    /// Overwrites the header's flags byte in place, used when a buffer
    /// built earlier (e.g. a BIND_ACK stashed as `pending`) needs its
    /// framing finalized just before being copied out to the client.
    pub fn set_flags(&mut self, flags: DceFlags) -> Result<()> {
        write_u8(&mut self.buf, OFF_FLAGS, flags.to_raw())?;
        Ok(())
    }

    /// Patches the fragment-length field to the container's current total
    /// length (testable property 2: "DCE fragment length law").
    pub fn finalize_frag_length(&mut self) -> Result<()> {
        let len = self.buf.len() as u16;
        write_u16_le(&mut self.buf, OFF_FRAG_LEN, len)?;
        Ok(())
    }

    // -- read cursor --

    pub fn get_byte(&mut self, align: bool) -> Result<u8> {
        if align {
            self.read_pos = word_align(self.read_pos);
        }
        let v = read_u8(&self.buf, self.read_pos)?;
        self.read_pos += 1;
        Ok(v)
    }

    pub fn get_short(&mut self, align: bool) -> Result<u16> {
        if align {
            self.read_pos = word_align(self.read_pos);
        }
        let v = read_u16_le(&self.buf, self.read_pos)?;
        self.read_pos += 2;
        Ok(v)
    }

    pub fn get_int(&mut self, align: bool) -> Result<u32> {
        if align {
            self.read_pos = longword_align(self.read_pos);
        }
        let v = read_u32_le(&self.buf, self.read_pos)?;
        self.read_pos += 4;
        Ok(v)
    }

    pub fn get_long(&mut self, align: bool) -> Result<u64> {
        if align {
            self.read_pos = octaword_align(self.read_pos);
        }
        let v = read_u64_le(&self.buf, self.read_pos)?;
        self.read_pos += 8;
        Ok(v)
    }

    /// Reads a 16-byte GUID, optionally preceded by a 4-byte
    /// referent-present marker (the embedded-pointer convention this core's
    /// BIND parsing uses for interface/transfer-syntax UUIDs).
    pub fn get_uuid(&mut self, with_referent: bool) -> Result<Guid> {
        if with_referent {
            self.read_pos = longword_align(self.read_pos);
            let referent = read_u32_le(&self.buf, self.read_pos)?;
            self.read_pos += 4;
            if referent == 0 {
                return Err(SmbRpcError::MalformedPdu(
                    "expected non-null referent before embedded UUID".into(),
                ));
            }
        }
        self.read_pos = longword_align(self.read_pos);
        let bytes: [u8; 16] = read_bytes(&self.buf, self.read_pos, 16)?.try_into().unwrap();
        self.read_pos += 16;
        Guid::from_bytes(&bytes)
            .map_err(|e| SmbRpcError::MalformedPdu(format!("malformed embedded UUID: {e}")))
    }

    /// Copies up to `len` bytes from the read cursor into `dst[offset..]`,
    /// advancing the cursor by the number of bytes actually copied.
    /// Signals `BufferOverflow` if `dst` is too short to hold `len` bytes
    /// starting at `offset`.
    pub fn copy_data(&mut self, dst: &mut [u8], offset: usize, len: usize) -> Result<usize> {
        if offset + len > dst.len() {
            return Err(smb_dtyp::WireError::BufferOverflow(format!(
                "destination of {} bytes cannot hold {len} bytes at offset {offset}",
                dst.len()
            ))
            .into());
        }
        let n = len.min(self.available());
        dst[offset..offset + n].copy_from_slice(&self.buf[self.read_pos..self.read_pos + n]);
        self.read_pos += n;
        Ok(n)
    }

    // -- write cursor (the container always grows at its tail) --

    pub fn put_byte(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub fn put_short(&mut self, align: bool, v: u16) {
        if align {
            self.pad_to(word_align(self.buf.len()));
        }
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_int(&mut self, align: bool, v: u32) {
        if align {
            self.pad_to(longword_align(self.buf.len()));
        }
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    pub fn put_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Writes a GUID, optionally preceded by the 4-byte referent marker.
    pub fn put_uuid(&mut self, guid: Guid, with_referent: bool) {
        self.pad_to(longword_align(self.buf.len()));
        if with_referent {
            self.buf.extend_from_slice(&REFERENT_PRESENT.to_le_bytes());
        }
        self.buf.extend_from_slice(&guid.to_bytes());
    }

    fn pad_to(&mut self, len: usize) {
        while self.buf.len() < len {
            self.buf.push(0);
        }
    }
}

impl Default for DceBuffer {
    fn default() -> Self {
        Self::new()
    }
}
