//! A typed, in-place-mutable view over an SMB1 request/response buffer.
//!
//! Unlike the fixed-shape `#[binrw]` structures used elsewhere in this
//! workspace, [`Smb1Frame`] does not parse the buffer into an owned value:
//! it is a thin accessor over the caller's buffer, because responses are
//! built by mutating the very buffer the request arrived in. Fixed-shape sub-regions (e.g. the NTCreateAndX parameter block)
//! are still read with plain wire-codec helpers from `smb-dtyp`.

use smb_dtyp::codec::{
    read_u16_le, read_u32_le, read_u8, words_to_long, write_u16_le, write_u32_le, write_u8,
};

use crate::error::{Result, SmbMsgError};
use crate::header::{
    Command, FLAGS_RESPONSE, Flags2, LegacyClass, NBT_PREFIX_LEN, OFF_COMMAND, OFF_FLAGS,
    OFF_FLAGS2, OFF_MULTIPLEX_ID, OFF_PARAMS, OFF_PARAM_COUNT, OFF_PROCESS_ID, OFF_STATUS,
    OFF_TREE_ID, OFF_USER_ID, Status,
};

/// A mutable view over one SMB1 frame: transport prefix + 32-byte header +
/// parameter words + byte region.
pub struct Smb1Frame<'a> {
    buf: &'a mut [u8],
}

impl<'a> Smb1Frame<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf }
    }

    pub fn command(&self) -> Result<Command> {
        let raw = read_u8(self.buf, OFF_COMMAND)?;
        Command::from_u8(raw)
            .ok_or_else(|| SmbMsgError::MalformedFrame(format!("unknown command {raw:#04x}")))
    }

    pub fn flags2(&self) -> Result<Flags2> {
        Ok(Flags2::from_raw(read_u16_le(self.buf, OFF_FLAGS2)?))
    }

    fn set_flags2(&mut self, f: Flags2) -> Result<()> {
        write_u16_le(self.buf, OFF_FLAGS2, f.to_raw())?;
        Ok(())
    }

    pub fn tree_id(&self) -> Result<u16> {
        read_u16_le(self.buf, OFF_TREE_ID)
    }

    pub fn process_id(&self) -> Result<u16> {
        read_u16_le(self.buf, OFF_PROCESS_ID)
    }

    pub fn user_id(&self) -> Result<u16> {
        read_u16_le(self.buf, OFF_USER_ID)
    }

    pub fn multiplex_id(&self) -> Result<u16> {
        read_u16_le(self.buf, OFF_MULTIPLEX_ID)
    }

    pub fn parameter_count(&self) -> Result<u8> {
        read_u8(self.buf, OFF_PARAM_COUNT)
    }

    pub fn parameter_word(&self, i: usize) -> Result<u16> {
        let n = self.parameter_count()? as usize;
        if i >= n {
            return Err(SmbMsgError::MalformedFrame(format!(
                "parameter word {i} out of range (count={n})"
            )));
        }
        read_u16_le(self.buf, OFF_PARAMS + i * 2)
    }

    /// Two consecutive parameter words, concatenated little-endian into a 32-bit value.
    pub fn parameter_long(&self, i: usize) -> Result<u32> {
        let lo = self.parameter_word(i)?;
        let hi = self.parameter_word(i + 1)?;
        Ok(words_to_long(lo, hi))
    }

    fn byte_count_offset(&self) -> Result<usize> {
        let n = self.parameter_count()? as usize;
        Ok(OFF_PARAMS + n * 2)
    }

    pub fn byte_count(&self) -> Result<u16> {
        let off = self.byte_count_offset()?;
        read_u16_le(self.buf, off)
    }

    /// Absolute offset of the byte-region payload inside the buffer.
    pub fn byte_offset(&self) -> Result<usize> {
        Ok(self.byte_count_offset()? + 2)
    }

    pub fn bytes(&self) -> Result<&[u8]> {
        let off = self.byte_offset()?;
        let len = self.byte_count()? as usize;
        smb_dtyp::codec::read_bytes(self.buf, off, len).map_err(Into::into)
    }

    /// The whole frame buffer, NBT prefix included. Used by transaction
    /// parsing, which needs to follow header-relative offsets that fall
    /// outside the byte-region accessors above.
    pub fn raw(&self) -> &[u8] {
        self.buf
    }

    pub fn set_parameter(&mut self, i: usize, v: u16) -> Result<()> {
        let n = self.parameter_count()? as usize;
        if i >= n {
            return Err(SmbMsgError::MalformedFrame(format!(
                "set parameter word {i} out of range (count={n})"
            )));
        }
        write_u16_le(self.buf, OFF_PARAMS + i * 2, v)?;
        Ok(())
    }

    pub fn set_parameter_long(&mut self, i: usize, v: u32) -> Result<()> {
        let (lo, hi) = smb_dtyp::codec::long_to_words(v);
        self.set_parameter(i, lo)?;
        self.set_parameter(i + 1, hi)
    }

    /// Sets the parameter count and zeroes every word, establishing a fresh
    /// response shape. The caller then fills individual words with
    /// [`Self::set_parameter`].
    pub fn set_parameter_count(&mut self, n: u8) -> Result<()> {
        write_u8(self.buf, OFF_PARAM_COUNT, n)?;
        for i in 0..n as usize {
            write_u16_le(self.buf, OFF_PARAMS + i * 2, 0)?;
        }
        Ok(())
    }

    pub fn set_byte_count(&mut self, n: u16) -> Result<()> {
        let off = self.byte_count_offset()?;
        write_u16_le(self.buf, off, n)?;
        Ok(())
    }

    /// Sets the parameter count to `n_words` and copies `bytes` (exactly
    /// `n_words * 2` bytes) verbatim into the parameter-word region. Used
    /// for fixed-shape parameter blocks whose fields don't all fall on
    /// 16-bit-word boundaries (e.g. NTCreateAndX), where word-by-word
    /// `set_parameter` can't express the layout.
    pub fn write_parameter_bytes(&mut self, n_words: u8, bytes: &[u8]) -> Result<()> {
        if bytes.len() != n_words as usize * 2 {
            return Err(SmbMsgError::MalformedFrame(format!(
                "parameter byte block of {} bytes does not match {n_words} words",
                bytes.len()
            )));
        }
        write_u8(self.buf, OFF_PARAM_COUNT, n_words)?;
        smb_dtyp::codec::write_bytes(self.buf, OFF_PARAMS, bytes)?;
        Ok(())
    }

    /// Reads `n_words * 2` raw bytes out of the parameter-word region, for
    /// fixed-shape blocks whose fields don't fall on word boundaries.
    pub fn parameter_bytes(&self, n_words: u8) -> Result<&[u8]> {
        smb_dtyp::codec::read_bytes(self.buf, OFF_PARAMS, n_words as usize * 2).map_err(Into::into)
    }

    pub fn write_bytes_at(&mut self, rel_offset: usize, data: &[u8]) -> Result<()> {
        let base = self.byte_offset()?;
        smb_dtyp::codec::write_bytes(self.buf, base + rel_offset, data).map_err(Into::into)
    }

    /// Sets the `response` bit in `flags` (MS-CIFS 2.2.3.1).
    pub fn set_response(&mut self) -> Result<()> {
        let cur = read_u8(self.buf, OFF_FLAGS)?;
        write_u8(self.buf, OFF_FLAGS, cur | FLAGS_RESPONSE)?;
        Ok(())
    }

    /// Writes a 32-bit NT status and asserts `flags2.nt_status` (the
    /// `SMB_FLAGS2_NT_STATUS` / "long error code" bit).
    pub fn set_long_error_code(&mut self, status: u32) -> Result<()> {
        write_u32_le(self.buf, OFF_STATUS, status)?;
        let mut f2 = self.flags2()?;
        f2.set_nt_status(true);
        self.set_flags2(f2)
    }

    /// Total bytes the frame occupies: header + parameters + byte region.
    pub fn total_len(&self) -> Result<usize> {
        Ok(self.byte_offset()? + self.byte_count()? as usize)
    }

    /// Returns `false` if the frame is too short for the expected shape of
    /// its command: fewer than `min_params` parameter words, or fewer than
    /// `min_bytes` in the byte region.
    pub fn check_valid(&self, min_params: u8, min_bytes: u16) -> bool {
        let Ok(params) = self.parameter_count() else {
            return false;
        };
        if params < min_params {
            return false;
        }
        let Ok(bytes) = self.byte_count() else {
            return false;
        };
        bytes >= min_bytes && self.bytes().is_ok()
    }

    /// Builds a zero-parameter, zero-byte error response: status fields
    /// populated, `response` flag set, everything else left as the
    /// request left it (command, ids).
    pub fn send_error(&mut self, status: Status, legacy: LegacyClass) -> Result<()> {
        self.set_parameter_count(0)?;
        self.set_byte_count(0)?;
        self.set_response()?;
        self.set_long_error_code(status as u32)?;
        let _ = legacy; // carried for parity with the (class, code) pair; NT status is authoritative once flags2.nt_status is set.
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_open_andx_request() -> Vec<u8> {
        // NBT prefix(4) + header(32) + paramcount(1)+params(0)+bytecount(2)=0
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 2];
        buf[OFF_COMMAND] = Command::OpenAndX as u8;
        buf[OFF_PARAM_COUNT] = 0;
        buf
    }

    #[test]
    fn round_trip_framing() {
        let mut buf = make_open_andx_request();
        let original = buf.clone();
        let frame = Smb1Frame::new(&mut buf);
        assert_eq!(frame.command().unwrap(), Command::OpenAndX);
        assert_eq!(frame.parameter_count().unwrap(), 0);
        assert_eq!(frame.byte_count().unwrap(), 0);
        drop(frame);
        assert_eq!(buf, original);
    }

    #[test]
    fn set_parameter_and_byte_count() {
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 2 * 3 + 2 + 4];
        buf[OFF_COMMAND] = Command::Close as u8;
        let mut frame = Smb1Frame::new(&mut buf);
        frame.set_parameter_count(3).unwrap();
        frame.set_parameter(1, 0xBEEF).unwrap();
        frame.set_byte_count(4).unwrap();
        frame.write_bytes_at(0, &[1, 2, 3, 4]).unwrap();
        assert_eq!(frame.parameter_word(1).unwrap(), 0xBEEF);
        assert_eq!(frame.bytes().unwrap(), &[1, 2, 3, 4]);
        assert_eq!(frame.total_len().unwrap(), frame.byte_offset().unwrap() + 4);
    }

    #[test]
    fn send_error_zeroes_params_and_sets_status() {
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 2 * 5 + 2];
        buf[OFF_COMMAND] = Command::Open as u8;
        buf[OFF_PARAM_COUNT] = 5;
        let mut frame = Smb1Frame::new(&mut buf);
        frame
            .send_error(Status::ObjectNameNotFound, LegacyClass::Dos)
            .unwrap();
        assert_eq!(frame.parameter_count().unwrap(), 0);
        assert_eq!(frame.byte_count().unwrap(), 0);
        assert!(frame.flags2().unwrap().nt_status());
        assert_eq!(
            read_u32_le(&buf, OFF_STATUS).unwrap(),
            Status::U32_OBJECT_NAME_NOT_FOUND
        );
        assert_eq!(buf[OFF_FLAGS] & FLAGS_RESPONSE, FLAGS_RESPONSE);
    }

    #[test]
    fn check_valid_rejects_truncated_shape() {
        let mut buf = make_open_andx_request();
        let frame = Smb1Frame::new(&mut buf);
        assert!(!frame.check_valid(1, 0));
        assert!(frame.check_valid(0, 0));
    }
}
