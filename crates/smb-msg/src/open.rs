//! NTCreateAndX and OpenAndX fixed parameter blocks (MS-CIFS 2.2.4.64, 2.2.4.9).
//!
//! These are the one place in the IPC$ path where a fixed-shape request or
//! response parameter block is dense enough, and irregular enough in its
//! field widths, to be worth a `#[binrw]` struct rather than word-at-a-time
//! `Smb1Frame` accessors.

use std::io::Cursor;

use binrw::prelude::*;

use crate::error::{Result, SmbMsgError};
use crate::frame::Smb1Frame;
use crate::header::NBT_PREFIX_LEN;

/// `SMB_COM_NT_CREATE_ANDX` request parameter block, 24 words (48 bytes).
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct NtCreateAndXParams {
    pub andx_command: u8,
    pub andx_reserved: u8,
    pub andx_offset: u16,
    pub reserved: u8,
    pub name_length: u16,
    pub flags: u32,
    pub root_directory_fid: u32,
    pub desired_access: u32,
    pub allocation_size: u64,
    pub ext_file_attributes: u32,
    pub share_access: u32,
    pub create_disposition: u32,
    pub create_options: u32,
    pub impersonation_level: u32,
    pub security_flags: u8,
}

/// Word count of [`NtCreateAndXParams`] on the wire.
pub const NT_CREATE_ANDX_WORD_COUNT: u8 = 24;
const NT_CREATE_ANDX_PARAM_LEN: usize = NT_CREATE_ANDX_WORD_COUNT as usize * 2;

impl NtCreateAndXParams {
    pub fn parse(frame: &Smb1Frame) -> Result<Self> {
        if !frame.check_valid(NT_CREATE_ANDX_WORD_COUNT, 0) {
            return Err(SmbMsgError::MalformedFrame(
                "NTCreateAndX frame shorter than its fixed parameter block".into(),
            ));
        }
        let bytes = frame.parameter_bytes(NT_CREATE_ANDX_WORD_COUNT)?;
        let mut cursor = Cursor::new(bytes);
        Self::read(&mut cursor)
            .map_err(|e| SmbMsgError::MalformedFrame(format!("NTCreateAndX params: {e}")))
    }

    /// Decodes the filename that follows the fixed parameter block. Unicode
    /// names are word-aligned at the start of the byte region; ASCII names
    /// are not.
    pub fn read_name(&self, frame: &Smb1Frame) -> Result<String> {
        let region_start = frame.byte_offset()?;
        let unicode = frame.flags2()?.unicode();
        let name_start = if unicode {
            smb_dtyp::codec::word_align(region_start)
        } else {
            region_start
        };
        if unicode {
            smb_dtyp::strings::read_unicode_fixed(frame.raw(), name_start, self.name_length as usize)
                .map_err(Into::into)
        } else {
            let bytes = smb_dtyp::codec::read_bytes(frame.raw(), name_start, self.name_length as usize)?;
            Ok(bytes.iter().map(|&b| b as char).collect())
        }
    }
}

/// `SMB_COM_NT_CREATE_ANDX` response, base (non-extended) shape: 34 words.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct NtCreateAndXResponseFixed {
    andx_command: u8,
    andx_reserved: u8,
    andx_offset: u16,
    oplock_level: u8,
    fid: u16,
    create_action: u32,
    creation_time: u64,
    last_access_time: u64,
    last_write_time: u64,
    last_change_time: u64,
    ext_file_attributes: u32,
    allocation_size: u64,
    end_of_file: u64,
    resource_type: u16,
    nm_pipe_status: u16,
    directory: u8,
}

/// Named-pipe-flavored fields for [`NtCreateAndXResponseFixed`]: attributes
/// `0x80`, alloc/EOF zero, resource type "named pipe, message mode" (`2`),
/// instancing `0xFF`, IPC pipe-state `0x05`, not a directory.
fn pipe_response_fixed(andx_offset: u16, fid: u16) -> NtCreateAndXResponseFixed {
    NtCreateAndXResponseFixed {
        andx_command: 0xFF,
        andx_reserved: 0,
        andx_offset,
        oplock_level: 0,
        fid,
        create_action: 1, // FILE_OPENED
        creation_time: 0,
        last_access_time: 0,
        last_write_time: 0,
        last_change_time: 0,
        ext_file_attributes: 0x80,
        allocation_size: 0,
        end_of_file: 0,
        resource_type: 2,
        nm_pipe_status: 0x05 | 0xFF00,
        directory: 0,
    }
}

/// The extended-response tail appended after [`NtCreateAndXResponseFixed`]
/// when the client negotiated extended security / NT_CREATE flags: a
/// 22-byte zero block, permissions `0x1F01FF`, then `0x0012019B`, then a
/// trailing zero.
#[derive(BinRead, BinWrite)]
#[brw(little)]
struct NtCreateAndXExtendedTail {
    zero_block: [u8; 22],
    maximal_access_rights: u32,
    guest_maximal_access_rights: u32,
    reserved_zero: u32,
}

impl Default for NtCreateAndXExtendedTail {
    fn default() -> Self {
        Self {
            zero_block: [0; 22],
            maximal_access_rights: 0x1F_01FF,
            guest_maximal_access_rights: 0x0012_019B,
            reserved_zero: 0,
        }
    }
}

/// Packs a pipe-open `NTCreateAndX` response (base or extended shape) into
/// `frame`, and sets the AndX-offset field to point just past the trailing
/// byte-count. The response carries no byte-region payload.
pub fn write_nt_create_andx_response(frame: &mut Smb1Frame, fid: u16, extended: bool) -> Result<()> {
    // The andx_offset field's correct value depends on how many parameter
    // words this response ends up being, which in turn depends on `extended`
    // -- written with a placeholder first, then patched once the final byte
    // length (and therefore word count) is known. A zero-length byte region
    // means the next-command offset lands exactly past the byte-count field.
    let mut cursor = Cursor::new(Vec::new());
    pipe_response_fixed(0, fid)
        .write(&mut cursor)
        .map_err(|e| SmbMsgError::MalformedFrame(format!("NTCreateAndX response: {e}")))?;
    if extended {
        NtCreateAndXExtendedTail::default()
            .write(&mut cursor)
            .map_err(|e| SmbMsgError::MalformedFrame(format!("NTCreateAndX response: {e}")))?;
    }
    let mut bytes = cursor.into_inner();

    let andx_offset =
        (crate::header::OFF_PARAMS + bytes.len() + 2 - NBT_PREFIX_LEN) as u16;
    bytes[2..4].copy_from_slice(&andx_offset.to_le_bytes());

    let n_words = (bytes.len() / 2) as u8;
    frame.write_parameter_bytes(n_words, &bytes)?;
    frame.set_byte_count(0)?;
    frame.set_response()
}

/// `SMB_COM_OPEN_ANDX` response: 15 parameter words, all zero except
/// `andx_offset` (index 1) and `fid` (index 2).
pub fn write_open_andx_response(frame: &mut Smb1Frame, fid: u16) -> Result<()> {
    frame.set_parameter_count(15)?;
    let byte_offset = frame.byte_offset()?;
    let andx_offset = (byte_offset - NBT_PREFIX_LEN) as u16;
    frame.set_parameter(1, andx_offset)?;
    frame.set_parameter(2, fid)?;
    frame.set_byte_count(0)?;
    frame.set_response()
}

/// Decodes the filename carried in an `OpenAndX`/`OpenFile` request's byte
/// region (ASCII or Unicode per `flags2`), starting right at the byte
/// region's first byte (no alignment padding for this older request shape).
pub fn read_open_andx_name(frame: &Smb1Frame) -> Result<String> {
    let start = frame.byte_offset()?;
    if frame.flags2()?.unicode() {
        let (name, _) = smb_dtyp::strings::read_unicode_z(frame.raw(), start)?;
        Ok(name)
    } else {
        let (name, _) = smb_dtyp::strings::read_ascii_z(frame.raw(), start)?;
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{Command, OFF_COMMAND, OFF_PARAM_COUNT};

    fn make_nt_create_andx_frame(name: &str, unicode: bool) -> Vec<u8> {
        let header_len = NBT_PREFIX_LEN + 32;
        let param_area = header_len + 1 + NT_CREATE_ANDX_PARAM_LEN + 2;
        let name_bytes_len = if unicode {
            name.encode_utf16().count() * 2 + 2
        } else {
            name.len() + 1
        };
        let pad = if unicode && param_area % 2 != 0 { 1 } else { 0 };
        let total = param_area + pad + name_bytes_len;
        let mut buf = vec![0u8; total];
        buf[OFF_COMMAND] = Command::NtCreateAndX as u8;
        buf[OFF_PARAM_COUNT] = NT_CREATE_ANDX_WORD_COUNT;
        if unicode {
            buf[crate::header::OFF_FLAGS2] = 0x00;
            buf[crate::header::OFF_FLAGS2 + 1] = 0x80; // unicode bit (bit 15)
        }
        let params = NtCreateAndXParams {
            andx_command: 0xFF,
            andx_reserved: 0,
            andx_offset: 0,
            reserved: 0,
            name_length: if unicode {
                (name.encode_utf16().count() * 2) as u16
            } else {
                name.len() as u16
            },
            flags: 0,
            root_directory_fid: 0,
            desired_access: 0x0012_0089,
            allocation_size: 0,
            ext_file_attributes: 0,
            share_access: 0x03,
            create_disposition: 1,
            create_options: 0,
            impersonation_level: 2,
            security_flags: 0,
        };
        let mut pbytes = Vec::new();
        let mut cursor = Cursor::new(&mut pbytes);
        params.write(&mut cursor).unwrap();
        buf[header_len + 1..header_len + 1 + NT_CREATE_ANDX_PARAM_LEN].copy_from_slice(&pbytes);

        let bc_off = header_len + 1 + NT_CREATE_ANDX_PARAM_LEN;
        let byte_count = (pad + name_bytes_len) as u16;
        buf[bc_off..bc_off + 2].copy_from_slice(&byte_count.to_le_bytes());

        let name_start = bc_off + 2 + pad;
        if unicode {
            smb_dtyp::strings::write_unicode_z(&mut buf, name_start, name).unwrap();
        } else {
            smb_dtyp::strings::write_ascii_z(&mut buf, name_start, name).unwrap();
        }
        buf
    }

    #[test]
    fn parses_ascii_pipe_name() {
        let mut buf = make_nt_create_andx_frame("\\PIPE\\srvsvc", false);
        let frame = Smb1Frame::new(&mut buf);
        let params = NtCreateAndXParams::parse(&frame).unwrap();
        assert_eq!(params.desired_access, 0x0012_0089);
        assert_eq!(params.read_name(&frame).unwrap(), "\\PIPE\\srvsvc");
    }

    #[test]
    fn parses_unicode_pipe_name() {
        let mut buf = make_nt_create_andx_frame("\\PIPE\\wkssvc", true);
        let frame = Smb1Frame::new(&mut buf);
        let params = NtCreateAndXParams::parse(&frame).unwrap();
        assert_eq!(params.read_name(&frame).unwrap(), "\\PIPE\\wkssvc");
    }

    #[test]
    fn base_response_has_even_word_count_and_andx_offset_past_byte_count() {
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 256 + 2];
        buf[OFF_COMMAND] = Command::NtCreateAndX as u8;
        let mut frame = Smb1Frame::new(&mut buf);
        write_nt_create_andx_response(&mut frame, 7, false).unwrap();
        assert_eq!(frame.parameter_count().unwrap() % 2, 0);
        let andx_offset = frame.parameter_word(1).unwrap();
        assert_eq!(
            andx_offset as usize,
            frame.byte_offset().unwrap() - NBT_PREFIX_LEN
        );
        assert_eq!(frame.byte_count().unwrap(), 0);
    }

    #[test]
    fn extended_response_is_longer_than_base() {
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 256 + 2];
        buf[OFF_COMMAND] = Command::NtCreateAndX as u8;
        let mut base = Smb1Frame::new(&mut buf.clone());
        write_nt_create_andx_response(&mut base, 1, false).unwrap();
        let base_words = base.parameter_count().unwrap();

        let mut frame = Smb1Frame::new(&mut buf);
        write_nt_create_andx_response(&mut frame, 1, true).unwrap();
        assert!(frame.parameter_count().unwrap() > base_words);
    }

    #[test]
    fn open_andx_response_sets_andx_offset_and_fid() {
        let mut buf = vec![0u8; NBT_PREFIX_LEN + 32 + 1 + 2 * 15 + 2];
        buf[OFF_COMMAND] = Command::OpenAndX as u8;
        let mut frame = Smb1Frame::new(&mut buf);
        write_open_andx_response(&mut frame, 42).unwrap();
        assert_eq!(frame.parameter_count().unwrap(), 15);
        assert_eq!(frame.parameter_word(2).unwrap(), 42);
        assert_eq!(frame.parameter_word(3).unwrap(), 0);
    }
}
