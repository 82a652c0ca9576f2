//! Parsed view of an SMB1 TRANSACTION/TRANSACTION2, single- or multi-fragment.
//!
//! Reference: MS-CIFS 2.2.4.33 (TRANSACTION), 2.2.4.46 (TRANSACTION2),
//! 2.2.4.34 (TRANSACTION_SECONDARY).

use smb_dtyp::strings::{read_ascii_z, read_unicode_z};

use crate::error::{Result, SmbMsgError};
use crate::frame::Smb1Frame;
use crate::header::{Command, NBT_PREFIX_LEN};

/// Named-pipe transaction sub-function codes carried in `setup[0]` of an
/// `SMB_COM_TRANSACTION`, and the `TRANSACTION2` sub-command of the same slot.
pub mod subfn {
    pub const SET_NMPIPE_STATE: u16 = 0x0001;
    pub const TRANSACT_NMPIPE: u16 = 0x0026;
    pub const WAIT_NMPIPE: u16 = 0x0053;
    pub const TRANS2_QUERY_FILE_INFORMATION: u16 = 0x0007;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionKind {
    Transaction,
    Transaction2,
}

/// A fully-assembled transaction, either parsed directly from a single
/// request frame or produced by [`TransactionAccumulator::finish`].
#[derive(Debug, Clone)]
pub struct TransactionBuffer {
    tree_id: u16,
    kind: TransactionKind,
    function: u16,
    name: Option<String>,
    setup: Vec<u8>,
    parameters: Vec<u8>,
    data: Vec<u8>,
    max_setup_count: u8,
    max_param_count: u32,
    max_data_count: u32,
    unicode: bool,
}

struct PrimaryHeader {
    total_param_count: u16,
    total_data_count: u16,
    max_param_count: u16,
    max_data_count: u16,
    max_setup_count: u8,
    param_count: u16,
    param_offset: u16,
    data_count: u16,
    data_offset: u16,
    setup_count: u8,
    setup_start_word: usize,
}

fn parse_primary_header(frame: &Smb1Frame) -> Result<PrimaryHeader> {
    if !frame.check_valid(14, 0) {
        return Err(SmbMsgError::MalformedFrame(
            "transaction frame shorter than fixed parameter block".into(),
        ));
    }
    Ok(PrimaryHeader {
        total_param_count: frame.parameter_word(0)?,
        total_data_count: frame.parameter_word(1)?,
        max_param_count: frame.parameter_word(2)?,
        max_data_count: frame.parameter_word(3)?,
        max_setup_count: (frame.parameter_word(4)? & 0xff) as u8,
        param_count: frame.parameter_word(9)?,
        param_offset: frame.parameter_word(10)?,
        data_count: frame.parameter_word(11)?,
        data_offset: frame.parameter_word(12)?,
        setup_count: (frame.parameter_word(13)? & 0xff) as u8,
        setup_start_word: 14,
    })
}

fn read_setup_words(frame: &Smb1Frame, hdr: &PrimaryHeader) -> Result<Vec<u8>> {
    let mut setup = Vec::with_capacity(hdr.setup_count as usize * 2);
    for i in 0..hdr.setup_count as usize {
        let w = frame.parameter_word(hdr.setup_start_word + i)?;
        setup.extend_from_slice(&w.to_le_bytes());
    }
    Ok(setup)
}

fn function_of(setup: &[u8]) -> u16 {
    if setup.len() >= 2 {
        u16::from_le_bytes([setup[0], setup[1]])
    } else {
        0
    }
}

/// Offsets in the SMB1 TRANSACTION family are relative to the start of the
/// SMB header, i.e. past the 4-byte NBT transport prefix.
fn abs_offset(word_offset: u16) -> usize {
    NBT_PREFIX_LEN + word_offset as usize
}

impl TransactionBuffer {
    /// Parses a single-fragment transaction directly out of its SMB1 frame.
    pub fn from_frame(frame: &Smb1Frame) -> Result<Self> {
        let kind = match frame.command()? {
            Command::Transaction => TransactionKind::Transaction,
            Command::Transaction2 => TransactionKind::Transaction2,
            _ => {
                return Err(SmbMsgError::MalformedFrame(
                    "not a TRANSACTION/TRANSACTION2 frame".into(),
                ));
            }
        };
        let hdr = parse_primary_header(frame)?;
        let setup = read_setup_words(frame, &hdr)?;
        let unicode = frame.flags2()?.unicode();

        // Name field (TRANSACTION only) precedes the word-aligned Parameters/Data.
        let byte_start = frame.byte_offset()?;
        let name = if kind == TransactionKind::Transaction {
            let (n, _) = if unicode {
                read_unicode_z(frame_buf(frame), byte_start)?
            } else {
                read_ascii_z(frame_buf(frame), byte_start)?
            };
            Some(n)
        } else {
            None
        };

        let param_off = abs_offset(hdr.param_offset);
        let data_off = abs_offset(hdr.data_offset);
        let parameters =
            smb_dtyp::codec::read_bytes(frame_buf(frame), param_off, hdr.param_count as usize)?
                .to_vec();
        let data = smb_dtyp::codec::read_bytes(frame_buf(frame), data_off, hdr.data_count as usize)?
            .to_vec();

        if hdr.param_count != hdr.total_param_count || hdr.data_count != hdr.total_data_count {
            return Err(SmbMsgError::MalformedFragment);
        }

        Ok(Self {
            tree_id: frame.tree_id()?,
            kind,
            function: function_of(&setup),
            name,
            setup,
            parameters,
            data,
            max_setup_count: hdr.max_setup_count,
            max_param_count: hdr.max_param_count as u32,
            max_data_count: hdr.max_data_count as u32,
            unicode,
        })
    }

    pub fn setup_buf(&self) -> &[u8] {
        &self.setup
    }

    pub fn parameter_buf(&self) -> &[u8] {
        &self.parameters
    }

    pub fn data_buf(&self) -> &[u8] {
        &self.data
    }

    pub fn tree_id(&self) -> u16 {
        self.tree_id
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn function(&self) -> u16 {
        self.function
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn return_data_limit(&self) -> usize {
        self.max_data_count as usize
    }

    pub fn return_param_limit(&self) -> usize {
        self.max_param_count as usize
    }

    pub fn max_setup_count(&self) -> u8 {
        self.max_setup_count
    }

    pub fn is_unicode(&self) -> bool {
        self.unicode
    }
}

/// Helper to reach the raw bytes behind an `Smb1Frame` for the string/slice
/// reads this module needs but `Smb1Frame` doesn't expose generically
/// (its public API only exposes the byte *region*, not arbitrary header-relative offsets).
fn frame_buf<'a>(frame: &'a Smb1Frame<'_>) -> &'a [u8] {
    frame.raw()
}

/// Accumulates a multi-fragment TRANSACTION across one primary frame and
/// zero or more `TRANSACTION_SECONDARY` frames.
///
/// Contract: displacements must be monotone and must
/// collectively cover `[0, total_param_len) × [0, total_data_len)` without
/// gaps or overlap; a duplicate or out-of-range displacement is
/// [`SmbMsgError::MalformedFragment`].
pub struct TransactionAccumulator {
    kind: TransactionKind,
    tree_id: u16,
    function: u16,
    name: Option<String>,
    max_setup_count: u8,
    max_param_count: u32,
    max_data_count: u32,
    unicode: bool,
    setup: Vec<u8>,
    parameters: Vec<u8>,
    data: Vec<u8>,
    param_filled: Vec<bool>,
    data_filled: Vec<bool>,
}

impl TransactionAccumulator {
    pub fn new_from_primary(frame: &Smb1Frame) -> Result<Self> {
        let kind = match frame.command()? {
            Command::Transaction => TransactionKind::Transaction,
            Command::Transaction2 => TransactionKind::Transaction2,
            _ => {
                return Err(SmbMsgError::MalformedFrame(
                    "not a TRANSACTION/TRANSACTION2 frame".into(),
                ));
            }
        };
        let hdr = parse_primary_header(frame)?;
        let setup = read_setup_words(frame, &hdr)?;
        let unicode = frame.flags2()?.unicode();

        let byte_start = frame.byte_offset()?;
        let name = if kind == TransactionKind::Transaction {
            let (n, _) = if unicode {
                read_unicode_z(frame_buf(frame), byte_start)?
            } else {
                read_ascii_z(frame_buf(frame), byte_start)?
            };
            Some(n)
        } else {
            None
        };

        let mut acc = Self {
            kind,
            tree_id: frame.tree_id()?,
            function: function_of(&setup),
            name,
            max_setup_count: hdr.max_setup_count,
            max_param_count: hdr.max_param_count as u32,
            max_data_count: hdr.max_data_count as u32,
            unicode,
            setup,
            parameters: vec![0u8; hdr.total_param_count as usize],
            data: vec![0u8; hdr.total_data_count as usize],
            param_filled: vec![false; hdr.total_param_count as usize],
            data_filled: vec![false; hdr.total_data_count as usize],
        };
        acc.apply_fragment(
            abs_offset(hdr.param_offset),
            hdr.param_count as usize,
            0,
            abs_offset(hdr.data_offset),
            hdr.data_count as usize,
            0,
            frame,
        )?;
        Ok(acc)
    }

    pub fn add_secondary(&mut self, frame: &Smb1Frame) -> Result<()> {
        if !frame.check_valid(8, 0) {
            return Err(SmbMsgError::MalformedFrame(
                "transaction secondary frame shorter than fixed parameter block".into(),
            ));
        }
        let param_count = frame.parameter_word(2)?;
        let param_offset = frame.parameter_word(3)?;
        let param_disp = frame.parameter_word(4)?;
        let data_count = frame.parameter_word(5)?;
        let data_offset = frame.parameter_word(6)?;
        let data_disp = frame.parameter_word(7)?;
        self.apply_fragment(
            abs_offset(param_offset),
            param_count as usize,
            param_disp as usize,
            abs_offset(data_offset),
            data_count as usize,
            data_disp as usize,
            frame,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_fragment(
        &mut self,
        param_off: usize,
        param_len: usize,
        param_disp: usize,
        data_off: usize,
        data_len: usize,
        data_disp: usize,
        frame: &Smb1Frame,
    ) -> Result<()> {
        copy_fragment(
            &mut self.parameters,
            &mut self.param_filled,
            frame_buf(frame),
            param_off,
            param_len,
            param_disp,
        )?;
        copy_fragment(
            &mut self.data,
            &mut self.data_filled,
            frame_buf(frame),
            data_off,
            data_len,
            data_disp,
        )
    }

    pub fn is_complete(&self) -> bool {
        self.param_filled.iter().all(|&b| b) && self.data_filled.iter().all(|&b| b)
    }

    pub fn finish(self) -> Result<TransactionBuffer> {
        if !self.is_complete() {
            return Err(SmbMsgError::MalformedFragment);
        }
        Ok(TransactionBuffer {
            tree_id: self.tree_id,
            kind: self.kind,
            function: self.function,
            name: self.name,
            setup: self.setup,
            parameters: self.parameters,
            data: self.data,
            max_setup_count: self.max_setup_count,
            max_param_count: self.max_param_count,
            max_data_count: self.max_data_count,
            unicode: self.unicode,
        })
    }
}

fn copy_fragment(
    dst: &mut [u8],
    filled: &mut [bool],
    src_buf: &[u8],
    src_off: usize,
    len: usize,
    disp: usize,
) -> Result<()> {
    if disp.checked_add(len).is_none_or(|end| end > dst.len()) {
        return Err(SmbMsgError::MalformedFragment);
    }
    if filled[disp..disp + len].iter().any(|&b| b) {
        return Err(SmbMsgError::MalformedFragment);
    }
    let src = smb_dtyp::codec::read_bytes(src_buf, src_off, len)?;
    dst[disp..disp + len].copy_from_slice(src);
    filled[disp..disp + len].fill(true);
    Ok(())
}
