//! Frame codec for the validator metadata pipe.
//!
//! Wire format, per frame:
//! ```text
//! [4 bytes: big-endian u32, high bit always set, low 31 bits = payload length]
//! [N bytes: payload (bincode-serialized LedgerCloseMeta)]
//! ```
//! The high bit is a continuation marker inherited from the validator's
//! record-marking standard; a header without it is a framing violation.

use std::io::{Read, Write};

use crate::error::CodecError;
use crate::meta::LedgerCloseMeta;

/// Frames larger than this are rejected as corrupt rather than allocated.
const MAX_FRAME_LEN: u32 = 256 * 1024 * 1024;

const CONTINUATION_BIT: u32 = 0x8000_0000;

/// Write `meta` as one length-prefixed frame.
pub fn write_framed<W: Write>(writer: &mut W, meta: &LedgerCloseMeta) -> Result<usize, CodecError> {
    let payload = bincode::serialize(meta).map_err(|e| CodecError::Encode(e.to_string()))?;
    if payload.len() as u64 > u64::from(MAX_FRAME_LEN) {
        return Err(CodecError::FrameTooLarge {
            len: payload.len() as u64,
            max: MAX_FRAME_LEN,
        });
    }
    let header = CONTINUATION_BIT | payload.len() as u32;
    writer.write_all(&header.to_be_bytes())?;
    writer.write_all(&payload)?;
    Ok(4 + payload.len())
}

/// Read one frame and decode its payload.
///
/// Returns the decoded record and the number of bytes consumed. A clean EOF
/// before the first header byte surfaces as [`CodecError::Eof`]; EOF anywhere
/// else is a truncated frame.
pub fn read_framed<R: Read>(reader: &mut R) -> Result<(LedgerCloseMeta, usize), CodecError> {
    let mut header = [0u8; 4];
    read_exact_or_eof(reader, &mut header)?;

    let raw = u32::from_be_bytes(header);
    if raw & CONTINUATION_BIT == 0 {
        return Err(CodecError::MissingContinuationBit { header: raw });
    }
    let len = raw & !CONTINUATION_BIT;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            len: u64::from(len),
            max: MAX_FRAME_LEN,
        });
    }

    let mut payload = vec![0u8; len as usize];
    reader
        .read_exact(&mut payload)
        .map_err(|e| truncated(e, len))?;

    let meta: LedgerCloseMeta =
        bincode::deserialize(&payload).map_err(|e| CodecError::Decode(e.to_string()))?;
    Ok((meta, 4 + len as usize))
}

fn read_exact_or_eof<R: Read>(reader: &mut R, buf: &mut [u8; 4]) -> Result<(), CodecError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Err(CodecError::Eof);
            }
            return Err(CodecError::TruncatedFrame {
                expected: 4,
                got: filled,
            });
        }
        filled += n;
    }
    Ok(())
}

fn truncated(err: std::io::Error, expected: u32) -> CodecError {
    if err.kind() == std::io::ErrorKind::UnexpectedEof {
        CodecError::TruncatedFrame {
            expected: expected as usize,
            got: 0,
        }
    } else {
        CodecError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn roundtrip_single_frame() {
        let meta = LedgerCloseMeta::empty(64);
        let mut buf = Vec::new();
        let written = write_framed(&mut buf, &meta).unwrap();
        assert_eq!(written, buf.len());

        let (decoded, consumed) = read_framed(&mut Cursor::new(&buf)).unwrap();
        assert_eq!(decoded, meta);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn roundtrip_stream_of_frames() {
        let mut buf = Vec::new();
        for seq in 64..70 {
            write_framed(&mut buf, &LedgerCloseMeta::empty(seq)).unwrap();
        }

        let mut cursor = Cursor::new(&buf);
        for seq in 64..70 {
            let (meta, _) = read_framed(&mut cursor).unwrap();
            assert_eq!(meta.sequence(), seq);
        }
        assert!(matches!(read_framed(&mut cursor), Err(CodecError::Eof)));
    }

    #[test]
    fn header_carries_continuation_bit() {
        let mut buf = Vec::new();
        write_framed(&mut buf, &LedgerCloseMeta::empty(2)).unwrap();
        assert_eq!(buf[0] & 0x80, 0x80);
    }

    #[test]
    fn missing_continuation_bit_rejected() {
        let mut buf = Vec::new();
        write_framed(&mut buf, &LedgerCloseMeta::empty(2)).unwrap();
        buf[0] &= 0x7f;
        let err = read_framed(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::MissingContinuationBit { .. }));
    }

    #[test]
    fn truncated_payload_rejected() {
        let mut buf = Vec::new();
        write_framed(&mut buf, &LedgerCloseMeta::empty(2)).unwrap();
        buf.truncate(buf.len() - 3);
        let err = read_framed(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedFrame { .. }));
    }

    #[test]
    fn truncated_header_rejected() {
        let mut buf = Vec::new();
        write_framed(&mut buf, &LedgerCloseMeta::empty(2)).unwrap();
        buf.truncate(2);
        let err = read_framed(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedFrame { .. }));
    }

    #[test]
    fn eof_before_header_is_clean() {
        let err = read_framed(&mut Cursor::new(Vec::<u8>::new())).unwrap_err();
        assert!(matches!(err, CodecError::Eof));
    }

    #[test]
    fn garbage_payload_rejected() {
        let mut buf = (CONTINUATION_BIT | 3).to_be_bytes().to_vec();
        buf.extend_from_slice(&[0xde, 0xad, 0xbe]);
        let err = read_framed(&mut Cursor::new(&buf)).unwrap_err();
        assert!(matches!(err, CodecError::Decode(_)));
    }
}
