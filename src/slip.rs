//! SLIP framing for the ROM bootloader serial protocol
//!
//! The ROM wraps every message in RFC 1055 style framing: a `0xC0`
//! delimiter on both ends, with literal `0xC0`/`0xDB` bytes inside the
//! payload replaced by two-byte escape sequences.

use thiserror::Error;

/// Frame delimiter
const END: u8 = 0xC0;
/// Escape token
const ESC: u8 = 0xDB;
/// Escaped `0xC0`
const ESC_END: u8 = 0xDC;
/// Escaped `0xDB`
const ESC_ESC: u8 = 0xDD;

/// Errors produced while decoding a SLIP frame
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SlipError {
    #[error("frame does not start with the 0xC0 delimiter")]
    FrameMissingHeader,
    #[error("invalid SLIP escape sequence 0xDB 0x{0:02X}")]
    InvalidEscapeSequence(u8),
    #[error("frame ended without the terminating 0xC0 delimiter")]
    UnterminatedFrame,
}

/// Encode a payload into a SLIP frame.
///
/// Worst case the output doubles in size, which is acceptable for the
/// small control messages exchanged with the ROM.
pub fn encode(payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(payload.len() + 2);
    frame.push(END);
    for &byte in payload {
        match byte {
            END => frame.extend_from_slice(&[ESC, ESC_END]),
            ESC => frame.extend_from_slice(&[ESC, ESC_ESC]),
            _ => frame.push(byte),
        }
    }
    frame.push(END);
    frame
}

/// Decode a single SLIP frame as delivered by the transport.
///
/// The frame must start with `0xC0`; decoding stops at the next
/// unescaped `0xC0` and anything after it is ignored. A malformed
/// escape sequence is fatal for the whole frame.
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, SlipError> {
    match frame.first() {
        Some(&END) => {}
        _ => return Err(SlipError::FrameMissingHeader),
    }

    let mut payload = Vec::with_capacity(frame.len());
    let mut bytes = frame[1..].iter();

    while let Some(&byte) = bytes.next() {
        match byte {
            END => return Ok(payload),
            ESC => match bytes.next() {
                Some(&ESC_END) => payload.push(END),
                Some(&ESC_ESC) => payload.push(ESC),
                Some(&other) => return Err(SlipError::InvalidEscapeSequence(other)),
                None => return Err(SlipError::UnterminatedFrame),
            },
            other => payload.push(other),
        }
    }

    Err(SlipError::UnterminatedFrame)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn encode_wraps_payload_in_delimiters() {
        assert_eq!(
            encode(&[0x01, 0x02, 0x03]),
            vec![0xC0, 0x01, 0x02, 0x03, 0xC0]
        );
        assert_eq!(encode(&[]), vec![0xC0, 0xC0]);
    }

    #[test]
    fn encode_escapes_end_and_esc() {
        assert_eq!(encode(&[0xC0]), vec![0xC0, 0xDB, 0xDC, 0xC0]);
        assert_eq!(encode(&[0xDB]), vec![0xC0, 0xDB, 0xDD, 0xC0]);
    }

    #[test]
    fn round_trip() {
        let payloads: &[&[u8]] = &[
            &[],
            &[0x00],
            &[0x01, 0xC0, 0x02, 0xDB, 0x03],
            &[0xC0, 0xC0, 0xDB, 0xDB],
            &[0x07, 0x07, 0x12, 0x20, 0x55, 0x55],
        ];
        for payload in payloads {
            assert_eq!(decode(&encode(payload)).unwrap(), payload.to_vec());
        }
    }

    #[test]
    fn decode_rejects_missing_header() {
        assert_eq!(decode(&[]), Err(SlipError::FrameMissingHeader));
        assert_eq!(decode(&[0x01, 0xC0]), Err(SlipError::FrameMissingHeader));
    }

    #[test]
    fn decode_rejects_invalid_escape() {
        assert_eq!(
            decode(&[0xC0, 0xDB, 0x00, 0xC0]),
            Err(SlipError::InvalidEscapeSequence(0x00))
        );
    }

    #[test]
    fn decode_rejects_unterminated_frame() {
        assert_eq!(decode(&[0xC0, 0x01, 0x02]), Err(SlipError::UnterminatedFrame));
        // A dangling escape token has no terminator either
        assert_eq!(decode(&[0xC0, 0x01, 0xDB]), Err(SlipError::UnterminatedFrame));
    }

    #[test]
    fn decode_ignores_bytes_after_terminator() {
        assert_eq!(
            decode(&[0xC0, 0x01, 0x02, 0xC0, 0xAA, 0xBB]).unwrap(),
            vec![0x01, 0x02]
        );
    }
}
