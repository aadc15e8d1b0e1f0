//! ISO 14443-A CRC_A.
//!
//! Matches the MFRC522 CRC coprocessor configured by `ModeReg = 0x3D`:
//! preset `0x6363`, reflected polynomial `0x8408`, no final XOR. The two CRC
//! bytes are transmitted low byte first.

/// Initial register value for CRC_A.
pub const CRC_PRESET: u16 = 0x6363;

/// Register value left after running the CRC over a payload followed by its
/// own CRC bytes.
pub const CRC_RESIDUE: u16 = 0x0000;

/// Run the CRC register over `bytes` starting from `crc`.
#[inline]
#[must_use]
pub fn update(mut crc: u16, bytes: &[u8]) -> u16 {
    for &byte in bytes {
        let mut ch = byte ^ (crc & 0x00FF) as u8;
        ch ^= ch << 4;
        let ch = u16::from(ch);
        crc = (crc >> 8) ^ (ch << 8) ^ (ch << 3) ^ (ch >> 4);
    }
    crc
}

/// Compute CRC_A over `bytes`, low byte first.
///
/// # Examples
///
/// ```
/// use roomwatch_rfid::crc;
///
/// // HALT frame
/// assert_eq!(crc::compute(&[0x50, 0x00]), [0x57, 0xCD]);
/// ```
#[must_use]
pub fn compute(bytes: &[u8]) -> [u8; 2] {
    update(CRC_PRESET, bytes).to_le_bytes()
}

/// Copy `bytes` and append their CRC.
#[must_use]
pub fn append(bytes: &[u8]) -> Vec<u8> {
    let mut framed = Vec::with_capacity(bytes.len() + 2);
    framed.extend_from_slice(bytes);
    framed.extend_from_slice(&compute(bytes));
    framed
}

/// Returns `true` if the trailing two bytes are the CRC of everything before.
///
/// Frames shorter than three bytes never verify.
#[must_use]
pub fn verify(frame: &[u8]) -> bool {
    frame.len() > 2 && update(CRC_PRESET, frame) == CRC_RESIDUE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(&[0x50, 0x00], [0x57, 0xCD])]
    #[case(&[0x30, 0x00], [0x02, 0xA8])]
    #[case(&[0x00, 0x00], [0xA0, 0x1E])]
    fn test_known_vectors(#[case] payload: &[u8], #[case] expected: [u8; 2]) {
        assert_eq!(compute(payload), expected);
    }

    #[test]
    fn test_empty_payload_is_preset() {
        assert_eq!(compute(&[]), CRC_PRESET.to_le_bytes());
    }

    #[test]
    fn test_append_then_verify() {
        let framed = append(&[0x30, 0x04]);
        assert_eq!(framed.len(), 4);
        assert!(verify(&framed));
    }

    #[test]
    fn test_verify_detects_corruption() {
        let mut framed = append(&[0x30, 0x04]);
        framed[1] ^= 0x01;
        assert!(!verify(&framed));
    }

    #[test]
    fn test_verify_rejects_short_frames() {
        assert!(!verify(&[]));
        assert!(!verify(&[0x63, 0x63]));
    }
}
