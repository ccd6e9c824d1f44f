//! Modified UTF-8, the string encoding of `CONSTANT_Utf8` entries: NUL is
//! two bytes and supplementary characters are encoded as surrogate pairs.

pub fn encode(text: &str) -> Vec<u8> {
    let mut out = Vec::with_capacity(text.len());
    for unit in text.encode_utf16() {
        match unit {
            0x0001..=0x007F => out.push(unit as u8),
            0x0000 | 0x0080..=0x07FF => {
                out.push(0xC0 | (unit >> 6) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
            _ => {
                out.push(0xE0 | (unit >> 12) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3F) as u8);
                out.push(0x80 | (unit & 0x3F) as u8);
            }
        }
    }
    out
}

/// Decode `bytes`, or describe the first malformed sequence.
pub fn decode(bytes: &[u8]) -> Result<String, String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let at = i;
        let continuation = move |k: usize| -> Result<u16, String> {
            match bytes.get(at + k) {
                Some(&c) if c & 0xC0 == 0x80 => Ok(u16::from(c & 0x3F)),
                _ => Err(format!("truncated sequence at byte {at}")),
            }
        };
        if b & 0x80 == 0 && b != 0 {
            units.push(u16::from(b));
            i += 1;
        } else if b & 0xE0 == 0xC0 {
            units.push((u16::from(b & 0x1F) << 6) | continuation(1)?);
            i += 2;
        } else if b & 0xF0 == 0xE0 {
            units.push((u16::from(b & 0x0F) << 12) | (continuation(1)? << 6) | continuation(2)?);
            i += 3;
        } else {
            return Err(format!("invalid byte {b:#04x} at {i}"));
        }
    }
    String::from_utf16(&units).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ascii_is_unchanged() {
        assert_eq!(encode("java/lang/Object"), b"java/lang/Object".to_vec());
    }

    #[test]
    fn test_nul_and_supplementary() {
        let bytes = encode("a\0\u{1F600}");
        assert_eq!(&bytes[..3], &[b'a', 0xC0, 0x80]);
        // One surrogate pair, three bytes per half.
        assert_eq!(bytes.len(), 3 + 6);
        assert_eq!(decode(&bytes).unwrap(), "a\0\u{1F600}");
    }

    #[test]
    fn test_two_and_three_byte_forms() {
        let text = "é€";
        assert_eq!(encode(text), text.as_bytes().to_vec());
        assert_eq!(decode(text.as_bytes()).unwrap(), text);
    }

    #[test]
    fn test_rejects_raw_nul_and_truncation() {
        assert!(decode(&[0x00]).is_err());
        assert!(decode(&[0xE2, 0x82]).is_err());
        assert!(decode(&[0xF0, 0x9F, 0x98, 0x80]).is_err());
    }
}
