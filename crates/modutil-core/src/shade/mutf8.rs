//! Modified UTF-8 as stored in class-file `CONSTANT_Utf8` entries.
//!
//! NUL is written as `C0 80` and supplementary characters as two
//! three-byte surrogate encodings.

/// Decode, or `None` when the bytes are not valid modified UTF-8
pub fn decode(bytes: &[u8]) -> Option<String> {
    if bytes.iter().all(|&b| b != 0 && b < 0x80) {
        return std::str::from_utf8(bytes).ok().map(str::to_string);
    }

    let mut units = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        let unit = if b < 0x80 {
            i += 1;
            u16::from(b)
        } else if b & 0xE0 == 0xC0 {
            let b1 = continuation(bytes, i + 1)?;
            i += 2;
            (u16::from(b & 0x1F) << 6) | b1
        } else if b & 0xF0 == 0xE0 {
            let b1 = continuation(bytes, i + 1)?;
            let b2 = continuation(bytes, i + 2)?;
            i += 3;
            (u16::from(b & 0x0F) << 12) | (b1 << 6) | b2
        } else {
            return None;
        };
        units.push(unit);
    }
    String::from_utf16(&units).ok()
}

fn continuation(bytes: &[u8], at: usize) -> Option<u16> {
    let b = *bytes.get(at)?;
    (b & 0xC0 == 0x80).then_some(u16::from(b & 0x3F))
}

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
