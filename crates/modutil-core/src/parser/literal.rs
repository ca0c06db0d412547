//! Java literal decoding

/// Decode the source text of a Java string literal (including quotes).
///
/// Returns `None` for text blocks and malformed literals.
pub fn unquote_string(literal: &str) -> Option<String> {
    if literal.starts_with("\"\"\"") {
        return None;
    }
    let inner = literal.strip_prefix('"')?.strip_suffix('"')?;

    let mut out = String::with_capacity(inner.len());
    let mut units: Vec<u16> = Vec::new();
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            flush_units(&mut units, &mut out)?;
            out.push(c);
            continue;
        }
        let escaped = chars.next()?;
        if escaped == 'u' {
            while chars.peek() == Some(&'u') {
                chars.next();
            }
            let hex: String = chars.by_ref().take(4).collect();
            if hex.len() != 4 {
                return None;
            }
            units.push(u16::from_str_radix(&hex, 16).ok()?);
            continue;
        }
        flush_units(&mut units, &mut out)?;
        match escaped {
            'n' => out.push('\n'),
            't' => out.push('\t'),
            'r' => out.push('\r'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            's' => out.push(' '),
            '0'..='7' => {
                let mut value = escaped.to_digit(8)?;
                let max_digits = if escaped <= '3' { 2 } else { 1 };
                for _ in 0..max_digits {
                    match chars.peek().and_then(|c| c.to_digit(8)) {
                        Some(digit) => {
                            value = value * 8 + digit;
                            chars.next();
                        }
                        None => break,
                    }
                }
                out.push(char::from_u32(value)?);
            }
            other => out.push(other),
        }
    }
    flush_units(&mut units, &mut out)?;
    Some(out)
}

// \u escapes may encode surrogate pairs, so they are decoded as UTF-16
fn flush_units(units: &mut Vec<u16>, out: &mut String) -> Option<()> {
    if units.is_empty() {
        return Some(());
    }
    let decoded = String::from_utf16(units).ok()?;
    out.push_str(&decoded);
    units.clear();
    Some(())
}
