// Source rendering for rewritten compilation units.
// Untouched text is emitted byte-for-byte; only replaced initializers change.

use super::{Initializer, SourceUnit};
use crate::constants::Constant;

/// Types that can be written as a Java literal expression
pub trait ToJavaLiteral {
    fn to_java_literal(&self) -> String;
}

impl ToJavaLiteral for str {
    fn to_java_literal(&self) -> String {
        quote_string(self)
    }
}

impl ToJavaLiteral for i32 {
    fn to_java_literal(&self) -> String {
        self.to_string()
    }
}

impl ToJavaLiteral for i64 {
    fn to_java_literal(&self) -> String {
        format!("{self}L")
    }
}

impl ToJavaLiteral for f32 {
    fn to_java_literal(&self) -> String {
        if self.is_nan() {
            "Float.NaN".to_string()
        } else if self.is_infinite() {
            let sign = if *self > 0.0 { "POSITIVE" } else { "NEGATIVE" };
            format!("Float.{sign}_INFINITY")
        } else {
            format!("{self:?}F")
        }
    }
}

impl ToJavaLiteral for f64 {
    fn to_java_literal(&self) -> String {
        if self.is_nan() {
            "Double.NaN".to_string()
        } else if self.is_infinite() {
            let sign = if *self > 0.0 { "POSITIVE" } else { "NEGATIVE" };
            format!("Double.{sign}_INFINITY")
        } else {
            format!("{self:?}D")
        }
    }
}

impl ToJavaLiteral for Constant {
    fn to_java_literal(&self) -> String {
        match self {
            Constant::String(s) => s.to_java_literal(),
            Constant::Int(v) => v.to_java_literal(),
            Constant::Long(v) => v.to_java_literal(),
            Constant::Float(v) => v.to_java_literal(),
            Constant::Double(v) => v.to_java_literal(),
            Constant::Boolean(v) => v.to_string(),
        }
    }
}

/// Quote text as a Java string literal
pub fn quote_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push('"');
    for c in text.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if c.is_control() => {
                let mut units = [0u16; 2];
                for unit in c.encode_utf16(&mut units) {
                    out.push_str(&format!("\\u{unit:04x}"));
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

impl SourceUnit {
    /// Render the unit back to text with all replaced initializers applied
    pub fn render(&self) -> String {
        let mut edits: Vec<(usize, usize, String)> = Vec::new();
        for (_, decl) in self.decls() {
            for field in &decl.fields {
                let Some(literal) = field.replacement() else {
                    continue;
                };
                match &field.initializer {
                    Initializer::Present { span, .. } => {
                        edits.push((span.start, span.end, literal.to_string()));
                    }
                    Initializer::Absent { insert_at } => {
                        edits.push((*insert_at, *insert_at, format!(" = {literal}")));
                    }
                }
            }
        }
        edits.sort_by_key(|(start, _, _)| *start);

        let text = self.text();
        let mut out = String::with_capacity(text.len());
        let mut cursor = 0;
        for (start, end, replacement) in edits {
            out.push_str(&text[cursor..start]);
            out.push_str(&replacement);
            cursor = end;
        }
        out.push_str(&text[cursor..]);
        out
    }
}
