/*!
Remapping of type descriptors and generic signatures.

One recursive-descent parser covers field and method descriptors as well
as class, method and field signatures, since descriptors are signatures
without type arguments or type parameters. Only the outer class name of
a class type is passed through the remapper; inner class suffixes
(`.Inner`) and type variable names are kept.
*/

use super::ShadeRemapper;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Malformed signature `{signature}` at byte {position}")]
pub struct SignatureError {
    pub signature: String,
    pub position: usize,
}

/// Remap every class name in a descriptor or signature
pub fn remap_signature(signature: &str, remapper: &ShadeRemapper) -> Result<String, SignatureError> {
    let mut parser = Parser {
        text: signature,
        pos: 0,
        out: String::with_capacity(signature.len()),
        remapper,
    };
    parser.top_level().map_err(|position| SignatureError {
        signature: signature.to_string(),
        position,
    })?;
    Ok(parser.out)
}

/// Remap a `CONSTANT_Class` name, which is either an internal name or an
/// array descriptor
pub fn remap_class_name(name: &str, remapper: &ShadeRemapper) -> Result<String, SignatureError> {
    if name.starts_with('[') {
        remap_signature(name, remapper)
    } else {
        Ok(remapper.map(name).into_owned())
    }
}

/// Remap a return descriptor, which is a field descriptor or `V`
pub fn remap_return_descriptor(
    descriptor: &str,
    remapper: &ShadeRemapper,
) -> Result<String, SignatureError> {
    if descriptor == "V" {
        Ok(descriptor.to_string())
    } else {
        remap_signature(descriptor, remapper)
    }
}

// Errors carry the byte offset of the failure
type Step = Result<(), usize>;

struct Parser<'a> {
    text: &'a str,
    pos: usize,
    out: String,
    remapper: &'a ShadeRemapper,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Step {
        if self.peek() == Some(byte) {
            self.out.push(byte as char);
            self.pos += 1;
            Ok(())
        } else {
            Err(self.pos)
        }
    }

    // Identifier up to (not including) one of `stops`
    fn identifier(&mut self, stops: &[u8]) -> Result<&'a str, usize> {
        let text: &'a str = self.text;
        let start = self.pos;
        let rest = &text.as_bytes()[start..];
        let len = rest
            .iter()
            .position(|b| stops.contains(b))
            .ok_or(text.len())?;
        if len == 0 {
            return Err(start);
        }
        self.pos += len;
        Ok(&text[start..start + len])
    }

    fn top_level(&mut self) -> Step {
        if self.peek() == Some(b'<') {
            self.type_parameters()?;
        }
        if self.peek() == Some(b'(') {
            self.expect(b'(')?;
            while self.peek() != Some(b')') {
                self.java_type()?;
            }
            self.expect(b')')?;
            if self.peek() == Some(b'V') {
                self.expect(b'V')?;
            } else {
                self.java_type()?;
            }
            while self.peek() == Some(b'^') {
                self.expect(b'^')?;
                self.reference_type()?;
            }
        } else {
            self.java_type()?;
            while self.pos < self.text.len() {
                self.reference_type()?;
            }
        }
        if self.pos == self.text.len() {
            Ok(())
        } else {
            Err(self.pos)
        }
    }

    fn type_parameters(&mut self) -> Step {
        self.expect(b'<')?;
        loop {
            let name = self.identifier(b":")?;
            self.out.push_str(name);
            // class bound, possibly empty
            self.expect(b':')?;
            if matches!(self.peek(), Some(b'L' | b'T' | b'[')) {
                self.reference_type()?;
            }
            while self.peek() == Some(b':') {
                self.expect(b':')?;
                self.reference_type()?;
            }
            if self.peek() == Some(b'>') {
                return self.expect(b'>');
            }
        }
    }

    fn java_type(&mut self) -> Step {
        match self.peek() {
            Some(b @ (b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z')) => self.expect(b),
            _ => self.reference_type(),
        }
    }

    fn reference_type(&mut self) -> Step {
        match self.peek() {
            Some(b'L') => self.class_type(),
            Some(b'T') => {
                self.expect(b'T')?;
                let name = self.identifier(b";")?;
                self.out.push_str(name);
                self.expect(b';')
            }
            Some(b'[') => {
                self.expect(b'[')?;
                self.java_type()
            }
            _ => Err(self.pos),
        }
    }

    fn class_type(&mut self) -> Step {
        self.expect(b'L')?;
        let name = self.identifier(b"<.;")?;
        let mapped = self.remapper.map(name).into_owned();
        self.out.push_str(&mapped);
        self.type_arguments()?;
        while self.peek() == Some(b'.') {
            self.expect(b'.')?;
            let inner = self.identifier(b"<.;")?;
            self.out.push_str(inner);
            self.type_arguments()?;
        }
        self.expect(b';')
    }

    fn type_arguments(&mut self) -> Step {
        if self.peek() != Some(b'<') {
            return Ok(());
        }
        self.expect(b'<')?;
        while self.peek() != Some(b'>') {
            match self.peek() {
                Some(b'*') => self.expect(b'*')?,
                Some(b @ (b'+' | b'-')) => {
                    self.expect(b)?;
                    self.reference_type()?;
                }
                _ => self.reference_type()?,
            }
        }
        self.expect(b'>')
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn remapper() -> ShadeRemapper {
        let mut remapper = ShadeRemapper::new();
        remapper.add_rename("com/lib", "shaded/lib").unwrap();
        remapper
    }

    fn remap(text: &str) -> String {
        remap_signature(text, &remapper()).unwrap()
    }

    #[test]
    fn test_descriptors() {
        assert_eq!(remap("I"), "I");
        assert_eq!(remap("Lcom/lib/A;"), "Lshaded/lib/A;");
        assert_eq!(remap("[[Lcom/lib/A;"), "[[Lshaded/lib/A;");
        assert_eq!(
            remap("(ILcom/lib/A;[J)Lcom/libx/B;"),
            "(ILshaded/lib/A;[J)Lcom/libx/B;"
        );
        assert_eq!(remap("()V"), "()V");
    }

    #[test]
    fn test_class_signature_with_type_parameters() {
        assert_eq!(
            remap("<T:Ljava/lang/Object;K::Lcom/lib/Key;>Lcom/lib/Base<TT;>;Ljava/util/List<+Lcom/lib/A;>;"),
            "<T:Ljava/lang/Object;K::Lshaded/lib/Key;>Lshaded/lib/Base<TT;>;Ljava/util/List<+Lshaded/lib/A;>;"
        );
    }

    #[test]
    fn test_method_signature_with_throws() {
        assert_eq!(
            remap("<E:Lcom/lib/Err;>(Ljava/util/Map<*-Lcom/lib/A;>;)TE;^TE;^Lcom/lib/Fail;"),
            "<E:Lshaded/lib/Err;>(Ljava/util/Map<*-Lshaded/lib/A;>;)TE;^TE;^Lshaded/lib/Fail;"
        );
    }

    #[test]
    fn test_inner_class_suffix_is_kept() {
        assert_eq!(
            remap("Lcom/lib/Outer<TT;>.Inner<Lcom/lib/A;>;"),
            "Lshaded/lib/Outer<TT;>.Inner<Lshaded/lib/A;>;"
        );
    }

    #[test]
    fn test_class_names() {
        assert_eq!(remap_class_name("com/lib/A", &remapper()).unwrap(), "shaded/lib/A");
        assert_eq!(remap_class_name("[Lcom/lib/A;", &remapper()).unwrap(), "[Lshaded/lib/A;");
        assert_eq!(remap_class_name("com/library/A", &remapper()).unwrap(), "com/library/A");
    }

    #[test]
    fn test_return_descriptors() {
        assert_eq!(remap_return_descriptor("V", &remapper()).unwrap(), "V");
        assert_eq!(remap_return_descriptor("[Lcom/lib/A;", &remapper()).unwrap(), "[Lshaded/lib/A;");
        assert!(remap_return_descriptor("VV", &remapper()).is_err());
        assert!(remap_signature("V", &remapper()).is_err());
    }

    #[test]
    fn test_malformed_signatures() {
        for bad in ["", "L", "Lcom/lib/A", "(I", "Q", "I;", "<T>V", "Lcom/lib/A<>"] {
            assert!(remap_signature(bad, &remapper()).is_err(), "{bad}");
        }
    }
}
