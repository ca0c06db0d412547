/*!
# Class File Rewriting

Renames the class names referenced by a compiled class file without
decoding its bytecode.

Every class name in a class file lives in a `CONSTANT_Utf8` entry of the
constant pool. The pool is parsed into entries and the rest of the file
is kept as an opaque byte body. A walk over the body and the pool finds
every place that points at a Utf8 entry holding an internal name, a
descriptor or a signature, remembering where the pointing `u2` index
sits. It also notes Utf8 entries that are used as plain text (member
names, string constants, attribute names...).

Rewriting then works per Utf8 entry:
- an entry used only as a symbol, with all uses mapping to the same new
  text, is replaced in place
- otherwise the new text is appended to the pool as a new Utf8 entry and
  each changed use is pointed at it

Since pool entries are never removed or reordered, every index held by
bytecode, stack maps and unknown attributes stays valid.
*/

use std::collections::{HashMap, HashSet};

use super::signature::{
    remap_class_name, remap_return_descriptor, remap_signature, SignatureError,
};
use super::{mutf8, ShadeRemapper};

/// `0xCAFEBABE`
pub const MAGIC: [u8; 4] = [0xCA, 0xFE, 0xBA, 0xBE];

const MAX_POOL_COUNT: usize = 0xFFFF;

const TAG_UTF8: u8 = 1;
const TAG_INTEGER: u8 = 3;
const TAG_FLOAT: u8 = 4;
const TAG_LONG: u8 = 5;
const TAG_DOUBLE: u8 = 6;
const TAG_CLASS: u8 = 7;
const TAG_STRING: u8 = 8;
const TAG_FIELDREF: u8 = 9;
const TAG_METHODREF: u8 = 10;
const TAG_INTERFACE_METHODREF: u8 = 11;
const TAG_NAME_AND_TYPE: u8 = 12;
const TAG_METHOD_HANDLE: u8 = 15;
const TAG_METHOD_TYPE: u8 = 16;
const TAG_DYNAMIC: u8 = 17;
const TAG_INVOKE_DYNAMIC: u8 = 18;
const TAG_MODULE: u8 = 19;
const TAG_PACKAGE: u8 = 20;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ClassFileError {
    #[error("missing class file magic")]
    BadMagic,

    #[error("truncated at byte {0}")]
    Truncated(usize),

    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag { index: u16, tag: u8 },

    #[error("constant pool index {0} out of range")]
    BadIndex(u16),

    #[error("constant pool entry {0} is not a Utf8 entry")]
    NotUtf8(u16),

    #[error("constant pool entry {0} is not valid modified UTF-8")]
    InvalidUtf8(u16),

    #[error("unknown type annotation target {0:#04x}")]
    UnknownTarget(u8),

    #[error("unknown annotation element tag `{0}`")]
    UnknownElement(char),

    #[error(transparent)]
    Signature(#[from] SignatureError),

    #[error("constant pool would exceed {MAX_POOL_COUNT} entries")]
    PoolOverflow,

    #[error("remapped name is {0} bytes, longer than a Utf8 entry can hold")]
    Utf8TooLong(usize),
}

type Result<T> = std::result::Result<T, ClassFileError>;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PoolEntry {
    /// Index 0 and the slot after a long or double
    Unusable,
    Utf8(Vec<u8>),
    Other { tag: u8, data: Vec<u8> },
}

/// How a Utf8 entry is interpreted at one use site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    /// `CONSTANT_Class` name: internal name or array descriptor
    ClassName,
    /// Field or method descriptor, or generic signature
    Signature,
    /// Class of an annotation `c` element: a field descriptor or `V`
    ReturnDescriptor,
}

/// Location of a `u2` pool index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Site {
    Pool { entry: usize, offset: usize },
    Body(usize),
}

#[derive(Debug, Clone, Copy)]
struct SymbolUse {
    utf8: u16,
    kind: SymbolKind,
    site: Site,
}

/// A parsed class file: header, constant pool and opaque body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassFile {
    version: [u8; 4],
    pool: Vec<PoolEntry>,
    body: Vec<u8>,
}

/// Whether `data` starts with the class file magic
pub fn has_magic(data: &[u8]) -> bool {
    data.starts_with(&MAGIC)
}

impl ClassFile {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if !has_magic(data) {
            return Err(ClassFileError::BadMagic);
        }
        let mut reader = Reader::new(data);
        reader.skip(4)?;
        let version = [reader.u8()?, reader.u8()?, reader.u8()?, reader.u8()?];
        let count = reader.u16()?;

        let mut pool = Vec::with_capacity(usize::from(count));
        pool.push(PoolEntry::Unusable);
        while pool.len() < usize::from(count) {
            let index = pool.len() as u16;
            let tag = reader.u8()?;
            let size = match tag {
                TAG_UTF8 => {
                    let len = reader.u16()?;
                    pool.push(PoolEntry::Utf8(reader.bytes(usize::from(len))?.to_vec()));
                    continue;
                }
                TAG_CLASS | TAG_STRING | TAG_METHOD_TYPE | TAG_MODULE | TAG_PACKAGE => 2,
                TAG_METHOD_HANDLE => 3,
                TAG_INTEGER
                | TAG_FLOAT
                | TAG_FIELDREF
                | TAG_METHODREF
                | TAG_INTERFACE_METHODREF
                | TAG_NAME_AND_TYPE
                | TAG_DYNAMIC
                | TAG_INVOKE_DYNAMIC => 4,
                TAG_LONG | TAG_DOUBLE => 8,
                tag => return Err(ClassFileError::UnknownTag { index, tag }),
            };
            let data = reader.bytes(size)?.to_vec();
            pool.push(PoolEntry::Other { tag, data });
            if matches!(tag, TAG_LONG | TAG_DOUBLE) {
                pool.push(PoolEntry::Unusable);
            }
        }
        if pool.len() > usize::from(count) {
            // a trailing long or double claims a slot past the declared count
            return Err(ClassFileError::BadIndex(count));
        }

        let body = reader.rest().to_vec();
        let class = Self {
            version,
            pool,
            body,
        };
        // validates the body structure and every referenced entry
        class.collect_uses()?;
        Ok(class)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.body.len() + self.pool.len() * 8 + 10);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&self.version);
        out.extend_from_slice(&(self.pool.len() as u16).to_be_bytes());
        for entry in &self.pool {
            match entry {
                PoolEntry::Unusable => {}
                PoolEntry::Utf8(bytes) => {
                    out.push(TAG_UTF8);
                    out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
                    out.extend_from_slice(bytes);
                }
                PoolEntry::Other { tag, data } => {
                    out.push(*tag);
                    out.extend_from_slice(data);
                }
            }
        }
        out.extend_from_slice(&self.body);
        out
    }

    /// Number of constant pool slots, including the unusable slot 0
    pub fn pool_count(&self) -> usize {
        self.pool.len()
    }

    /// Text of a Utf8 entry
    pub fn utf8(&self, index: u16) -> Result<String> {
        let bytes = utf8_bytes(&self.pool, index)?;
        mutf8::decode(bytes).ok_or(ClassFileError::InvalidUtf8(index))
    }

    /// Internal name of the class declared by this file
    pub fn this_class(&self) -> Result<String> {
        let mut reader = Reader::new(&self.body);
        reader.skip(2)?;
        let class_index = reader.u16()?;
        self.class_name(class_index)
    }

    /// Internal name of the superclass, `None` when there is none
    pub fn super_class(&self) -> Result<Option<String>> {
        let mut reader = Reader::new(&self.body);
        reader.skip(4)?;
        match reader.u16()? {
            0 => Ok(None),
            index => self.class_name(index).map(Some),
        }
    }

    fn class_name(&self, class_index: u16) -> Result<String> {
        match self.pool.get(usize::from(class_index)) {
            Some(PoolEntry::Other {
                tag: TAG_CLASS,
                data,
            }) => self.utf8(be16(data, 0)),
            _ => Err(ClassFileError::BadIndex(class_index)),
        }
    }

    /// Every internal name, descriptor and signature referenced, in walk order
    pub fn symbol_references(&self) -> Result<Vec<String>> {
        let uses = self.collect_uses()?;
        uses.symbols.iter().map(|u| self.utf8(u.utf8)).collect()
    }

    /// Apply `remapper` to every symbol reference. Returns whether
    /// anything changed.
    pub fn remap(&mut self, remapper: &ShadeRemapper) -> Result<bool> {
        let uses = self.collect_uses()?;

        let mut use_counts: HashMap<u16, usize> = HashMap::new();
        let mut rewrites = Vec::new();
        for symbol in &uses.symbols {
            *use_counts.entry(symbol.utf8).or_default() += 1;
            let text = self.utf8(symbol.utf8)?;
            let mapped = match symbol.kind {
                SymbolKind::ClassName => remap_class_name(&text, remapper)?,
                SymbolKind::Signature => remap_signature(&text, remapper)?,
                SymbolKind::ReturnDescriptor => remap_return_descriptor(&text, remapper)?,
            };
            if mapped != text {
                let bytes = mutf8::encode(&mapped);
                if bytes.len() > usize::from(u16::MAX) {
                    return Err(ClassFileError::Utf8TooLong(bytes.len()));
                }
                rewrites.push((*symbol, bytes));
            }
        }
        if rewrites.is_empty() {
            return Ok(false);
        }

        // entries whose every use is a symbol rewritten to the same text
        let in_place: HashSet<u16> = {
            let mut targets: HashMap<u16, (Option<&[u8]>, usize)> = HashMap::new();
            for (symbol, bytes) in &rewrites {
                let (target, count) = targets
                    .entry(symbol.utf8)
                    .or_insert((Some(bytes.as_slice()), 0));
                if *target != Some(bytes.as_slice()) {
                    *target = None;
                }
                *count += 1;
            }
            targets
                .into_iter()
                .filter(|(index, (target, count))| {
                    target.is_some()
                        && !uses.plain.contains(index)
                        && use_counts.get(index) == Some(count)
                })
                .map(|(index, _)| index)
                .collect()
        };

        let mut appended: HashMap<Vec<u8>, u16> = HashMap::new();
        for (symbol, bytes) in rewrites {
            if in_place.contains(&symbol.utf8) {
                self.pool[usize::from(symbol.utf8)] = PoolEntry::Utf8(bytes);
                continue;
            }
            let index = match appended.get(&bytes) {
                Some(index) => *index,
                None => {
                    if self.pool.len() >= MAX_POOL_COUNT {
                        return Err(ClassFileError::PoolOverflow);
                    }
                    let index = self.pool.len() as u16;
                    self.pool.push(PoolEntry::Utf8(bytes.clone()));
                    appended.insert(bytes, index);
                    index
                }
            };
            self.patch(symbol.site, index);
        }
        Ok(true)
    }

    fn patch(&mut self, site: Site, index: u16) {
        let (buffer, offset) = match site {
            Site::Body(offset) => (&mut self.body, offset),
            Site::Pool { entry, offset } => match &mut self.pool[entry] {
                PoolEntry::Other { data, .. } => (data, offset),
                _ => return,
            },
        };
        buffer[offset..offset + 2].copy_from_slice(&index.to_be_bytes());
    }

    fn collect_uses(&self) -> Result<Uses> {
        let mut collector = Collector {
            pool: &self.pool,
            uses: Uses::default(),
        };
        collector.pool_entries()?;
        collector.body(&mut Reader::new(&self.body))?;
        Ok(collector.uses)
    }
}

fn be16(data: &[u8], offset: usize) -> u16 {
    u16::from_be_bytes([data[offset], data[offset + 1]])
}

fn utf8_bytes(pool: &[PoolEntry], index: u16) -> Result<&[u8]> {
    match pool.get(usize::from(index)) {
        Some(PoolEntry::Utf8(bytes)) => Ok(bytes),
        Some(_) if index != 0 => Err(ClassFileError::NotUtf8(index)),
        _ => Err(ClassFileError::BadIndex(index)),
    }
}

#[derive(Debug, Default)]
struct Uses {
    symbols: Vec<SymbolUse>,
    plain: HashSet<u16>,
}

struct Collector<'p> {
    pool: &'p [PoolEntry],
    uses: Uses,
}

impl Collector<'_> {
    fn symbol(&mut self, utf8: u16, kind: SymbolKind, site: Site) -> Result<()> {
        utf8_bytes(self.pool, utf8)?;
        self.uses.symbols.push(SymbolUse { utf8, kind, site });
        Ok(())
    }

    fn plain(&mut self, utf8: u16) -> Result<()> {
        utf8_bytes(self.pool, utf8)?;
        self.uses.plain.insert(utf8);
        Ok(())
    }

    fn optional_plain(&mut self, utf8: u16) -> Result<()> {
        if utf8 == 0 {
            Ok(())
        } else {
            self.plain(utf8)
        }
    }

    fn body_symbol(&mut self, reader: &mut Reader, kind: SymbolKind) -> Result<()> {
        let at = reader.pos();
        let index = reader.u16()?;
        self.symbol(index, kind, Site::Body(at))
    }

    fn body_plain(&mut self, reader: &mut Reader) -> Result<()> {
        let index = reader.u16()?;
        self.plain(index)
    }

    fn pool_entries(&mut self) -> Result<()> {
        for (entry, item) in self.pool.iter().enumerate() {
            let PoolEntry::Other { tag, data } = item else {
                continue;
            };
            match *tag {
                TAG_CLASS => {
                    let site = Site::Pool { entry, offset: 0 };
                    self.symbol(be16(data, 0), SymbolKind::ClassName, site)?;
                }
                TAG_METHOD_TYPE => {
                    let site = Site::Pool { entry, offset: 0 };
                    self.symbol(be16(data, 0), SymbolKind::Signature, site)?;
                }
                TAG_NAME_AND_TYPE => {
                    self.plain(be16(data, 0))?;
                    let site = Site::Pool { entry, offset: 2 };
                    self.symbol(be16(data, 2), SymbolKind::Signature, site)?;
                }
                TAG_STRING | TAG_MODULE | TAG_PACKAGE => self.plain(be16(data, 0))?,
                _ => {}
            }
        }
        Ok(())
    }

    fn body(&mut self, reader: &mut Reader) -> Result<()> {
        // access_flags, this_class, super_class
        reader.skip(6)?;
        let interfaces = reader.u16()?;
        reader.skip(usize::from(interfaces) * 2)?;
        for _ in 0..2 {
            // fields, then methods
            let count = reader.u16()?;
            for _ in 0..count {
                reader.skip(2)?;
                self.body_plain(reader)?;
                self.body_symbol(reader, SymbolKind::Signature)?;
                self.attributes(reader)?;
            }
        }
        self.attributes(reader)
    }

    fn attributes(&mut self, reader: &mut Reader) -> Result<()> {
        let count = reader.u16()?;
        for _ in 0..count {
            let name_index = reader.u16()?;
            self.plain(name_index)?;
            let length = reader.u32()? as usize;
            let mut content = reader.sub(length)?;
            let name = utf8_bytes(self.pool, name_index)?;
            self.attribute(name, &mut content)?;
        }
        Ok(())
    }

    fn attribute(&mut self, name: &[u8], reader: &mut Reader) -> Result<()> {
        match name {
            b"Signature" => self.body_symbol(reader, SymbolKind::Signature),
            b"SourceFile" => self.body_plain(reader),
            b"Code" => {
                reader.skip(4)?;
                let code_length = reader.u32()? as usize;
                reader.skip(code_length)?;
                let exceptions = reader.u16()?;
                reader.skip(usize::from(exceptions) * 8)?;
                self.attributes(reader)
            }
            b"LocalVariableTable" | b"LocalVariableTypeTable" => {
                let kind = SymbolKind::Signature;
                let count = reader.u16()?;
                for _ in 0..count {
                    reader.skip(4)?;
                    self.body_plain(reader)?;
                    self.body_symbol(reader, kind)?;
                    reader.skip(2)?;
                }
                Ok(())
            }
            b"InnerClasses" => {
                let count = reader.u16()?;
                for _ in 0..count {
                    reader.skip(4)?;
                    let name = reader.u16()?;
                    self.optional_plain(name)?;
                    reader.skip(2)?;
                }
                Ok(())
            }
            b"MethodParameters" => {
                let count = reader.u8()?;
                for _ in 0..count {
                    let name = reader.u16()?;
                    self.optional_plain(name)?;
                    reader.skip(2)?;
                }
                Ok(())
            }
            b"Record" => {
                let count = reader.u16()?;
                for _ in 0..count {
                    self.body_plain(reader)?;
                    self.body_symbol(reader, SymbolKind::Signature)?;
                    self.attributes(reader)?;
                }
                Ok(())
            }
            b"RuntimeVisibleAnnotations" | b"RuntimeInvisibleAnnotations" => {
                let count = reader.u16()?;
                for _ in 0..count {
                    self.annotation(reader)?;
                }
                Ok(())
            }
            b"RuntimeVisibleParameterAnnotations" | b"RuntimeInvisibleParameterAnnotations" => {
                let parameters = reader.u8()?;
                for _ in 0..parameters {
                    let count = reader.u16()?;
                    for _ in 0..count {
                        self.annotation(reader)?;
                    }
                }
                Ok(())
            }
            b"RuntimeVisibleTypeAnnotations" | b"RuntimeInvisibleTypeAnnotations" => {
                let count = reader.u16()?;
                for _ in 0..count {
                    self.type_annotation(reader)?;
                }
                Ok(())
            }
            b"AnnotationDefault" => self.element_value(reader),
            b"Module" => self.module(reader),
            _ => Ok(()),
        }
    }

    fn annotation(&mut self, reader: &mut Reader) -> Result<()> {
        self.body_symbol(reader, SymbolKind::Signature)?;
        let pairs = reader.u16()?;
        for _ in 0..pairs {
            self.body_plain(reader)?;
            self.element_value(reader)?;
        }
        Ok(())
    }

    fn element_value(&mut self, reader: &mut Reader) -> Result<()> {
        match reader.u8()? {
            b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' => reader.skip(2),
            b's' => self.body_plain(reader),
            b'e' => {
                self.body_symbol(reader, SymbolKind::Signature)?;
                self.body_plain(reader)
            }
            b'c' => self.body_symbol(reader, SymbolKind::ReturnDescriptor),
            b'@' => self.annotation(reader),
            b'[' => {
                let count = reader.u16()?;
                for _ in 0..count {
                    self.element_value(reader)?;
                }
                Ok(())
            }
            other => Err(ClassFileError::UnknownElement(char::from(other))),
        }
    }

    fn type_annotation(&mut self, reader: &mut Reader) -> Result<()> {
        let target = reader.u8()?;
        match target {
            0x00 | 0x01 | 0x16 => reader.skip(1)?,
            0x10..=0x12 | 0x17 | 0x42..=0x46 => reader.skip(2)?,
            0x13..=0x15 => {}
            0x40 | 0x41 => {
                let entries = reader.u16()?;
                reader.skip(usize::from(entries) * 6)?;
            }
            0x47..=0x4B => reader.skip(3)?,
            other => return Err(ClassFileError::UnknownTarget(other)),
        }
        let path_length = reader.u8()?;
        reader.skip(usize::from(path_length) * 2)?;
        self.annotation(reader)
    }

    fn module(&mut self, reader: &mut Reader) -> Result<()> {
        // name, flags, version
        reader.skip(4)?;
        let version = reader.u16()?;
        self.optional_plain(version)?;

        let requires = reader.u16()?;
        for _ in 0..requires {
            reader.skip(4)?;
            let version = reader.u16()?;
            self.optional_plain(version)?;
        }
        // exports, opens
        for _ in 0..2 {
            let count = reader.u16()?;
            for _ in 0..count {
                reader.skip(4)?;
                let targets = reader.u16()?;
                reader.skip(usize::from(targets) * 2)?;
            }
        }
        let uses = reader.u16()?;
        reader.skip(usize::from(uses) * 2)?;
        let provides = reader.u16()?;
        for _ in 0..provides {
            reader.skip(2)?;
            let with = reader.u16()?;
            reader.skip(usize::from(with) * 2)?;
        }
        Ok(())
    }
}

/// Bounds-checked big-endian cursor. Positions are absolute offsets in
/// the underlying buffer.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
    end: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            end: data.len(),
        }
    }

    fn pos(&self) -> usize {
        self.pos
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.end)
            .ok_or(ClassFileError::Truncated(self.pos))?;
        let data: &'a [u8] = self.data;
        let slice = &data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<()> {
        self.bytes(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let bytes = self.bytes(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32> {
        let bytes = self.bytes(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reader over the next `len` bytes; this reader moves past them
    fn sub(&mut self, len: usize) -> Result<Reader<'a>> {
        let start = self.pos;
        self.skip(len)?;
        Ok(Reader {
            data: self.data,
            pos: start,
            end: self.pos,
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let data: &'a [u8] = self.data;
        let rest = &data[self.pos..self.end];
        self.pos = self.end;
        rest
    }
}
