//! Shared fixtures: a small class file assembler and zip helpers.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};

use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Assembles class files with a hand-built constant pool
#[derive(Default)]
pub struct ClassAssembler {
    pool: Vec<u8>,
    count: u16,
}

impl ClassAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, tag: u8, data: &[u8]) -> u16 {
        self.count += 1;
        self.pool.push(tag);
        self.pool.extend_from_slice(data);
        self.count
    }

    pub fn utf8(&mut self, text: &str) -> u16 {
        let mut data = (text.len() as u16).to_be_bytes().to_vec();
        data.extend_from_slice(text.as_bytes());
        self.entry(1, &data)
    }

    pub fn class(&mut self, name: &str) -> u16 {
        let name = self.utf8(name);
        self.entry(7, &name.to_be_bytes())
    }

    pub fn string(&mut self, text: &str) -> u16 {
        let text = self.utf8(text);
        self.entry(8, &text.to_be_bytes())
    }

    pub fn name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name = self.utf8(name);
        let descriptor = self.utf8(descriptor);
        let mut data = name.to_be_bytes().to_vec();
        data.extend_from_slice(&descriptor.to_be_bytes());
        self.entry(12, &data)
    }

    pub fn method_ref(&mut self, owner: &str, name: &str, descriptor: &str) -> u16 {
        let owner = self.class(owner);
        let name_and_type = self.name_and_type(name, descriptor);
        let mut data = owner.to_be_bytes().to_vec();
        data.extend_from_slice(&name_and_type.to_be_bytes());
        self.entry(10, &data)
    }

    pub fn long(&mut self, value: i64) -> u16 {
        let index = self.entry(5, &value.to_be_bytes());
        self.count += 1;
        index
    }

    pub fn finish(self, body: &[u8]) -> Vec<u8> {
        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0, 0, 61];
        out.extend_from_slice(&(self.count + 1).to_be_bytes());
        out.extend_from_slice(&self.pool);
        out.extend_from_slice(body);
        out
    }
}

pub fn u16s(values: &[u16]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_be_bytes()).collect()
}

/// Body of one attribute: name index, length, content
pub fn attribute(name: u16, content: &[u8]) -> Vec<u8> {
    let mut out = name.to_be_bytes().to_vec();
    out.extend_from_slice(&(content.len() as u32).to_be_bytes());
    out.extend_from_slice(content);
    out
}

/// `<package>/Util`: a class extending `<package>/Base`, with one
/// generic field, a method carrying a `Code` attribute and a visible
/// annotation, and a string constant naming a class.
pub fn util_class(package: &str) -> Vec<u8> {
    let mut asm = ClassAssembler::new();
    let this = asm.class(&format!("{package}/Util"));
    let base = asm.class(&format!("{package}/Base"));
    let call = asm.method_ref(&format!("{package}/Helper"), "help", &format!("(L{package}/Base;)V"));
    let message = asm.string(&format!("{package}/Util is not renamed in text"));
    let big = asm.long(1 << 40);

    let items = asm.utf8("items");
    let items_descriptor = asm.utf8("Ljava/util/List;");
    let signature_attr = asm.utf8("Signature");
    let items_signature = asm.utf8(&format!("Ljava/util/List<L{package}/Helper;>;"));

    let run = asm.utf8("run");
    let run_descriptor = asm.utf8(&format!("(L{package}/Base;)L{package}/Util;"));
    let code_attr = asm.utf8("Code");
    let annotations_attr = asm.utf8("RuntimeVisibleAnnotations");
    let marker = asm.utf8(&format!("L{package}/Marker;"));
    let element = asm.utf8("value");
    let element_class = asm.utf8(&format!("L{package}/Helper;"));
    let source_attr = asm.utf8("SourceFile");
    let source_file = asm.utf8("Util.java");

    // ldc_w message; ldc2_w big; pop2; pop; aload_1; invokestatic call; aconst_null; areturn
    let mut code = vec![0x13];
    code.extend_from_slice(&message.to_be_bytes());
    code.push(0x14);
    code.extend_from_slice(&big.to_be_bytes());
    code.extend_from_slice(&[0x58, 0x57, 0x2B, 0xB8]);
    code.extend_from_slice(&call.to_be_bytes());
    code.extend_from_slice(&[0x01, 0xB0]);

    let mut code_content = u16s(&[4, 2]);
    code_content.extend_from_slice(&(code.len() as u32).to_be_bytes());
    code_content.extend_from_slice(&code);
    code_content.extend(u16s(&[0, 0]));

    let mut annotation = u16s(&[1, marker, 1, element]);
    annotation.push(b'c');
    annotation.extend(u16s(&[element_class]));

    let mut body = u16s(&[0x0021, this, base, 0]);
    // fields
    body.extend(u16s(&[1, 0x0002, items, items_descriptor, 1]));
    body.extend(attribute(signature_attr, &u16s(&[items_signature])));
    // methods
    body.extend(u16s(&[1, 0x0001, run, run_descriptor, 2]));
    body.extend(attribute(code_attr, &code_content));
    body.extend(attribute(annotations_attr, &annotation));
    // class attributes
    body.extend(u16s(&[1]));
    body.extend(attribute(source_attr, &u16s(&[source_file])));
    asm.finish(&body)
}

/// `app/Main`, calling into `<package>/Util`
pub fn main_class(package: &str) -> Vec<u8> {
    let mut asm = ClassAssembler::new();
    let this = asm.class("app/Main");
    let object = asm.class("java/lang/Object");
    let util = asm.class(&format!("{package}/Util"));
    let body = u16s(&[0x0021, this, object, 1, util, 0, 0, 0]);
    asm.finish(&body)
}

pub enum Entry<'a> {
    Dir(&'a str),
    Stored(&'a str, &'a [u8]),
    Deflated(&'a str, &'a [u8]),
}

pub fn build_zip(entries: &[Entry]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        match entry {
            Entry::Dir(name) => writer
                .add_directory(*name, SimpleFileOptions::default())
                .unwrap(),
            Entry::Stored(name, data) | Entry::Deflated(name, data) => {
                let method = match entry {
                    Entry::Stored(..) => CompressionMethod::Stored,
                    _ => CompressionMethod::Deflated,
                };
                writer
                    .start_file(*name, SimpleFileOptions::default().compression_method(method))
                    .unwrap();
                writer.write_all(data).unwrap();
            }
        }
    }
    writer.finish().unwrap().into_inner()
}

/// `(name, compression, data)` of every entry, in archive order
pub fn read_zip(bytes: &[u8]) -> Vec<(String, CompressionMethod, Vec<u8>)> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    (0..archive.len())
        .map(|index| {
            let mut file = archive.by_index(index).unwrap();
            let mut data = Vec::new();
            file.read_to_end(&mut data).unwrap();
            (file.name().to_string(), file.compression(), data)
        })
        .collect()
}
