//! Jar level shading: entry names and class files are renamed, everything
//! else passes through byte for byte.

use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{Read, Seek, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::classfile::{has_magic, ClassFile};
use super::{ShadeError, ShadeRemapper};

/// One named archive entry held in memory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub name: String,
    pub data: Vec<u8>,
}

impl ArchiveEntry {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    /// `.class` entries starting with the class file magic
    pub fn is_class_file(&self) -> bool {
        self.name.ends_with(".class") && has_magic(&self.data)
    }
}

/// Counts of one shading run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShadeSummary {
    pub entries: u64,
    pub directories: u64,
    pub classes: u64,
    pub classes_rewritten: u64,
    pub renamed: u64,
}

impl ShadeSummary {
    fn record(&mut self, original: &str, remapped: &ArchiveEntry, class_changed: Option<bool>) {
        self.entries += 1;
        if original != remapped.name {
            self.renamed += 1;
        }
        if let Some(changed) = class_changed {
            self.classes += 1;
            if changed {
                self.classes_rewritten += 1;
            }
        }
    }
}

/// Rename and rewrite one entry. The second value is `Some(changed)` for
/// class files.
fn remap_entry_inner(
    entry: ArchiveEntry,
    remapper: &ShadeRemapper,
) -> Result<(ArchiveEntry, Option<bool>), ShadeError> {
    let name = remapper.map(&entry.name).into_owned();
    if !entry.is_class_file() {
        return Ok((ArchiveEntry::new(name, entry.data), None));
    }

    let corrupt = |source| ShadeError::Corrupt {
        entry: entry.name.clone(),
        source,
    };
    let mut class = ClassFile::parse(&entry.data).map_err(corrupt)?;
    let changed = class.remap(remapper).map_err(corrupt)?;
    let data = if changed { class.to_bytes() } else { entry.data };
    Ok((ArchiveEntry::new(name, data), Some(changed)))
}

/// Rename one entry and, for class files, every class name it references
pub fn remap_entry(entry: ArchiveEntry, remapper: &ShadeRemapper) -> Result<ArchiveEntry, ShadeError> {
    remap_entry_inner(entry, remapper).map(|(entry, _)| entry)
}

/// Remap an in-memory entry list, keeping its order
pub fn remap_entries(
    entries: impl IntoIterator<Item = ArchiveEntry>,
    remapper: &ShadeRemapper,
) -> Result<Vec<ArchiveEntry>, ShadeError> {
    let mut names = HashSet::new();
    let mut out = Vec::new();
    for entry in entries {
        let remapped = remap_entry(entry, remapper)?;
        if !names.insert(remapped.name.clone()) {
            return Err(ShadeError::DuplicateEntry {
                name: remapped.name,
            });
        }
        out.push(remapped);
    }
    Ok(out)
}

/// Copy a zip archive entry by entry, remapping names and class files.
///
/// Compression (stored or deflated) follows the input entry; timestamps
/// are reset so identical inputs give identical archives.
pub fn remap_archive<R, W>(
    reader: R,
    writer: W,
    remapper: &ShadeRemapper,
) -> Result<(W, ShadeSummary), ShadeError>
where
    R: Read + Seek,
    W: Write + Seek,
{
    let mut archive = ZipArchive::new(reader)?;
    let mut output = ZipWriter::new(writer);
    let mut summary = ShadeSummary::default();
    let mut names = HashSet::new();

    for index in 0..archive.len() {
        let mut file = archive.by_index(index)?;
        let original = file.name().to_string();

        let mut options = SimpleFileOptions::default()
            .compression_method(match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            })
            .last_modified_time(zip::DateTime::default());
        if let Some(mode) = file.unix_mode() {
            options = options.unix_permissions(mode);
        }

        if file.is_dir() {
            let name = remapper.map(&original).into_owned();
            if !names.insert(name.clone()) {
                return Err(ShadeError::DuplicateEntry { name });
            }
            debug!(entry = %original, renamed = %name, "directory");
            output.add_directory(name, options)?;
            summary.directories += 1;
            continue;
        }

        let mut data = Vec::with_capacity(usize::try_from(file.size()).unwrap_or(0));
        file.read_to_end(&mut data).map_err(|source| ShadeError::Entry {
            entry: original.clone(),
            source,
        })?;
        drop(file);

        let (remapped, class_changed) =
            remap_entry_inner(ArchiveEntry::new(original.clone(), data), remapper)?;
        if !names.insert(remapped.name.clone()) {
            return Err(ShadeError::DuplicateEntry {
                name: remapped.name,
            });
        }
        debug!(
            entry = %original,
            renamed = %remapped.name,
            class = class_changed.is_some(),
            rewritten = class_changed.unwrap_or(false),
            "entry"
        );

        output.start_file(remapped.name.as_str(), options)?;
        output
            .write_all(&remapped.data)
            .map_err(|source| ShadeError::Entry {
                entry: remapped.name.clone(),
                source,
            })?;
        summary.record(&original, &remapped, class_changed);
    }

    let writer = output.finish()?;
    Ok((writer, summary))
}

/// Shade one jar file into another
#[derive(Debug, Clone)]
pub struct ShadeTask {
    input: PathBuf,
    output: PathBuf,
    remapper: ShadeRemapper,
}

impl ShadeTask {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>, remapper: ShadeRemapper) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            remapper,
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn remapper(&self) -> &ShadeRemapper {
        &self.remapper
    }

    pub fn run(&self) -> Result<ShadeSummary, ShadeError> {
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ShadeError::Io { path, source }
        };

        let input = File::open(&self.input).map_err(io_error(&self.input))?;
        if let Some(parent) = self.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let output = File::create(&self.output).map_err(io_error(&self.output))?;

        let (_, summary) = remap_archive(input, output, &self.remapper)?;
        info!(
            input = %self.input.display(),
            output = %self.output.display(),
            entries = summary.entries,
            classes = summary.classes,
            rewritten = summary.classes_rewritten,
            renamed = summary.renamed,
            "shading finished"
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn remapper() -> ShadeRemapper {
        ShadeRemapper::new().with_rename("a/b", "x/y").unwrap()
    }

    #[test]
    fn test_non_class_entries_pass_through() {
        let entries = vec![
            ArchiveEntry::new("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"),
            ArchiveEntry::new("a/b/data.txt", "a/b/C"),
            // named like a class but not one
            ArchiveEntry::new("a/b/Fake.class", "not a class"),
        ];

        let out = remap_entries(entries, &remapper()).unwrap();

        assert_eq!(out[0], ArchiveEntry::new("META-INF/MANIFEST.MF", "Manifest-Version: 1.0\n"));
        assert_eq!(out[1], ArchiveEntry::new("x/y/data.txt", "a/b/C"));
        assert_eq!(out[2], ArchiveEntry::new("x/y/Fake.class", "not a class"));
    }

    #[test]
    fn test_corrupt_class_is_fatal() {
        let mut data = vec![0xCA, 0xFE, 0xBA, 0xBE, 0, 0];
        data.extend_from_slice(b"junk");
        let entries = vec![ArchiveEntry::new("a/b/Broken.class", data)];

        let err = remap_entries(entries, &remapper()).unwrap_err();
        assert!(matches!(err, ShadeError::Corrupt { ref entry, .. } if entry == "a/b/Broken.class"));
    }

    #[test]
    fn test_colliding_names_are_rejected() {
        let entries = vec![
            ArchiveEntry::new("a/b/readme.txt", "one"),
            ArchiveEntry::new("x/y/readme.txt", "two"),
        ];

        let err = remap_entries(entries, &remapper()).unwrap_err();
        assert!(matches!(err, ShadeError::DuplicateEntry { ref name } if name == "x/y/readme.txt"));
    }
}
