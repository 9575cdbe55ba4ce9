//! Upload descriptor format
//!
//! A descriptor is a text file of `key,value` lines. The first comma splits
//! the line; there is no escaping. Blank lines and lines starting with `#`
//! are ignored, as are lines without a comma. The key `file` names a payload
//! to attach as binary; every other key becomes a plain form field.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::UploadError;

const FILE_KEY: &str = "file";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormEntry {
    Text { name: String, value: String },
    File { name: String, path: PathBuf },
}

/// Multipart form described by one descriptor, in file order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadForm {
    entries: Vec<FormEntry>,
}

impl UploadForm {
    pub fn entries(&self) -> &[FormEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Payload to delete along with the descriptor once uploaded
    pub fn file_path(&self) -> Option<&Path> {
        self.entries.iter().rev().find_map(|entry| match entry {
            FormEntry::File { path, .. } => Some(path.as_path()),
            FormEntry::Text { .. } => None,
        })
    }
}

pub fn parse_descriptor(contents: &str) -> UploadForm {
    let entries = contents
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once(','))
        .map(|(key, value)| {
            if key == FILE_KEY {
                FormEntry::File {
                    name: key.to_string(),
                    path: PathBuf::from(value),
                }
            } else {
                FormEntry::Text {
                    name: key.to_string(),
                    value: value.to_string(),
                }
            }
        })
        .collect();

    UploadForm { entries }
}

/// First descriptor in `dir` with the given extension, by file name
pub fn next_descriptor(dir: &Path, extension: &str) -> std::io::Result<Option<PathBuf>> {
    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            candidates.push(path);
        }
    }
    candidates.sort();
    Ok(candidates.into_iter().next())
}

/// Creates the queue directory and any missing parents
pub fn create_queue_dir(path: &Path) -> Result<(), UploadError> {
    if path.exists() && !path.is_dir() {
        return Err(UploadError::NotADirectory(path.to_path_buf()));
    }
    fs::create_dir_all(path).map_err(|source| UploadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Producer side of the format
#[derive(Debug, Clone, Default)]
pub struct DescriptorBuilder {
    entries: Vec<FormEntry>,
}

impl DescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.entries.push(FormEntry::Text {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn file(mut self, path: impl Into<PathBuf>) -> Self {
        self.entries.push(FormEntry::File {
            name: FILE_KEY.to_string(),
            path: path.into(),
        });
        self
    }

    /// Serialized descriptor text
    pub fn render(&self) -> Result<String, UploadError> {
        let mut out = String::new();
        for entry in &self.entries {
            let (name, value) = match entry {
                FormEntry::Text { name, value } => (name.as_str(), value.as_str()),
                FormEntry::File { name, path } => {
                    let value = path.to_str().ok_or_else(|| {
                        UploadError::InvalidField(format!("non UTF-8 path {}", path.display()))
                    })?;
                    (name.as_str(), value)
                }
            };
            check_key(name)?;
            if value.contains(['\n', '\r']) {
                return Err(UploadError::InvalidField(format!(
                    "value of {name} contains a line break"
                )));
            }
            out.push_str(name);
            out.push(',');
            out.push_str(value);
            out.push('\n');
        }
        Ok(out)
    }

    /// Writes `<stem>` then renames it to `<stem>.<extension>`
    ///
    /// The rename makes the descriptor visible to the worker only once complete.
    pub fn write_to_queue(
        &self,
        dir: &Path,
        stem: &str,
        extension: &str,
    ) -> Result<PathBuf, UploadError> {
        let contents = self.render()?;
        let staging = dir.join(stem);
        let target = dir.join(format!("{stem}.{extension}"));

        if let Err(source) = fs::write(&staging, contents) {
            let _ = fs::remove_file(&staging);
            return Err(UploadError::Io {
                path: staging,
                source,
            });
        }
        if let Err(source) = fs::rename(&staging, &target) {
            let _ = fs::remove_file(&staging);
            return Err(UploadError::Io {
                path: target,
                source,
            });
        }

        tracing::debug!("Queued upload descriptor {}", target.display());
        Ok(target)
    }
}

fn check_key(name: &str) -> Result<(), UploadError> {
    if name.is_empty() || name.starts_with('#') || name.contains([',', '\n', '\r']) {
        return Err(UploadError::InvalidField(format!("bad key {name:?}")));
    }
    Ok(())
}
