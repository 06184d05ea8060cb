//! Metadata reader: lazy, parse-once access to a definition file.
//!
//! The file is opened on first access only, read into memory, closed, and
//! parsed. The parsed document is cached for the rest of that file's
//! processing; nothing touches the disk a second time.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::FileErrorKind;

/// The structured formats a definition file may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Toml,
}

impl DocumentFormat {
    /// Pick the format from a file extension. Case-insensitive.
    pub fn from_extension(ext: &str) -> Option<Self> {
        if ext.eq_ignore_ascii_case("json") {
            Some(DocumentFormat::Json)
        } else if ext.eq_ignore_ascii_case("toml") {
            Some(DocumentFormat::Toml)
        } else {
            None
        }
    }

    /// Parse raw bytes into a structured document.
    pub fn parse(self, bytes: &[u8]) -> Result<Value, String> {
        match self {
            DocumentFormat::Json => serde_json::from_slice(bytes).map_err(|e| e.to_string()),
            DocumentFormat::Toml => {
                let text = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
                toml::from_str(text).map_err(|e| e.to_string())
            }
        }
    }
}

/// Lazy reader for one definition file.
#[derive(Debug)]
pub struct MetadataReader {
    path: PathBuf,
    format: DocumentFormat,
    document: Option<Value>,
}

impl MetadataReader {
    pub fn new(path: impl Into<PathBuf>, format: DocumentFormat) -> Self {
        Self {
            path: path.into(),
            format,
            document: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the file has been read and parsed yet.
    pub fn is_loaded(&self) -> bool {
        self.document.is_some()
    }

    /// The parsed document, reading and parsing the file on first call.
    pub fn document(&mut self) -> Result<&Value, FileErrorKind> {
        let value = match self.document.take() {
            Some(value) => value,
            None => {
                let bytes = std::fs::read(&self.path)?;
                let value = self
                    .format
                    .parse(&bytes)
                    .map_err(|reason| FileErrorKind::MalformedPayload { reason })?;
                if !value.is_object() {
                    return Err(FileErrorKind::MalformedPayload {
                        reason: "top-level value must be an object".to_string(),
                    });
                }
                value
            }
        };
        Ok(self.document.insert(value))
    }

    /// The explicit type tag, if the document has one.
    ///
    /// A tag that is present but not a non-empty string is malformed.
    pub fn type_tag(&mut self, field: &str) -> Result<Option<String>, FileErrorKind> {
        match self.document()?.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.trim().to_string())),
            Some(other) => Err(FileErrorKind::MalformedPayload {
                reason: format!("type tag {field:?} must be a non-empty string, got {other}"),
            }),
        }
    }

    /// The record identifier. Required.
    pub fn identifier(&mut self, field: &str) -> Result<String, FileErrorKind> {
        match self.document()?.get(field) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s.trim().to_string()),
            _ => Err(FileErrorKind::MissingIdentifier {
                field: field.to_string(),
            }),
        }
    }

    /// The explicit same-package override flag. Absent means `false`.
    pub fn override_flag(&mut self, field: &str) -> Result<bool, FileErrorKind> {
        match self.document()?.get(field) {
            None | Some(Value::Null) => Ok(false),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(FileErrorKind::MalformedPayload {
                reason: format!("override flag {field:?} must be a boolean, got {other}"),
            }),
        }
    }

    /// Hand over the parsed document, consuming the reader.
    pub fn into_payload(mut self) -> Result<Value, FileErrorKind> {
        self.document()?;
        Ok(self.document.take().unwrap_or(Value::Null))
    }
}
