//! The versioned export file.

use bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};

use super::error::ImportError;
use crate::services::extjson::{self, ExtJsonError};
use crate::services::storage::{ConnectionInfo, ConnectionSecrets};

/// Value of the `type` field
pub const FILE_TYPE: &str = "Compass Connections";
/// The only format version we read and write
pub const CURRENT_VERSION: i32 = 1;
/// Per-record field holding encrypted secrets
pub const SECRETS_FIELD: &str = "connectionSecrets";

/// Plaintext sealed into `connectionSecrets`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SecretsPayload {
    #[serde(default)]
    pub secrets: Option<ConnectionSecrets>,
}

/// One entry of `connections`
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRecord {
    pub info: ConnectionInfo,
    pub connection_secrets: Option<String>,
}

impl ExportRecord {
    pub fn plain(info: ConnectionInfo) -> Self {
        Self {
            info,
            connection_secrets: None,
        }
    }

    fn to_document(&self) -> Result<Document, ExtJsonError> {
        let mut document = bson::to_document(&self.info)?;
        if let Some(encrypted) = &self.connection_secrets {
            document.insert(SECRETS_FIELD, encrypted.as_str());
        }
        Ok(document)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ExportDocument {
    pub connections: Vec<ExportRecord>,
}

impl ExportDocument {
    pub fn new(connections: Vec<ExportRecord>) -> Self {
        Self { connections }
    }

    /// Indented canonical extended JSON
    pub fn to_extended_json(&self) -> Result<String, ExtJsonError> {
        let connections = self
            .connections
            .iter()
            .map(|record| record.to_document().map(Bson::Document))
            .collect::<Result<Vec<_>, _>>()?;

        let document = doc! {
            "type": FILE_TYPE,
            "version": CURRENT_VERSION,
            "connections": connections,
        };
        extjson::to_canonical_string_pretty(&document)
    }

    /// Parse and validate an export file, returning its raw entries.
    ///
    /// Entries are left undecoded so the caller can strip `connectionSecrets`
    /// before turning them into `ConnectionInfo`.
    pub fn parse_entries(text: &str) -> Result<Vec<Document>, ImportError> {
        let parsed = extjson::parse(text).map_err(ImportError::parse)?;

        let mut document = match parsed {
            Bson::Document(document) => document,
            _ => return Err(ImportError::UnrecognizedFormat),
        };

        match document.get("type") {
            Some(Bson::String(file_type)) if file_type == FILE_TYPE => {}
            _ => return Err(ImportError::UnrecognizedFormat),
        }

        let version = document.get("version");
        if !version.is_some_and(is_current_version) {
            return Err(ImportError::UnsupportedVersion {
                expected: CURRENT_VERSION,
                found: version.map_or_else(|| "undefined".to_string(), describe),
            });
        }

        match document.remove("connections") {
            Some(Bson::Array(entries)) => entries
                .into_iter()
                .enumerate()
                .map(|(index, entry)| match entry {
                    Bson::Document(entry) => Ok(entry),
                    other => Err(ImportError::InvalidEntry {
                        index,
                        source: format!("expected a document, got {}", describe(&other)).into(),
                    }),
                })
                .collect(),
            _ => Err(ImportError::MissingConnections),
        }
    }
}

fn is_current_version(version: &Bson) -> bool {
    match version {
        Bson::Int32(v) => *v == CURRENT_VERSION,
        Bson::Int64(v) => *v == i64::from(CURRENT_VERSION),
        Bson::Double(v) => *v == f64::from(CURRENT_VERSION),
        _ => false,
    }
}

fn describe(value: &Bson) -> String {
    match value {
        Bson::String(s) => s.clone(),
        Bson::Int32(v) => v.to_string(),
        Bson::Int64(v) => v.to_string(),
        Bson::Double(v) => v.to_string(),
        Bson::Null => "null".to_string(),
        other => format!("{:?}", other.element_type()),
    }
}
