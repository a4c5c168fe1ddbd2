//! Bulk schema registration from a directory of definition files.
//!
//! Deploy pipelines keep schema definitions checked in next to the code
//! that produces them; this loader walks a directory and registers every
//! definition matching the requested format, deriving the subject from
//! the file stem.

use std::path::Path;

use tokio::fs;
use tracing::{info, warn};

use crate::client::SchemaRegistryClient;
use crate::error::RegistryError;
use crate::types::{RegisteredSchema, SchemaType};

/// Outcome of a bulk registration pass.
///
/// One bad definition must not block the rest of a deploy, so failures
/// are collected per file instead of aborting the walk.
#[derive(Debug, Default)]
pub struct BulkRegistration {
    /// Successfully registered versions.
    pub registered: Vec<RegisteredSchema>,
    /// File stems that failed, with the error for each.
    pub failed: Vec<(String, RegistryError)>,
}

impl BulkRegistration {
    /// True when every discovered definition registered.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Register every `<stem>.<ext>` definition in `dir` under the subject
/// `<stem>-value`, where the extension is chosen by `schema_type`.
///
/// Files with other extensions and subdirectories are skipped. Returns an
/// error only when the directory itself cannot be read.
pub async fn register_all_from_dir(
    client: &SchemaRegistryClient,
    dir: impl AsRef<Path>,
    schema_type: SchemaType,
) -> Result<BulkRegistration, RegistryError> {
    let dir = dir.as_ref();
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| RegistryError::ConfigInvalid {
            var: "schema_dir".to_string(),
            reason: format!("cannot read {}: {e}", dir.display()),
        })?;

    let mut report = BulkRegistration::default();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| RegistryError::ConfigInvalid {
            var: "schema_dir".to_string(),
            reason: format!("cannot read {}: {e}", dir.display()),
        })?
    {
        let path = entry.path();
        let matches_ext = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| ext == schema_type.file_extension());
        if !matches_ext {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let subject = format!("{stem}-value");

        let schema = match fs::read_to_string(&path).await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    target: "schema_registry",
                    subject,
                    path = %path.display(),
                    error = %e,
                    "Failed to read schema definition"
                );
                report.failed.push((
                    subject,
                    RegistryError::ConfigInvalid {
                        var: "schema_dir".to_string(),
                        reason: format!("cannot read {}: {e}", path.display()),
                    },
                ));
                continue;
            }
        };

        match client.register(&subject, &schema, schema_type).await {
            Ok(registered) => report.registered.push(registered),
            Err(e) => {
                warn!(
                    target: "schema_registry",
                    subject,
                    error = %e,
                    "Failed to register schema"
                );
                report.failed.push((subject, e));
            }
        }
    }

    info!(
        target: "schema_registry",
        dir = %dir.display(),
        registered = report.registered.len(),
        failed = report.failed.len(),
        "Bulk schema registration finished"
    );
    Ok(report)
}
