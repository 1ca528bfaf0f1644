//! CPG v1 schema validation.
//!
//! The schema document is located by configuration and compiled once per
//! service lifetime. An export that fails validation is a fatal condition
//! for its run.

use anyhow::{Context, Result, anyhow};
use jsonschema::JSONSchema;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::info;

pub struct CpgSchema {
    compiled: JSONSchema,
}

impl CpgSchema {
    /// Load and compile the schema document at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read schema {}", path.display()))?;
        let mut schema: Value = serde_json::from_str(&raw)
            .with_context(|| format!("parse schema {}", path.display()))?;
        if let Some(id) = schema.get_mut("$id") {
            // The on-disk `$id` is a bare filename, which jsonschema's URL
            // resolver rejects as "relative URL without a base". Give it an
            // absolute base so same-document `#/definitions/...` refs still
            // resolve identically.
            *id = Value::String(format!("https://schema.local/{}", path.display()));
        }
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| anyhow!("compile schema {}: {e}", path.display()))?;
        info!("schema: loaded {}", path.display());
        Ok(Self { compiled })
    }

    /// Validate an export document. Returns every violation message.
    pub fn validate(&self, document: &Value) -> Result<()> {
        if let Err(errors) = self.compiled.validate(document) {
            let messages: Vec<String> = errors
                .map(|e| format!("{} at {}", e, e.instance_path))
                .collect();
            return Err(anyhow!(
                "export failed schema validation: {}",
                messages.join("; ")
            ));
        }
        Ok(())
    }
}
