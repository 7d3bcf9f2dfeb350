use serde::{Deserialize, Serialize};

use crate::error::DomainError;

use super::topic::TopicMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SchemaType {
    Avro,
    Json,
    Protobuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompatibilityMode {
    Backward,
    BackwardTransitive,
    Forward,
    ForwardTransitive,
    Full,
    FullTransitive,
    None,
}

/// Tagged union of where a schema's source bytes come from. Exactly one
/// payload field is set per tag, expressed as a Rust enum rather than the
/// optional-field struct the original used.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "UPPERCASE")]
pub enum SchemaSource {
    Inline { content: String },
    File { path: String },
    Yaml { content: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaReference {
    pub name: String,
    pub subject: String,
    pub version: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSpec {
    pub subject: String,
    pub schema_type: SchemaType,
    pub compatibility_mode: CompatibilityMode,
    pub schema_literal: Option<String>,
    pub schema_source: Option<SchemaSource>,
    #[serde(default)]
    pub references: Vec<SchemaReference>,
    pub metadata: Option<TopicMetadata>,
    #[serde(default)]
    pub dry_run_only: bool,
}

impl SchemaSpec {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        subject: impl Into<String>,
        schema_type: SchemaType,
        compatibility_mode: CompatibilityMode,
        schema_literal: Option<String>,
        schema_source: Option<SchemaSource>,
        references: Vec<SchemaReference>,
        metadata: Option<TopicMetadata>,
        dry_run_only: bool,
    ) -> Result<Self, DomainError> {
        let subject = subject.into();
        if subject.is_empty() {
            return Err(DomainError::invariant("subject", "must not be empty"));
        }
        if subject.len() > 249 {
            return Err(DomainError::invariant(
                "subject",
                "must not exceed 249 characters",
            ));
        }
        if schema_literal.is_none() && schema_source.is_none() {
            return Err(DomainError::invariant(
                "schema_literal/schema_source",
                "at least one of literal or source is required",
            ));
        }
        if schema_literal.is_some() {
            if let Some(source) = &schema_source {
                if !matches!(source, SchemaSource::Inline { .. }) {
                    return Err(DomainError::invariant(
                        "schema_literal",
                        "may only be set when source is absent or inline",
                    ));
                }
            }
        }
        Ok(Self {
            subject,
            schema_type,
            compatibility_mode,
            schema_literal,
            schema_source,
            references,
            metadata,
            dry_run_only,
        })
    }

    /// Environment derived from the subject's first dot-segment; subjects
    /// with no recognized prefix (e.g. bare `RecordNameStrategy` subjects)
    /// fall through to `Dev`.
    pub fn environment(&self) -> super::environment::Environment {
        super::environment::Environment::from_resource_name(&self.subject)
    }

    pub fn fingerprint(&self) -> String {
        crate::fingerprint::hash_hex(&[
            self.subject.as_str(),
            &format!("{:?}", self.schema_type),
            &format!("{:?}", self.compatibility_mode),
            self.schema_literal.as_deref().unwrap_or(""),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_literal_or_source() {
        let err = SchemaSpec::new(
            "dev.user",
            SchemaType::Avro,
            CompatibilityMode::Backward,
            None,
            None,
            vec![],
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Invariant { .. }));
    }

    #[test]
    fn literal_with_file_source_is_invariant() {
        let err = SchemaSpec::new(
            "dev.user",
            SchemaType::Avro,
            CompatibilityMode::Backward,
            Some("{}".to_string()),
            Some(SchemaSource::File {
                path: "x.avsc".to_string(),
            }),
            vec![],
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Invariant { field, .. } if field == "schema_literal"));
    }
}
