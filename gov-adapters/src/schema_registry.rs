use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::json;
use sha2::{Digest, Sha256};
use tracing::{instrument, warn};

use gov_common::{CompatibilityMode, CompatibilityReport, Endpoint, SchemaSpec, SchemaType};

use crate::error::AdapterError;

const LIST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectDescription {
    pub version: i32,
    pub schema_id: i32,
    pub schema: String,
    pub schema_type: SchemaType,
    pub references: Vec<String>,
    pub hash: String,
}

/// REST client over the Confluent Schema Registry wire protocol. A `reqwest`
/// based async-trait, mirroring `feature_flags::redis::Client`'s
/// trait-plus-mock shape so the planner can be unit tested against a
/// `MockSchemaRegistryAdapter`.
#[async_trait]
pub trait SchemaRegistryAdapter: Send + Sync {
    async fn describe_subjects(
        &self,
        subjects: &[String],
    ) -> Result<BTreeMap<String, SubjectDescription>, AdapterError>;

    /// Never raises: transport errors surface as an incompatible report
    /// carrying the error text as an issue.
    async fn check_compatibility(&self, spec: &SchemaSpec) -> CompatibilityReport;

    async fn register_schema(&self, spec: &SchemaSpec) -> Result<(i32, i32), AdapterError>;

    async fn set_compatibility_mode(
        &self,
        subject: &str,
        mode: CompatibilityMode,
    ) -> Result<(), AdapterError>;

    async fn delete_subject(&self, subject: &str) -> Result<Vec<i32>, AdapterError>;

    async fn list_all_subjects(&self) -> Result<Vec<String>, AdapterError>;
}

pub struct HttpSchemaRegistryAdapter {
    client: Client,
    base_url: String,
}

#[derive(Deserialize)]
struct RegisterResponse {
    id: i32,
}

#[derive(Deserialize)]
struct CompatibilityResponse {
    is_compatible: bool,
    #[serde(default)]
    messages: Vec<String>,
}

#[derive(Deserialize)]
struct VersionedSchemaResponse {
    version: i32,
    id: i32,
    schema: String,
}

impl HttpSchemaRegistryAdapter {
    #[instrument(skip_all, fields(endpoint = %endpoint.id))]
    pub fn connect(endpoint: &Endpoint) -> Result<Self, AdapterError> {
        let base_url = endpoint
            .coordinates
            .get("url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| AdapterError::Protocol("endpoint missing url".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut builder = Client::builder().timeout(LIST_TIMEOUT);
        if let (Some(user), Some(pass)) = (
            endpoint.credentials.get("username").and_then(|v| v.as_str()),
            endpoint.credentials.get("password").and_then(|v| v.as_str()),
        ) {
            let mut headers = reqwest::header::HeaderMap::new();
            let auth = base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                format!("{user}:{pass}"),
            );
            headers.insert(
                reqwest::header::AUTHORIZATION,
                format!("Basic {auth}")
                    .parse()
                    .map_err(|_| AdapterError::Protocol("invalid credentials".to_string()))?,
            );
            builder = builder.default_headers(headers);
        }
        let client = builder
            .build()
            .map_err(|e| AdapterError::Transport(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    fn schema_literal(spec: &SchemaSpec) -> String {
        spec.schema_literal.clone().unwrap_or_default()
    }
}

#[async_trait]
impl SchemaRegistryAdapter for HttpSchemaRegistryAdapter {
    async fn describe_subjects(
        &self,
        subjects: &[String],
    ) -> Result<BTreeMap<String, SubjectDescription>, AdapterError> {
        let mut out = BTreeMap::new();
        for subject in subjects {
            let url = format!("{}/subjects/{subject}/versions/latest", self.base_url);
            let resp = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| AdapterError::Transport(e.to_string()))?;
            if resp.status() == StatusCode::NOT_FOUND {
                continue;
            }
            let body: VersionedSchemaResponse = resp
                .error_for_status()
                .map_err(|e| AdapterError::Protocol(e.to_string()))?
                .json()
                .await
                .map_err(|e| AdapterError::Protocol(e.to_string()))?;
            let hash = format!("{:x}", Sha256::digest(body.schema.as_bytes()));
            out.insert(
                subject.clone(),
                SubjectDescription {
                    version: body.version,
                    schema_id: body.id,
                    schema: body.schema,
                    schema_type: SchemaType::Avro,
                    references: Vec::new(),
                    hash,
                },
            );
        }
        Ok(out)
    }

    async fn check_compatibility(&self, spec: &SchemaSpec) -> CompatibilityReport {
        let url = format!(
            "{}/compatibility/subjects/{}/versions/latest",
            self.base_url, spec.subject
        );
        let body = json!({ "schema": Self::schema_literal(spec) });
        let result = self.client.post(&url).json(&body).send().await;

        let (is_compatible, issues) = match result {
            Err(e) => (false, vec![format!("transport error: {e}")]),
            Ok(resp) if resp.status() == StatusCode::NOT_FOUND => (true, Vec::new()),
            Ok(resp) => match resp.json::<CompatibilityResponse>().await {
                Ok(parsed) => (parsed.is_compatible, parsed.messages),
                Err(e) => (false, vec![format!("malformed compatibility response: {e}")]),
            },
        };

        CompatibilityReport {
            subject: spec.subject.clone(),
            mode: format!("{:?}", spec.compatibility_mode),
            is_compatible,
            issues,
        }
    }

    async fn register_schema(&self, spec: &SchemaSpec) -> Result<(i32, i32), AdapterError> {
        let url = format!("{}/subjects/{}/versions", self.base_url, spec.subject);
        let body = json!({ "schema": Self::schema_literal(spec) });
        let resp = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?;
        if resp.status() == StatusCode::CONFLICT {
            return Err(AdapterError::Protocol(
                "schema is incompatible with existing versions".to_string(),
            ));
        }
        let registered: RegisterResponse = resp
            .error_for_status()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?
            .json()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;

        let latest = format!("{}/subjects/{}/versions/latest", self.base_url, spec.subject);
        let version = match self.client.get(&latest).send().await {
            Ok(resp) => resp
                .json::<VersionedSchemaResponse>()
                .await
                .map(|v| v.version)
                .unwrap_or(1),
            Err(e) => {
                warn!(subject = %spec.subject, error = %e, "could not fetch registered version, defaulting to 1");
                1
            }
        };
        Ok((version, registered.id))
    }

    async fn set_compatibility_mode(
        &self,
        subject: &str,
        mode: CompatibilityMode,
    ) -> Result<(), AdapterError> {
        let url = format!("{}/config/{subject}", self.base_url);
        let body = json!({ "compatibility": format!("{mode:?}").to_uppercase() });
        self.client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        Ok(())
    }

    async fn delete_subject(&self, subject: &str) -> Result<Vec<i32>, AdapterError> {
        let url = format!("{}/subjects/{subject}", self.base_url);
        let resp = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        resp.json::<Vec<i32>>()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))
    }

    async fn list_all_subjects(&self) -> Result<Vec<String>, AdapterError> {
        let url = format!("{}/subjects", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| AdapterError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| AdapterError::Protocol(e.to_string()))?;
        resp.json::<Vec<String>>()
            .await
            .map_err(|e| AdapterError::Protocol(e.to_string()))
    }
}
