use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointKind {
    Cluster,
    Registry,
    Storage,
}

/// Persisted connection coordinates for a Kafka cluster, Schema Registry, or
/// object storage bucket. A mutation to any of these invalidates the
/// connection manager's cache entry for `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: String,
    pub kind: EndpointKind,
    pub coordinates: Value,
    pub credentials: Value,
    pub tls: Option<Value>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
