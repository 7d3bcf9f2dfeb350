//! Postgres-backed implementations of the persistence boundaries each
//! upstream crate defines as a trait (`EndpointStore`, `MetadataStore`,
//! `PolicyStore`, `SnapshotStore`). The DB session/ORM layer itself is out
//! of scope; this module is the thin adapter gov-api
//! supplies so the service can run against a real database, mirroring how
//! `hook-janitor::webhooks::WebhookCleaner` wraps a bare `PgPool` rather
//! than a full ORM.

pub mod postgres;

pub use postgres::{
    PostgresEndpointStore, PostgresMetadataStore, PostgresPolicyStore, PostgresSnapshotStore,
};
