use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::instrument;

use gov_common::{Policy, PolicyStatus, PolicyTargetEnvironment, PolicyType};

use crate::error::PlanError;

/// Persistence boundary for the `policy(policy_id, version, ...)` table,
/// kept separate from `MetadataStore` since the policy engine's "list
/// active policies" query is a distinct access pattern from the
/// topic/schema apply-result tables `MetadataStore` otherwise covers.
#[async_trait]
pub trait PolicyStore: Send + Sync {
    async fn insert(&self, policy: Policy) -> Result<(), String>;
    async fn versions_of(&self, policy_id: &str) -> Vec<Policy>;
    async fn get(&self, policy_id: &str, version: i32) -> Option<Policy>;
    async fn set_status(&self, policy_id: &str, version: i32, status: PolicyStatus) -> Result<(), String>;
    async fn active_for(&self, policy_type: PolicyType, target_environment: PolicyTargetEnvironment) -> Option<Policy>;
    async fn all_active(&self) -> Vec<Policy>;
}

/// Enforces the DRAFT -> ACTIVE -> ARCHIVED lifecycle and its cross-row
/// invariants: at most one ACTIVE version per `policy_id`, and at most one
/// ACTIVE policy per `(type, target_environment)`.
pub struct PolicyAdmin {
    store: Arc<dyn PolicyStore>,
}

impl PolicyAdmin {
    pub fn new(store: Arc<dyn PolicyStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, content))]
    pub async fn create(
        &self,
        policy_type: PolicyType,
        target_environment: PolicyTargetEnvironment,
        name: impl Into<String>,
        description: Option<String>,
        content: Value,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Policy, PlanError> {
        let policy_id = uuid::Uuid::new_v4().to_string();
        let policy = Policy {
            policy_id,
            policy_type,
            version: 1,
            status: PolicyStatus::Draft,
            target_environment,
            name: name.into(),
            description,
            content,
            created_by: created_by.into(),
            created_at: now,
        };
        self.store
            .insert(policy.clone())
            .await
            .map_err(PlanError::MetadataStore)?;
        Ok(policy)
    }

    /// Every update creates a new DRAFT version; prior versions are
    /// immutable and retained.
    #[instrument(skip(self, content))]
    pub async fn update(
        &self,
        policy_id: &str,
        content: Value,
        description: Option<String>,
        created_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Policy, PlanError> {
        let versions = self.store.versions_of(policy_id).await;
        let latest = versions
            .iter()
            .max_by_key(|p| p.version)
            .ok_or_else(|| PlanError::NotFound(policy_id.to_string()))?;

        let next = Policy {
            policy_id: policy_id.to_string(),
            policy_type: latest.policy_type,
            version: latest.version + 1,
            status: PolicyStatus::Draft,
            target_environment: latest.target_environment,
            name: latest.name.clone(),
            description,
            content,
            created_by: created_by.into(),
            created_at: now,
        };
        self.store
            .insert(next.clone())
            .await
            .map_err(PlanError::MetadataStore)?;
        Ok(next)
    }

    /// Moves `version` to ACTIVE, archiving whatever was previously ACTIVE
    /// for the same `policy_id` and for the same `(type, target_environment)`
    /// under a different `policy_id`.
    #[instrument(skip(self))]
    pub async fn activate(&self, policy_id: &str, version: i32) -> Result<(), PlanError> {
        let target = self
            .store
            .get(policy_id, version)
            .await
            .ok_or_else(|| PlanError::NotFound(format!("{policy_id}@{version}")))?;

        for existing in self.store.versions_of(policy_id).await {
            if existing.status == PolicyStatus::Active && existing.version != version {
                self.store
                    .set_status(policy_id, existing.version, PolicyStatus::Archived)
                    .await
                    .map_err(PlanError::MetadataStore)?;
            }
        }

        if let Some(conflicting) = self
            .store
            .active_for(target.policy_type, target.target_environment)
            .await
        {
            if conflicting.policy_id != policy_id {
                self.store
                    .set_status(&conflicting.policy_id, conflicting.version, PolicyStatus::Archived)
                    .await
                    .map_err(PlanError::MetadataStore)?;
            }
        }

        self.store
            .set_status(policy_id, version, PolicyStatus::Active)
            .await
            .map_err(PlanError::MetadataStore)
    }

    #[instrument(skip(self))]
    pub async fn archive(&self, policy_id: &str, version: i32) -> Result<(), PlanError> {
        let policy = self
            .store
            .get(policy_id, version)
            .await
            .ok_or_else(|| PlanError::NotFound(format!("{policy_id}@{version}")))?;
        if policy.status != PolicyStatus::Active {
            return Err(PlanError::Invariant(gov_common::DomainError::invariant(
                "status",
                "only an ACTIVE version may be archived",
            )));
        }
        self.store
            .set_status(policy_id, version, PolicyStatus::Archived)
            .await
            .map_err(PlanError::MetadataStore)
    }

    /// Re-activates a previously archived version (same invariants as
    /// `activate`).
    pub async fn rollback(&self, policy_id: &str, version: i32) -> Result<(), PlanError> {
        self.activate(policy_id, version).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, policy_id: &str, version: i32) -> Result<(), PlanError> {
        let policy = self
            .store
            .get(policy_id, version)
            .await
            .ok_or_else(|| PlanError::NotFound(format!("{policy_id}@{version}")))?;
        if policy.status == PolicyStatus::Active {
            return Err(PlanError::Invariant(gov_common::DomainError::invariant(
                "status",
                "an ACTIVE policy version cannot be deleted",
            )));
        }
        self.store
            .set_status(policy_id, version, PolicyStatus::Archived)
            .await
            .map_err(PlanError::MetadataStore)
    }

    pub async fn active_policies(&self) -> Vec<Policy> {
        self.store.all_active().await
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryPolicyStore {
        pub rows: Mutex<Vec<Policy>>,
    }

    #[async_trait]
    impl PolicyStore for InMemoryPolicyStore {
        async fn insert(&self, policy: Policy) -> Result<(), String> {
            self.rows.lock().unwrap().push(policy);
            Ok(())
        }

        async fn versions_of(&self, policy_id: &str) -> Vec<Policy> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.policy_id == policy_id)
                .cloned()
                .collect()
        }

        async fn get(&self, policy_id: &str, version: i32) -> Option<Policy> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.policy_id == policy_id && p.version == version)
                .cloned()
        }

        async fn set_status(&self, policy_id: &str, version: i32, status: PolicyStatus) -> Result<(), String> {
            let mut rows = self.rows.lock().unwrap();
            let row = rows
                .iter_mut()
                .find(|p| p.policy_id == policy_id && p.version == version)
                .ok_or_else(|| "no such policy version".to_string())?;
            row.status = status;
            Ok(())
        }

        async fn active_for(&self, policy_type: PolicyType, target_environment: PolicyTargetEnvironment) -> Option<Policy> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.policy_type == policy_type && p.target_environment == target_environment && p.status == PolicyStatus::Active)
                .cloned()
        }

        async fn all_active(&self) -> Vec<Policy> {
            self.rows
                .lock()
                .unwrap()
                .iter()
                .filter(|p| p.status == PolicyStatus::Active)
                .cloned()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock::InMemoryPolicyStore;
    use serde_json::json;

    fn admin() -> PolicyAdmin {
        PolicyAdmin::new(Arc::new(InMemoryPolicyStore::default()))
    }

    #[tokio::test]
    async fn create_starts_as_draft_version_one() {
        let admin = admin();
        let policy = admin
            .create(
                PolicyType::Naming,
                PolicyTargetEnvironment::Prod,
                "prod-naming",
                None,
                json!({}),
                "tester",
                Utc::now(),
            )
            .await
            .unwrap();
        assert_eq!(policy.version, 1);
        assert_eq!(policy.status, PolicyStatus::Draft);
    }

    #[tokio::test]
    async fn update_creates_new_draft_version() {
        let admin = admin();
        let v1 = admin
            .create(PolicyType::Naming, PolicyTargetEnvironment::Prod, "p", None, json!({}), "tester", Utc::now())
            .await
            .unwrap();
        let v2 = admin
            .update(&v1.policy_id, json!({"pattern": "x"}), None, "tester", Utc::now())
            .await
            .unwrap();
        assert_eq!(v2.version, 2);
        assert_eq!(v2.status, PolicyStatus::Draft);
    }

    #[tokio::test]
    async fn activating_one_version_archives_the_previous_active() {
        let admin = admin();
        let v1 = admin
            .create(PolicyType::Naming, PolicyTargetEnvironment::Prod, "p", None, json!({}), "tester", Utc::now())
            .await
            .unwrap();
        admin.activate(&v1.policy_id, 1).await.unwrap();
        let v2 = admin
            .update(&v1.policy_id, json!({"pattern": "y"}), None, "tester", Utc::now())
            .await
            .unwrap();
        admin.activate(&v2.policy_id, 2).await.unwrap();

        let v1_reloaded = admin.store.get(&v1.policy_id, 1).await.unwrap();
        assert_eq!(v1_reloaded.status, PolicyStatus::Archived);
        let active = admin.active_policies().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].version, 2);
    }

    #[tokio::test]
    async fn at_most_one_active_per_type_and_environment_across_policy_ids() {
        let admin = admin();
        let a = admin
            .create(PolicyType::Naming, PolicyTargetEnvironment::Prod, "a", None, json!({}), "tester", Utc::now())
            .await
            .unwrap();
        admin.activate(&a.policy_id, 1).await.unwrap();

        let b = admin
            .create(PolicyType::Naming, PolicyTargetEnvironment::Prod, "b", None, json!({}), "tester", Utc::now())
            .await
            .unwrap();
        admin.activate(&b.policy_id, 1).await.unwrap();

        let active = admin.active_policies().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].policy_id, b.policy_id);
    }

    #[tokio::test]
    async fn delete_is_forbidden_while_active() {
        let admin = admin();
        let v1 = admin
            .create(PolicyType::Naming, PolicyTargetEnvironment::Prod, "p", None, json!({}), "tester", Utc::now())
            .await
            .unwrap();
        admin.activate(&v1.policy_id, 1).await.unwrap();
        let err = admin.delete(&v1.policy_id, 1).await.unwrap_err();
        assert!(matches!(err, PlanError::Invariant(_)));
    }
}
