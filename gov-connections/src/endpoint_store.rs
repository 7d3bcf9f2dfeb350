use async_trait::async_trait;

use gov_common::{Endpoint, EndpointKind};

/// Persistence boundary for `ClusterEndpoint`/`RegistryEndpoint`/
/// `StorageEndpoint` rows. Treated as an external collaborator (the DB
/// session layer is out of scope) so the connection
/// manager only depends on this trait.
#[async_trait]
pub trait EndpointStore: Send + Sync {
    async fn get(&self, kind: EndpointKind, id: &str) -> Option<Endpoint>;

    /// Ids of all `is_active` endpoints of `kind`. Used by the metrics
    /// collector's periodic sweep and by admin listing endpoints; not on the request hot path.
    async fn list_active(&self, kind: EndpointKind) -> Vec<String>;
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryEndpointStore {
        endpoints: Mutex<HashMap<(EndpointKind, String), Endpoint>>,
    }

    impl InMemoryEndpointStore {
        pub fn with(self, endpoint: Endpoint) -> Self {
            self.endpoints
                .lock()
                .unwrap()
                .insert((endpoint.kind, endpoint.id.clone()), endpoint);
            self
        }

        pub fn deactivate(&self, kind: EndpointKind, id: &str) {
            if let Some(endpoint) = self
                .endpoints
                .lock()
                .unwrap()
                .get_mut(&(kind, id.to_string()))
            {
                endpoint.is_active = false;
            }
        }
    }

    #[async_trait]
    impl EndpointStore for InMemoryEndpointStore {
        async fn get(&self, kind: EndpointKind, id: &str) -> Option<Endpoint> {
            self.endpoints
                .lock()
                .unwrap()
                .get(&(kind, id.to_string()))
                .cloned()
        }

        async fn list_active(&self, kind: EndpointKind) -> Vec<String> {
            self.endpoints
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.kind == kind && e.is_active)
                .map(|e| e.id.clone())
                .collect()
        }
    }
}
