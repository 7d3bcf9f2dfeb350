//! Health reporting for long-running components (the connection manager,
//! the metrics collector ticker). Adapted from `hook_common::health`; the
//! `IntoResponse` impl lives in `gov-api` so this crate stays framework-free.

use std::collections::HashMap;
use std::ops::Add;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Default, Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub components: HashMap<String, ComponentStatus>,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub enum ComponentStatus {
    Starting,
    HealthyUntil(DateTime<Utc>),
    Unhealthy,
    Stalled,
}

struct HealthMessage {
    component: String,
    status: ComponentStatus,
}

pub struct HealthHandle {
    component: String,
    deadline: Duration,
    sender: mpsc::Sender<HealthMessage>,
}

impl HealthHandle {
    pub async fn report_healthy(&self) {
        self.report_status(ComponentStatus::HealthyUntil(Utc::now().add(self.deadline)))
            .await
    }

    pub async fn report_status(&self, status: ComponentStatus) {
        let message = HealthMessage {
            component: self.component.clone(),
            status,
        };
        if let Err(err) = self.sender.send(message).await {
            warn!("failed to report health status: {}", err)
        }
    }
}

#[derive(Clone)]
pub struct HealthRegistry {
    #[allow(dead_code)]
    name: String,
    components: Arc<RwLock<HashMap<String, ComponentStatus>>>,
    sender: mpsc::Sender<HealthMessage>,
}

impl HealthRegistry {
    pub fn new(name: &str) -> Self {
        let (tx, mut rx) = mpsc::channel::<HealthMessage>(16);
        let registry = Self {
            name: name.to_owned(),
            components: Default::default(),
            sender: tx,
        };

        let components = registry.components.clone();
        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if let Ok(mut map) = components.write() {
                    map.insert(message.component, message.status);
                } else {
                    warn!("poisoned HealthRegistry mutex");
                }
            }
        });

        registry
    }

    pub async fn register(&self, component: String, deadline: Duration) -> HealthHandle {
        let handle = HealthHandle {
            component: component.clone(),
            deadline,
            sender: self.sender.clone(),
        };
        handle
            .report_status(ComponentStatus::Starting)
            .await;
        handle
    }

    pub fn get_status(&self) -> HealthStatus {
        let Ok(map) = self.components.read() else {
            return HealthStatus {
                healthy: false,
                components: HashMap::new(),
            };
        };

        if map.is_empty() {
            return HealthStatus {
                healthy: false,
                components: HashMap::new(),
            };
        }

        let now = Utc::now();
        let mut components = HashMap::new();
        let mut healthy = true;
        for (name, status) in map.iter() {
            let resolved = match status {
                ComponentStatus::HealthyUntil(deadline) if *deadline < now => {
                    ComponentStatus::Stalled
                }
                other => other.clone(),
            };
            if !matches!(resolved, ComponentStatus::HealthyUntil(_)) {
                healthy = false;
            }
            components.insert(name.clone(), resolved);
        }

        HealthStatus { healthy, components }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_registry_is_unhealthy() {
        let registry = HealthRegistry::new("test");
        assert!(!registry.get_status().healthy);
    }

    #[tokio::test]
    async fn reports_healthy_after_registration_and_report() {
        let registry = HealthRegistry::new("test");
        let handle = registry.register("worker".to_string(), Duration::seconds(30)).await;
        handle.report_healthy().await;
        // give the background drain task a chance to run
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert!(registry.get_status().healthy);
    }
}
