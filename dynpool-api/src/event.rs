//! # Configuration Events
//!
//! A configuration source is polled by the refresh loop; whatever it returns
//! under the pool namespace is packaged into a [`ConfigChangeEvent`] and handed
//! to every registered [`ConfigChangeListener`].

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::PoolConfig;
use crate::error::{ConfigError, SourceError};
use crate::properties::bind_pool_configs;

/// External property store the refresh loop reads from.
///
/// `fetch` is called on the refresh thread and may block; it returns the
/// complete property set, not just the pool namespace.
pub trait ConfigSource: Send + Sync + fmt::Debug {
    /// Human readable name used in logs.
    fn name(&self) -> &str;

    fn fetch(&self) -> Result<BTreeMap<String, String>, SourceError>;
}

/// Receives a change event on every successful refresh tick.
pub trait ConfigChangeListener: Send + Sync {
    fn on_change(&self, event: &ConfigChangeEvent);
}

impl<F> ConfigChangeListener for F
where
    F: Fn(&ConfigChangeEvent) + Send + Sync,
{
    fn on_change(&self, event: &ConfigChangeEvent) {
        self(event)
    }
}

/// Properties under one namespace, captured by a single refresh tick.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    pub id: Uuid,
    pub namespace: String,
    pub properties: BTreeMap<String, String>,
}

impl ConfigChangeEvent {
    pub fn new(namespace: impl Into<String>, properties: BTreeMap<String, String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            namespace: namespace.into(),
            properties,
        }
    }

    /// Binds the carried properties into pool configurations.
    pub fn pool_configs(&self) -> Result<Vec<PoolConfig>, ConfigError> {
        bind_pool_configs(&self.namespace, &self.properties)
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
