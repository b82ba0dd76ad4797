use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use dynpool_api::{ConfigError, RejectedPolicyKind};
use parking_lot::RwLock;

use super::{AbortPolicy, CallerRunsPolicy, DiscardOldestPolicy, DiscardPolicy, RejectedHandler};

/// Builds a fresh policy instance for one pool.
pub type PolicyFactory = Arc<dyn Fn() -> Arc<dyn RejectedHandler> + Send + Sync>;

/// Table of available rejection policies, keyed by name.
///
/// The four built-in policies are always present. Custom policies are
/// registered by name at startup and referenced from pool configurations by
/// that exact name.
pub struct PolicyRegistry {
    custom: RwLock<BTreeMap<String, PolicyFactory>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self {
            custom: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a custom policy. Built-in names and names already taken are
    /// refused and `false` is returned.
    pub fn register<F>(&self, name: impl Into<String>, factory: F) -> bool
    where
        F: Fn() -> Arc<dyn RejectedHandler> + Send + Sync + 'static,
    {
        let name = name.into();
        if !matches!(RejectedPolicyKind::from_name(&name), RejectedPolicyKind::Custom(_)) {
            return false;
        }
        let mut custom = self.custom.write();
        if custom.contains_key(&name) {
            return false;
        }
        custom.insert(name.clone(), Arc::new(factory));
        tracing::debug!(policy = %name, "Registered rejection policy");
        true
    }

    pub fn contains(&self, kind: &RejectedPolicyKind) -> bool {
        match kind {
            RejectedPolicyKind::Custom(name) => self.custom.read().contains_key(name),
            _ => true,
        }
    }

    /// Builds the policy a configuration names.
    pub fn resolve(&self, kind: &RejectedPolicyKind) -> Result<Arc<dyn RejectedHandler>, ConfigError> {
        let handler: Arc<dyn RejectedHandler> = match kind {
            RejectedPolicyKind::Abort => Arc::new(AbortPolicy),
            RejectedPolicyKind::Discard => Arc::new(DiscardPolicy),
            RejectedPolicyKind::DiscardOldest => Arc::new(DiscardOldestPolicy),
            RejectedPolicyKind::CallerRuns => Arc::new(CallerRunsPolicy),
            RejectedPolicyKind::Custom(name) => {
                let factory = self
                    .custom
                    .read()
                    .get(name)
                    .cloned()
                    .ok_or_else(|| ConfigError::UnknownRejectedPolicy(name.clone()))?;
                factory()
            }
        };
        Ok(handler)
    }

    /// Every resolvable policy name, built-ins first.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = [
            RejectedPolicyKind::Abort,
            RejectedPolicyKind::Discard,
            RejectedPolicyKind::DiscardOldest,
            RejectedPolicyKind::CallerRuns,
        ]
        .iter()
        .map(|kind| kind.name().to_string())
        .collect();
        names.extend(self.custom.read().keys().cloned());
        names
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_resolve() {
        let registry = PolicyRegistry::new();
        for name in ["abort", "DiscardPolicy", "discard-oldest", "CallerRunsPolicy"] {
            let kind = RejectedPolicyKind::from_name(name);
            assert!(registry.contains(&kind));
            assert_eq!(registry.resolve(&kind).unwrap().name(), kind.name());
        }
    }

    #[test]
    fn test_custom_registration() {
        let registry = PolicyRegistry::new();
        assert!(registry.register("QuietPolicy", || Arc::new(DiscardPolicy) as Arc<dyn RejectedHandler>));
        assert!(!registry.register("QuietPolicy", || Arc::new(AbortPolicy) as Arc<dyn RejectedHandler>));
        assert!(!registry.register("abort", || Arc::new(DiscardPolicy) as Arc<dyn RejectedHandler>));

        let kind = RejectedPolicyKind::from_name("QuietPolicy");
        assert!(registry.resolve(&kind).is_ok());
        assert_eq!(registry.names().last().map(String::as_str), Some("QuietPolicy"));
    }

    #[test]
    fn test_unknown_custom_is_config_error() {
        let registry = PolicyRegistry::new();
        let kind = RejectedPolicyKind::from_name("MissingPolicy");
        assert_eq!(
            registry.resolve(&kind).unwrap_err(),
            ConfigError::UnknownRejectedPolicy("MissingPolicy".to_string())
        );
    }
}
