//! # Properties Binding
//!
//! External configuration arrives as a flat `key -> value` map. Pool
//! definitions live under an indexed list below a namespace prefix:
//!
//! ```text
//! dynamic.thread-pool.executors[0].pool-name=io
//! dynamic.thread-pool.executors[0].core-pool-size=2
//! dynamic.thread-pool.executors[0].queue-type=synchronous
//! dynamic.thread-pool.executors[1].poolName=cpu
//! ```
//!
//! Field names bind loosely: `pool-name`, `pool_name` and `poolName` are the
//! same field. Unknown fields are ignored. Omitted fields take the defaults
//! of [`PoolConfig::default`].

use std::collections::BTreeMap;
use std::str::FromStr;

use crate::config::{normalize, PoolConfig, QueueType, TimeUnit};
use crate::error::ConfigError;

/// Namespace under which pool definitions are looked up by default.
pub const DEFAULT_NAMESPACE: &str = "dynamic.thread-pool";

const EXECUTORS: &str = "executors";

/// Keeps only the entries that belong to `namespace`, i.e. keys equal to it
/// or continuing it with `.` or `[`.
pub fn namespace_properties<'a, I>(namespace: &str, properties: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    properties
        .into_iter()
        .filter(|(key, _)| in_namespace(namespace, key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn in_namespace(namespace: &str, key: &str) -> bool {
    match key.strip_prefix(namespace) {
        Some(rest) => rest.is_empty() || rest.starts_with('.') || rest.starts_with('['),
        None => false,
    }
}

/// Binds every `<namespace>.executors[i].*` group into a `PoolConfig`,
/// ordered by index. Each config is validated; duplicate pool names are
/// rejected.
pub fn bind_pool_configs(
    namespace: &str,
    properties: &BTreeMap<String, String>,
) -> Result<Vec<PoolConfig>, ConfigError> {
    let list_prefix = format!("{namespace}.{EXECUTORS}[");
    let mut groups: BTreeMap<usize, Vec<(&str, &str, &str)>> = BTreeMap::new();

    for (key, value) in properties {
        let Some(rest) = key.strip_prefix(&list_prefix) else {
            continue;
        };
        let Some((index, field)) = rest.split_once("].") else {
            continue;
        };
        let index = index.trim().parse::<usize>().map_err(|_| ConfigError::InvalidValue {
            key: key.clone(),
            value: value.clone(),
        })?;
        groups
            .entry(index)
            .or_default()
            .push((key.as_str(), field, value.as_str()));
    }

    let mut configs: Vec<PoolConfig> = Vec::with_capacity(groups.len());
    for fields in groups.into_values() {
        let config = bind_one(&fields)?;
        config.validate()?;
        if configs.iter().any(|c| c.pool_name == config.pool_name) {
            return Err(ConfigError::DuplicatePool(config.pool_name));
        }
        configs.push(config);
    }
    Ok(configs)
}

fn bind_one(fields: &[(&str, &str, &str)]) -> Result<PoolConfig, ConfigError> {
    let mut config = PoolConfig::default();
    for &(key, field, value) in fields {
        let value = value.trim();
        match normalize(field).as_str() {
            "contact" => config.contact = (!value.is_empty()).then(|| value.to_string()),
            "poolname" => config.pool_name = value.to_string(),
            "corepoolsize" => config.core_pool_size = parse_value(key, value)?,
            "maximumpoolsize" => config.maximum_pool_size = parse_value(key, value)?,
            "keepalivetime" => config.keep_alive_time = parse_value(key, value)?,
            "timeunit" => config.time_unit = value.parse::<TimeUnit>()?,
            "capacity" => config.capacity = parse_value(key, value)?,
            "fair" => config.fair = parse_value(key, value)?,
            "queuetype" => config.queue_type = value.parse::<QueueType>()?,
            "rejectedpolicy" => config.rejected_policy = value.to_string(),
            _ => {}
        }
    }
    Ok(config)
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
