//! Configuration loading and representation.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;

use kardex_catalog::Product;
use kardex_core::{Entity, ProductId, TenantId};
use kardex_inventory::CostingMethod;
use kardex_observability::LoggingConfig;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct KardexConfig {
    pub engine: EngineConfig,
    pub costing: CostingPolicy,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How long a record call waits for the product's section.
    pub lock_timeout_ms: u64,
    /// Reload-and-recompute attempts after a sequence conflict.
    pub max_conflict_retries: u32,
    /// Rows fetched per store read while iterating history.
    pub history_page_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 2_000,
            max_conflict_retries: 3,
            history_page_size: 256,
        }
    }
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }
}

/// Which costing method a new ledger starts with.
///
/// A product override wins over a tenant override, which wins over the
/// default. Once a ledger has rows, its first row's method is authoritative.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CostingPolicy {
    pub default_method: CostingMethod,
    pub tenants: HashMap<TenantId, CostingMethod>,
    pub products: HashMap<ProductId, CostingMethod>,
}

impl CostingPolicy {
    pub fn uniform(method: CostingMethod) -> Self {
        Self {
            default_method: method,
            ..Self::default()
        }
    }

    pub fn method_for(&self, product: &Product) -> CostingMethod {
        self.products
            .get(product.id())
            .or_else(|| self.tenants.get(&product.tenant_id()))
            .copied()
            .unwrap_or(self.default_method)
    }
}

impl KardexConfig {
    /// Defaults, then the optional TOML file, then `KARDEX__*` environment
    /// variables (`KARDEX__ENGINE__LOCK_TIMEOUT_MS=500`).
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml));
        }
        builder
            .add_source(
                Environment::with_prefix("KARDEX")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// Parse TOML text alone, without consulting the environment.
    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use kardex_catalog::NewProduct;

    fn product(tenant_id: TenantId) -> Product {
        Product::create(
            ProductId::new(),
            NewProduct {
                tenant_id,
                title: "Cemento Sol".to_string(),
                description: None,
                unit_of_measurement: "bag".to_string(),
                material_type: "cement".to_string(),
            },
            Utc::now(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn empty_document_yields_defaults() {
        let config = KardexConfig::from_toml_str("").unwrap();
        assert_eq!(config, KardexConfig::default());
        assert_eq!(config.engine.lock_timeout(), Duration::from_secs(2));
        assert_eq!(config.engine.max_conflict_retries, 3);
        assert_eq!(config.costing.default_method, CostingMethod::WeightedAverage);
        assert!(config.logging.json);
    }

    #[test]
    fn parses_engine_and_logging_sections() {
        let config = KardexConfig::from_toml_str(
            r#"
            [engine]
            lock_timeout_ms = 250
            history_page_size = 16

            [costing]
            default_method = "fifo"

            [logging]
            level = "debug"
            json = false
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.lock_timeout_ms, 250);
        assert_eq!(config.engine.max_conflict_retries, 3);
        assert_eq!(config.engine.history_page_size, 16);
        assert_eq!(config.costing.default_method, CostingMethod::Fifo);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn product_override_beats_tenant_override() {
        let tenant_id = TenantId::new();
        let overridden = product(tenant_id);
        let sibling = product(tenant_id);
        let stranger = product(TenantId::new());

        let mut policy = CostingPolicy::uniform(CostingMethod::WeightedAverage);
        policy.tenants.insert(tenant_id, CostingMethod::Fifo);
        policy
            .products
            .insert(*overridden.id(), CostingMethod::WeightedAverage);

        assert_eq!(policy.method_for(&overridden), CostingMethod::WeightedAverage);
        assert_eq!(policy.method_for(&sibling), CostingMethod::Fifo);
        assert_eq!(policy.method_for(&stranger), CostingMethod::WeightedAverage);
    }

    #[test]
    fn rejects_unknown_method() {
        let err = KardexConfig::from_toml_str("[costing]\ndefault_method = \"lifo\"\n");
        assert!(err.is_err());
    }
}
