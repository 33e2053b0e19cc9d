use std::{fs, io, path::Path, sync::Arc, time::Duration};

use anyhow::{bail, Context};
use coupon_core::{
    fallback_catalog, CatalogStrategy, GraphqlCatalogSource, MessageTtl, ReconcilerConfig,
    WidgetConfig,
};
use serde::Deserialize;
use shared::domain::Coupon;
use url::Url;

pub const DEFAULT_CONFIG_PATH: &str = "checkout.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub catalog_endpoint: Option<String>,
    pub catalog_access_token: Option<String>,
    pub catalog_type: String,
    pub catalog_timeout_ms: u64,
    pub settle_delay_ms: u64,
    pub success_ttl_ms: u64,
    pub error_ttl_ms: u64,
    pub fallback: Option<Vec<Coupon>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            catalog_endpoint: None,
            catalog_access_token: None,
            catalog_type: coupon_core::catalog::DEFAULT_METAOBJECT_TYPE.into(),
            catalog_timeout_ms: 5000,
            settle_delay_ms: 500,
            success_ttl_ms: 3000,
            error_ttl_ms: 5000,
            fallback: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileSettings {
    catalog_endpoint: Option<String>,
    catalog_access_token: Option<String>,
    catalog_type: Option<String>,
    catalog_timeout_ms: Option<u64>,
    settle_delay_ms: Option<u64>,
    success_ttl_ms: Option<u64>,
    error_ttl_ms: Option<u64>,
    fallback: Option<Vec<Coupon>>,
}

/// Defaults, then `path` if it exists, then `APP__*` environment variables.
pub fn load_settings(path: &Path) -> anyhow::Result<Settings> {
    load_settings_with(path, |key| std::env::var(key).ok())
}

fn load_settings_with(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    match fs::read_to_string(path) {
        Ok(raw) => {
            let file_cfg: FileSettings = toml::from_str(&raw)
                .with_context(|| format!("invalid settings file '{}'", path.display()))?;
            apply_file_settings(&mut settings, file_cfg);
        }
        Err(error) if error.kind() == io::ErrorKind::NotFound => {}
        Err(error) => {
            return Err(error)
                .with_context(|| format!("failed to read settings file '{}'", path.display()))
        }
    }

    apply_env_overrides(&mut settings, lookup)?;
    Ok(settings)
}

fn apply_file_settings(settings: &mut Settings, file_cfg: FileSettings) {
    if let Some(v) = file_cfg.catalog_endpoint {
        settings.catalog_endpoint = Some(v);
    }
    if let Some(v) = file_cfg.catalog_access_token {
        settings.catalog_access_token = Some(v);
    }
    if let Some(v) = file_cfg.catalog_type {
        settings.catalog_type = v;
    }
    if let Some(v) = file_cfg.catalog_timeout_ms {
        settings.catalog_timeout_ms = v;
    }
    if let Some(v) = file_cfg.settle_delay_ms {
        settings.settle_delay_ms = v;
    }
    if let Some(v) = file_cfg.success_ttl_ms {
        settings.success_ttl_ms = v;
    }
    if let Some(v) = file_cfg.error_ttl_ms {
        settings.error_ttl_ms = v;
    }
    if let Some(v) = file_cfg.fallback {
        settings.fallback = Some(v);
    }
}

fn apply_env_overrides(
    settings: &mut Settings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("APP__CATALOG_ENDPOINT") {
        settings.catalog_endpoint = Some(v);
    }
    if let Some(v) = lookup("APP__CATALOG_ACCESS_TOKEN") {
        settings.catalog_access_token = Some(v);
    }
    if let Some(v) = lookup("APP__CATALOG_TYPE") {
        settings.catalog_type = v;
    }
    let millis = |key: &str| -> anyhow::Result<Option<u64>> {
        lookup(key)
            .map(|raw| {
                raw.trim()
                    .parse::<u64>()
                    .with_context(|| format!("{key} must be a whole number of milliseconds"))
            })
            .transpose()
    };
    if let Some(v) = millis("APP__CATALOG_TIMEOUT_MS")? {
        settings.catalog_timeout_ms = v;
    }
    if let Some(v) = millis("APP__SETTLE_DELAY_MS")? {
        settings.settle_delay_ms = v;
    }
    if let Some(v) = millis("APP__SUCCESS_TTL_MS")? {
        settings.success_ttl_ms = v;
    }
    if let Some(v) = millis("APP__ERROR_TTL_MS")? {
        settings.error_ttl_ms = v;
    }
    Ok(())
}

pub fn normalize_catalog_endpoint(raw: &str) -> anyhow::Result<String> {
    let parsed = Url::parse(raw.trim())
        .with_context(|| format!("catalog endpoint '{raw}' is not a valid url"))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        other => bail!("catalog endpoint must use http or https, got '{other}'"),
    }
}

impl Settings {
    pub fn widget_config(&self) -> WidgetConfig {
        WidgetConfig {
            reconciler: ReconcilerConfig {
                settle_delay: Duration::from_millis(self.settle_delay_ms),
            },
            message_ttl: MessageTtl {
                success: Duration::from_millis(self.success_ttl_ms),
                error: Duration::from_millis(self.error_ttl_ms),
            },
        }
    }

    pub fn catalog_strategy(&self) -> anyhow::Result<CatalogStrategy> {
        let fallback = self.fallback.clone().unwrap_or_else(fallback_catalog);
        let Some(endpoint) = self.catalog_endpoint.as_deref() else {
            return Ok(CatalogStrategy::Static(fallback));
        };

        let source = GraphqlCatalogSource::new(
            normalize_catalog_endpoint(endpoint)?,
            self.catalog_access_token.clone(),
            self.catalog_type.clone(),
            Duration::from_millis(self.catalog_timeout_ms),
        )?;
        Ok(CatalogStrategy::QueryWithFallback {
            source: Arc::new(source),
            fallback,
        })
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
