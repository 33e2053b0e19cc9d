//! Coupon catalog acquisition.
//!
//! The catalog is loaded once per session (or per explicit refresh). Loading
//! never fails: acquisition problems are logged and, depending on the
//! strategy, replaced by a fixed fallback list.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::Client;
use shared::{
    domain::{Coupon, CouponKind},
    protocol::{CatalogRecord, MetaobjectsQuery, MetaobjectsResponse, MetaobjectsVariables},
};
use thiserror::Error;
use tracing::{info, warn};

pub const DEFAULT_METAOBJECT_TYPE: &str = "coupon";
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const METAOBJECT_PAGE_SIZE: u32 = 50;
const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Storefront-Access-Token";
const METAOBJECTS_QUERY: &str = "query Coupons($type: String!, $first: Int!) { \
     metaobjects(type: $type, first: $first) { nodes { fields { key value } } } }";

/// Built-in catalog shown when the live source yields nothing usable.
pub fn fallback_catalog() -> Vec<Coupon> {
    vec![
        Coupon::new(
            "FLAT400",
            "Shop any 2 eligible products at ₹699",
            CouponKind::Bundle,
        ),
        Coupon::new(
            "FLAT300",
            "Shop any 3 eligible products at ₹999",
            CouponKind::Bundle,
        ),
        Coupon::new(
            "BUY1199",
            "Shop any 4 eligible products at ₹1199",
            CouponKind::Bundle,
        ),
        Coupon::new(
            "FLAT20",
            "Get flat 20% OFF on orders above ₹499",
            CouponKind::Percentage,
        ),
    ]
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Transport(String),
    #[error("catalog source returned status {0}")]
    Status(u16),
    #[error("catalog query reported errors: {0}")]
    Query(String),
    #[error("catalog response has unexpected shape: {0}")]
    Malformed(String),
    #[error("catalog source produced no active coupons")]
    Empty,
}

/// External structured-data source of coupon records.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_records(&self) -> Result<Vec<CatalogRecord>, CatalogError>;
}

/// Metaobjects query against a GraphQL storefront endpoint.
pub struct GraphqlCatalogSource {
    http: Client,
    endpoint: String,
    access_token: Option<String>,
    metaobject_type: String,
}

impl GraphqlCatalogSource {
    pub fn new(
        endpoint: impl Into<String>,
        access_token: Option<String>,
        metaobject_type: impl Into<String>,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build catalog http client")?;
        Ok(Self {
            http,
            endpoint: endpoint.into(),
            access_token,
            metaobject_type: metaobject_type.into(),
        })
    }
}

#[async_trait]
impl CatalogSource for GraphqlCatalogSource {
    async fn fetch_records(&self) -> Result<Vec<CatalogRecord>, CatalogError> {
        let body = MetaobjectsQuery {
            query: METAOBJECTS_QUERY,
            variables: MetaobjectsVariables {
                metaobject_type: self.metaobject_type.clone(),
                first: METAOBJECT_PAGE_SIZE,
            },
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(token) = &self.access_token {
            request = request.header(ACCESS_TOKEN_HEADER, token);
        }

        let response = request
            .send()
            .await
            .map_err(|error| CatalogError::Transport(error.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        let payload: MetaobjectsResponse = response
            .json()
            .await
            .map_err(|error| CatalogError::Malformed(error.to_string()))?;

        if let Some(errors) = payload.errors.as_ref().filter(|errors| !errors.is_empty()) {
            if payload.data.is_none() {
                let joined = errors
                    .iter()
                    .map(|error| error.message.as_str())
                    .collect::<Vec<_>>()
                    .join("; ");
                return Err(CatalogError::Query(joined));
            }
            warn!(
                errors = errors.len(),
                "catalog: query returned partial data with errors"
            );
        }

        payload
            .into_records()
            .ok_or_else(|| CatalogError::Malformed("missing data.metaobjects.nodes".into()))
    }
}

/// Interprets raw records: drops empty codes and inactive entries, keeps the
/// first occurrence of each code.
pub fn coupons_from_records(records: &[CatalogRecord]) -> Vec<Coupon> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| {
            let code = record.field("code").map(str::trim).unwrap_or_default();
            if code.is_empty() {
                return None;
            }
            let active = record.field("active").map_or(true, |raw| {
                !raw.trim().eq_ignore_ascii_case("false")
            });
            if !active {
                return None;
            }
            Some(Coupon {
                code: code.to_string(),
                description: record.field("description").unwrap_or_default().to_string(),
                kind: record
                    .field("type")
                    .map(CouponKind::parse_lenient)
                    .unwrap_or_default(),
                active,
            })
        })
        .filter(|coupon| seen.insert(coupon.code.clone()))
        .collect()
}

/// Where the offerable coupons come from.
#[derive(Clone)]
pub enum CatalogStrategy {
    Static(Vec<Coupon>),
    /// Live only: any acquisition failure yields an empty catalog.
    Query(Arc<dyn CatalogSource>),
    QueryWithFallback {
        source: Arc<dyn CatalogSource>,
        fallback: Vec<Coupon>,
    },
}

impl CatalogStrategy {
    pub fn with_default_fallback(source: Arc<dyn CatalogSource>) -> Self {
        Self::QueryWithFallback {
            source,
            fallback: fallback_catalog(),
        }
    }
}

/// Holds the session's catalog. The list is stored before the loading flag
/// drops, so an observer that sees `is_loading() == false` also sees the
/// loaded coupons.
pub struct CatalogProvider {
    strategy: CatalogStrategy,
    coupons: RwLock<Vec<Coupon>>,
    loading: AtomicBool,
}

impl CatalogProvider {
    pub fn new(strategy: CatalogStrategy) -> Self {
        Self {
            strategy,
            coupons: RwLock::new(Vec::new()),
            loading: AtomicBool::new(true),
        }
    }

    /// True until the current load completes.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Acquire)
    }

    /// The most recently loaded catalog; empty before the first load.
    pub fn catalog(&self) -> Vec<Coupon> {
        self.coupons
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub async fn load_catalog(&self) -> Vec<Coupon> {
        self.loading.store(true, Ordering::Release);
        let coupons = match &self.strategy {
            CatalogStrategy::Static(coupons) => coupons.clone(),
            CatalogStrategy::Query(source) => {
                acquire(source.as_ref()).await.unwrap_or_else(|error| {
                    warn!(%error, "catalog: live acquisition failed, catalog is empty");
                    Vec::new()
                })
            }
            CatalogStrategy::QueryWithFallback { source, fallback } => {
                acquire(source.as_ref()).await.unwrap_or_else(|error| {
                    warn!(
                        %error,
                        fallback = fallback.len(),
                        "catalog: live acquisition failed, using fallback"
                    );
                    fallback.clone()
                })
            }
        };
        info!(coupons = coupons.len(), "catalog: loaded");
        *self
            .coupons
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = coupons.clone();
        self.loading.store(false, Ordering::Release);
        coupons
    }
}

async fn acquire(source: &dyn CatalogSource) -> Result<Vec<Coupon>, CatalogError> {
    let records = source.fetch_records().await?;
    let coupons = coupons_from_records(&records);
    if coupons.is_empty() {
        return Err(CatalogError::Empty);
    }
    Ok(coupons)
}

#[cfg(test)]
#[path = "tests/catalog_tests.rs"]
mod tests;
