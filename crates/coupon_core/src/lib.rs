use std::{collections::BTreeMap, sync::Arc};

use checkout_host::CheckoutHost;
use serde::Serialize;
use shared::domain::{AppliedDiscount, Coupon};
use tokio::sync::broadcast;
use tracing::info;

pub mod catalog;
pub mod message_center;
pub mod operation_state;
pub mod reconciler;

pub use catalog::{
    fallback_catalog, CatalogError, CatalogProvider, CatalogSource, CatalogStrategy,
    GraphqlCatalogSource,
};
pub use message_center::{MessageCenter, MessageTtl, StatusKind, StatusMessage};
pub use operation_state::{remove_key, OperationGuard, OperationStateTracker};
pub use reconciler::{
    ApplyOutcome, DiscountReconciler, ReconcileError, ReconcilerConfig, RemovalReport,
    RemoveOutcome, RollbackOutcome,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WidgetConfig {
    pub reconciler: ReconcilerConfig,
    pub message_ttl: MessageTtl,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CouponView {
    #[serde(flatten)]
    pub coupon: Coupon,
    pub applied: bool,
    pub loading: bool,
    pub can_apply: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActiveDiscountView {
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub removing: bool,
}

/// Everything a renderer needs for one frame of the widget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WidgetSnapshot {
    pub catalog_loading: bool,
    pub coupons: Vec<CouponView>,
    pub active_discounts: Vec<ActiveDiscountView>,
    pub operations: BTreeMap<String, bool>,
    pub message: Option<StatusMessage>,
}

/// Presentation-facing facade over catalog, host state, busy flags and the
/// status message.
pub struct CouponWidget {
    host: Arc<dyn CheckoutHost>,
    catalog_provider: CatalogProvider,
    operations: OperationStateTracker,
    messages: MessageCenter,
    reconciler: DiscountReconciler,
}

impl CouponWidget {
    pub fn new(
        host: Arc<dyn CheckoutHost>,
        strategy: CatalogStrategy,
        config: WidgetConfig,
    ) -> Arc<Self> {
        let operations = OperationStateTracker::new();
        let messages = MessageCenter::new(config.message_ttl);
        let reconciler = DiscountReconciler::new(
            Arc::clone(&host),
            operations.clone(),
            messages.clone(),
            config.reconciler,
        );
        Arc::new(Self {
            host,
            catalog_provider: CatalogProvider::new(strategy),
            operations,
            messages,
            reconciler,
        })
    }

    /// Loads (or refreshes) the offerable coupons. Never fails.
    pub async fn load_catalog(&self) -> Vec<Coupon> {
        let coupons = self.catalog_provider.load_catalog().await;
        info!(coupons = coupons.len(), "widget: catalog ready");
        coupons
    }

    pub fn catalog(&self) -> Vec<Coupon> {
        self.catalog_provider.catalog()
    }

    pub fn is_catalog_loading(&self) -> bool {
        self.catalog_provider.is_loading()
    }

    pub fn discount_codes(&self) -> Vec<AppliedDiscount> {
        self.host.discount_codes()
    }

    pub fn subscribe_discount_changes(&self) -> broadcast::Receiver<Vec<AppliedDiscount>> {
        self.host.subscribe_changes()
    }

    pub fn is_coupon_applied(&self, code: &str) -> bool {
        self.host
            .discount_codes()
            .iter()
            .any(|applied| applied.code == code)
    }

    /// Whether the apply action should be offered for `code` right now.
    pub fn can_apply(&self, code: &str) -> bool {
        !self.is_coupon_applied(code) && !self.operations.is_any_busy()
    }

    pub fn description_for(&self, code: &str) -> Option<String> {
        self.catalog_provider
            .catalog()
            .into_iter()
            .find(|coupon| coupon.code == code)
            .map(|coupon| coupon.description)
            .filter(|description| !description.is_empty())
    }

    pub fn operation_states(&self) -> BTreeMap<String, bool> {
        self.operations.snapshot()
    }

    pub fn status_message(&self) -> Option<StatusMessage> {
        self.messages.current()
    }

    pub async fn apply(&self, code: &str) -> ApplyOutcome {
        self.reconciler.apply(code).await
    }

    pub async fn remove(&self, code: &str) -> RemoveOutcome {
        self.reconciler.remove(code).await
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        let applied = self.host.discount_codes();
        let any_busy = self.operations.is_any_busy();
        let coupons = self
            .catalog()
            .into_iter()
            .map(|coupon| {
                let is_applied = applied.iter().any(|active| active.code == coupon.code);
                CouponView {
                    applied: is_applied,
                    loading: self.operations.is_busy(&coupon.code),
                    can_apply: !is_applied && !any_busy,
                    coupon,
                }
            })
            .collect();
        let active_discounts = applied
            .into_iter()
            .map(|active| ActiveDiscountView {
                description: self.description_for(&active.code),
                removing: self.operations.is_busy(&remove_key(&active.code)),
                code: active.code,
            })
            .collect();

        WidgetSnapshot {
            catalog_loading: self.catalog_provider.is_loading(),
            coupons,
            active_discounts,
            operations: self.operations.snapshot(),
            message: self.messages.current(),
        }
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
