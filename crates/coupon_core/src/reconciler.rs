//! Single-active-discount reconciliation against the host's add/remove primitives.

use std::{sync::Arc, time::Duration};

use checkout_host::CheckoutHost;
use shared::{
    domain::AppliedDiscount,
    protocol::{DiscountCodeChange, DiscountCodeChangeResult},
};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{
    message_center::MessageCenter,
    operation_state::{remove_key, OperationStateTracker},
};

/// Wait after removals so the host's discount state can settle before the add.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerConfig {
    pub settle_delay: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("host rejected {action} of {code}: {message}")]
    HostRejected {
        action: &'static str,
        code: String,
        message: String,
    },
    #[error("host call failed during {action} of {code}: {source}")]
    HostUnavailable {
        action: &'static str,
        code: String,
        #[source]
        source: anyhow::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalFailure {
    pub code: String,
    pub reason: String,
}

/// Result of removing every active code before an apply. Failures never
/// stop the sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovalReport {
    pub removed: Vec<String>,
    pub failed: Vec<RemovalFailure>,
}

impl RemovalReport {
    fn attempted(&self, code: &str) -> bool {
        self.removed.iter().any(|removed| removed == code)
            || self.failed.iter().any(|failure| failure.code == code)
    }

    fn record(mut self, code: String, result: Result<(), ReconcileError>) -> Self {
        match result {
            Ok(()) => self.removed.push(code),
            Err(error) => self.failed.push(RemovalFailure {
                code,
                reason: error.to_string(),
            }),
        }
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackOutcome {
    NotNeeded,
    Restored(String),
    Failed { code: String, reason: String },
}

#[derive(Debug)]
pub enum ApplyOutcome {
    Applied {
        removals: RemovalReport,
    },
    AlreadyApplied,
    /// Another operation was in flight; nothing was touched.
    Busy,
    Failed {
        error: ReconcileError,
        removals: RemovalReport,
        rollback: RollbackOutcome,
    },
}

#[derive(Debug)]
pub enum RemoveOutcome {
    Removed,
    Busy,
    Failed(ReconcileError),
}

pub fn already_applied_message(code: &str) -> String {
    format!("Coupon \"{code}\" is already applied!")
}

pub fn applied_message(code: &str) -> String {
    format!("Coupon \"{code}\" applied successfully!")
}

pub fn apply_failed_message(code: &str, error: &ReconcileError) -> String {
    match error {
        ReconcileError::HostRejected { .. } => format!(
            "Failed to apply coupon \"{code}\". Please check if the code is valid or if your order meets the requirements."
        ),
        ReconcileError::HostUnavailable { .. } => {
            format!("Error applying coupon \"{code}\". Please try again.")
        }
    }
}

pub fn removed_message(code: &str) -> String {
    format!("Coupon \"{code}\" removed successfully!")
}

pub fn remove_failed_message(code: &str) -> String {
    format!("Error removing coupon \"{code}\".")
}

pub struct DiscountReconciler {
    host: Arc<dyn CheckoutHost>,
    operations: OperationStateTracker,
    messages: MessageCenter,
    config: ReconcilerConfig,
}

impl DiscountReconciler {
    pub fn new(
        host: Arc<dyn CheckoutHost>,
        operations: OperationStateTracker,
        messages: MessageCenter,
        config: ReconcilerConfig,
    ) -> Self {
        Self {
            host,
            operations,
            messages,
            config,
        }
    }

    /// Applies `code` as the only active discount.
    ///
    /// Existing codes are removed one at a time, then `code` is added. If the
    /// add fails, the first previously active code is re-added (best effort)
    /// and an error message is reported.
    pub async fn apply(&self, code: &str) -> ApplyOutcome {
        let Some(_operation) = self.operations.try_begin_exclusive(code) else {
            debug!(code, "reconcile: apply refused, another operation is in flight");
            return ApplyOutcome::Busy;
        };
        self.messages.clear();

        let original = self.host.discount_codes();
        if original.iter().any(|applied| applied.code == code) {
            info!(code, "reconcile: coupon already applied");
            self.messages.set_error(already_applied_message(code));
            return ApplyOutcome::AlreadyApplied;
        }

        let removals = if original.is_empty() {
            RemovalReport::default()
        } else {
            info!(code, active = original.len(), "reconcile: removing active discount codes");
            let report = self.remove_active_codes().await;
            tokio::time::sleep(self.config.settle_delay).await;
            report
        };

        match self.request(DiscountCodeChange::add(code)).await {
            Ok(()) => {
                info!(
                    code,
                    removed = removals.removed.len(),
                    "reconcile: coupon applied"
                );
                self.messages.set_success(applied_message(code));
                ApplyOutcome::Applied { removals }
            }
            Err(error) => {
                warn!(code, %error, "reconcile: apply failed, rolling back");
                let rollback = self.restore_previous(&original).await;
                self.messages.set_error(apply_failed_message(code, &error));
                ApplyOutcome::Failed {
                    error,
                    removals,
                    rollback,
                }
            }
        }
    }

    /// Removes a single applied code. A failed removal leaves it applied.
    pub async fn remove(&self, code: &str) -> RemoveOutcome {
        let Some(_operation) = self.operations.try_begin_exclusive(&remove_key(code)) else {
            debug!(code, "reconcile: remove refused, another operation is in flight");
            return RemoveOutcome::Busy;
        };

        match self.request(DiscountCodeChange::remove(code)).await {
            Ok(()) => {
                info!(code, "reconcile: coupon removed");
                self.messages.set_success(removed_message(code));
                RemoveOutcome::Removed
            }
            Err(error) => {
                error!(code, %error, "reconcile: remove failed");
                self.messages.set_error(remove_failed_message(code));
                RemoveOutcome::Failed(error)
            }
        }
    }

    // The live list is re-read before every removal; each code is attempted once.
    async fn remove_active_codes(&self) -> RemovalReport {
        let mut report = RemovalReport::default();
        while let Some(next) = self.next_unattempted(&report) {
            let result = self.request(DiscountCodeChange::remove(&next.code)).await;
            match &result {
                Ok(()) => debug!(code = %next.code, "reconcile: removed discount code"),
                Err(error) => {
                    warn!(code = %next.code, %error, "reconcile: removal failed, continuing")
                }
            }
            report = report.record(next.code, result);
        }
        report
    }

    fn next_unattempted(&self, report: &RemovalReport) -> Option<AppliedDiscount> {
        self.host
            .discount_codes()
            .into_iter()
            .find(|applied| !report.attempted(&applied.code))
    }

    async fn restore_previous(&self, original: &[AppliedDiscount]) -> RollbackOutcome {
        // Only the first previously active code is restored.
        let Some(previous) = original.first().filter(|applied| !applied.code.is_empty()) else {
            return RollbackOutcome::NotNeeded;
        };
        match self.request(DiscountCodeChange::add(&previous.code)).await {
            Ok(()) => {
                info!(code = %previous.code, "reconcile: previous coupon restored");
                RollbackOutcome::Restored(previous.code.clone())
            }
            Err(error) => {
                error!(code = %previous.code, %error, "reconcile: rollback failed");
                RollbackOutcome::Failed {
                    code: previous.code.clone(),
                    reason: error.to_string(),
                }
            }
        }
    }

    async fn request(&self, change: DiscountCodeChange) -> Result<(), ReconcileError> {
        let action = change.action();
        let code = change.code().to_string();
        match self.host.apply_discount_code_change(change).await {
            Ok(DiscountCodeChangeResult::Success) => Ok(()),
            Ok(DiscountCodeChangeResult::Error(host_error)) => Err(ReconcileError::HostRejected {
                action,
                code,
                message: host_error.message,
            }),
            Err(source) => Err(ReconcileError::HostUnavailable {
                action,
                code,
                source,
            }),
        }
    }
}

#[cfg(test)]
#[path = "tests/reconciler_tests.rs"]
mod tests;
