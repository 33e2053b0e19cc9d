use std::{
    collections::HashSet,
    sync::{Mutex, MutexGuard},
    time::Duration,
};

use async_trait::async_trait;
use shared::{
    domain::AppliedDiscount,
    error::{ErrorCode, HostException},
    protocol::{DiscountCodeChange, DiscountCodeChangeResult},
};
use tokio::sync::broadcast;
use tracing::debug;

/// The checkout runtime that owns the authoritative discount-code list.
///
/// `discount_codes` is a live read: callers must re-read it before every
/// decision instead of holding on to a previous snapshot.
#[async_trait]
pub trait CheckoutHost: Send + Sync {
    fn discount_codes(&self) -> Vec<AppliedDiscount>;
    async fn apply_discount_code_change(
        &self,
        change: DiscountCodeChange,
    ) -> anyhow::Result<DiscountCodeChangeResult>;
    fn subscribe_changes(&self) -> broadcast::Receiver<Vec<AppliedDiscount>>;
}

struct HostState {
    codes: Vec<AppliedDiscount>,
    rejected: HashSet<String>,
    unavailable: HashSet<String>,
    calls: Vec<DiscountCodeChange>,
}

impl HostState {
    fn change(&mut self, change: &DiscountCodeChange) -> Result<(), HostException> {
        match change {
            DiscountCodeChange::AddDiscountCode { code } => {
                if self.rejected.contains(code) {
                    return Err(HostException::new(
                        ErrorCode::InvalidCode,
                        format!("discount code {code} cannot be applied to this cart"),
                    ));
                }
                if !self.codes.iter().any(|applied| &applied.code == code) {
                    self.codes.push(AppliedDiscount::new(code.clone()));
                }
                Ok(())
            }
            DiscountCodeChange::RemoveDiscountCode { code } => {
                let before = self.codes.len();
                self.codes.retain(|applied| &applied.code != code);
                if self.codes.len() == before {
                    return Err(HostException::new(
                        ErrorCode::NotFound,
                        format!("discount code {code} is not applied"),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Simulated checkout host for demos and tests.
pub struct InMemoryCheckoutHost {
    state: Mutex<HostState>,
    latency: Duration,
    changes: broadcast::Sender<Vec<AppliedDiscount>>,
}

impl Default for InMemoryCheckoutHost {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCheckoutHost {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(HostState {
                codes: Vec::new(),
                rejected: HashSet::new(),
                unavailable: HashSet::new(),
                calls: Vec::new(),
            }),
            latency: Duration::ZERO,
            changes,
        }
    }

    pub fn with_applied<I, S>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().codes = codes.into_iter().map(AppliedDiscount::new).collect();
        self
    }

    /// Codes the host refuses with a non-success result.
    pub fn with_rejected<I, S>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().rejected.extend(codes.into_iter().map(Into::into));
        self
    }

    /// Codes whose add/remove calls fail outright, as if the runtime rejected the promise.
    pub fn with_unavailable<I, S>(self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock()
            .unavailable
            .extend(codes.into_iter().map(Into::into));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Replaces the live list out-of-band, as another part of checkout would.
    pub fn set_discount_codes<I, S>(&self, codes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let snapshot = {
            let mut state = self.lock();
            state.codes = codes.into_iter().map(AppliedDiscount::new).collect();
            state.codes.clone()
        };
        let _ = self.changes.send(snapshot);
    }

    pub fn calls(&self) -> Vec<DiscountCodeChange> {
        self.lock().calls.clone()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl CheckoutHost for InMemoryCheckoutHost {
    fn discount_codes(&self) -> Vec<AppliedDiscount> {
        self.lock().codes.clone()
    }

    async fn apply_discount_code_change(
        &self,
        change: DiscountCodeChange,
    ) -> anyhow::Result<DiscountCodeChangeResult> {
        self.lock().calls.push(change.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let (result, snapshot) = {
            let mut state = self.lock();
            let code = change.code();
            if state.unavailable.contains(code) {
                return Err(HostException::new(
                    ErrorCode::Unavailable,
                    format!("checkout runtime unavailable while changing {code}"),
                )
                .into());
            }

            let result = match state.change(&change) {
                Ok(()) => DiscountCodeChangeResult::Success,
                Err(rejection) => DiscountCodeChangeResult::Error(rejection.into()),
            };
            (result, state.codes.clone())
        };

        debug!(
            action = change.action(),
            code = change.code(),
            success = result.is_success(),
            applied = snapshot.len(),
            "host: discount code change handled"
        );
        if result.is_success() {
            let _ = self.changes.send(snapshot);
        }
        Ok(result)
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<Vec<AppliedDiscount>> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
