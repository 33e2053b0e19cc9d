//! Single-slot transient status message with kind-specific expiry.

use std::{
    sync::{Arc, Mutex, MutexGuard, Weak},
    time::Duration,
};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::{runtime::Handle, task::JoinHandle};
use tracing::debug;

pub const SUCCESS_MESSAGE_TTL: Duration = Duration::from_millis(3000);
pub const ERROR_MESSAGE_TTL: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageTtl {
    pub success: Duration,
    pub error: Duration,
}

impl Default for MessageTtl {
    fn default() -> Self {
        Self {
            success: SUCCESS_MESSAGE_TTL,
            error: ERROR_MESSAGE_TTL,
        }
    }
}

impl MessageTtl {
    fn for_kind(&self, kind: StatusKind) -> Duration {
        match kind {
            StatusKind::Success => self.success,
            StatusKind::Error => self.error,
        }
    }
}

#[derive(Default)]
struct Slot {
    message: Option<StatusMessage>,
    // Bumped on every set/clear; an expiry timer only clears its own generation.
    generation: u64,
    expiry: Option<JoinHandle<()>>,
}

#[derive(Clone, Default)]
pub struct MessageCenter {
    slot: Arc<Mutex<Slot>>,
    ttl: MessageTtl,
}

impl MessageCenter {
    pub fn new(ttl: MessageTtl) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot::default())),
            ttl,
        }
    }

    pub fn set_success(&self, text: impl Into<String>) {
        self.set(StatusKind::Success, text.into());
    }

    pub fn set_error(&self, text: impl Into<String>) {
        self.set(StatusKind::Error, text.into());
    }

    pub fn clear(&self) {
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        if let Some(expiry) = slot.expiry.take() {
            expiry.abort();
        }
        slot.message = None;
    }

    pub fn current(&self) -> Option<StatusMessage> {
        lock(&self.slot).message.clone()
    }

    fn set(&self, kind: StatusKind, text: String) {
        let ttl = self.ttl.for_kind(kind);
        let mut slot = lock(&self.slot);
        slot.generation += 1;
        if let Some(expiry) = slot.expiry.take() {
            expiry.abort();
        }
        debug!(?kind, %text, "message: set");
        slot.message = Some(StatusMessage {
            kind,
            text,
            created_at: Utc::now(),
        });

        // Without a runtime the message simply stays until superseded.
        let Ok(runtime) = Handle::try_current() else {
            debug!("message: no runtime available, expiry not scheduled");
            return;
        };
        let generation = slot.generation;
        let weak = Arc::downgrade(&self.slot);
        slot.expiry = Some(runtime.spawn(expire_after(weak, generation, ttl)));
    }
}

async fn expire_after(slot: Weak<Mutex<Slot>>, generation: u64, ttl: Duration) {
    tokio::time::sleep(ttl).await;
    let Some(slot) = slot.upgrade() else {
        return;
    };
    let mut slot = lock(&slot);
    if slot.generation != generation {
        return;
    }
    debug!(generation, "message: expired");
    slot.message = None;
    slot.expiry = None;
}

fn lock(slot: &Mutex<Slot>) -> MutexGuard<'_, Slot> {
    slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
#[path = "tests/message_center_tests.rs"]
mod tests;
