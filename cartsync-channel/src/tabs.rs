//! Discovery of the browser context hosting the retailer page script.

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Identifier of a browser context (tab) that may host the page script.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(pub String);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for ContextId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ContextId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

#[async_trait]
pub trait TabLocator: Send + Sync {
    /// The open context hosting the retailer page, if any.
    async fn find_counterpart_tab(&self) -> Option<ContextId>;
}

/// Tabs announced open by the browser side, in the order they were opened.
#[derive(Debug, Default)]
pub struct TabRegistry {
    open: Mutex<Vec<ContextId>>,
}

impl TabRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&self, context: ContextId) {
        let mut open = self.lock();
        if !open.contains(&context) {
            tracing::debug!(context = %context, "retailer tab opened");
            open.push(context);
        }
    }

    pub fn close(&self, context: &ContextId) {
        let mut open = self.lock();
        let before = open.len();
        open.retain(|c| c != context);
        if open.len() != before {
            tracing::debug!(context = %context, "retailer tab closed");
        }
    }

    pub fn open_tabs(&self) -> Vec<ContextId> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ContextId>> {
        self.open.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TabLocator for TabRegistry {
    async fn find_counterpart_tab(&self) -> Option<ContextId> {
        self.lock().first().cloned()
    }
}
