//! Awaitable model selection driven by an external picker.
//!
//! A caller issues [`ModelSelector::select_models`] and suspends. The picker
//! front end watches [`ModelSelector::subscribe`] for the open request,
//! lets the user choose, and finishes the request with
//! [`ModelSelector::confirm_model_selection`] or
//! [`ModelSelector::close_model_selector`]. Only one request can be open at a
//! time.

use std::error::Error;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{oneshot, watch};
use tracing::debug;

/// What the caller asks the picker for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionRequest {
    pub multi_select: Option<bool>,
    pub initial_filter: Option<Vec<String>>,
    /// Give up after this long. `None` waits until confirmed or closed.
    pub timeout: Option<Duration>,
}

impl SelectionRequest {
    pub fn single() -> Self {
        Self::default()
    }

    pub fn multi() -> Self {
        Self {
            multi_select: Some(true),
            ..Self::default()
        }
    }

    pub fn with_initial_filter(mut self, ids: Vec<String>) -> Self {
        self.initial_filter = Some(ids);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Normalized configuration of the open request, as seen by the picker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionConfig {
    pub multi_select: bool,
    pub initial_filter: Vec<String>,
}

impl From<&SelectionRequest> for SelectionConfig {
    fn from(request: &SelectionRequest) -> Self {
        Self {
            multi_select: request.multi_select.unwrap_or(false),
            initial_filter: request.initial_filter.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    Single(String),
    Multi(Vec<String>),
}

impl Selection {
    pub fn ids(&self) -> Vec<&str> {
        match self {
            Selection::Single(id) => vec![id.as_str()],
            Selection::Multi(ids) => ids.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// Another selection is still waiting for the picker.
    Busy,
    /// Nobody confirmed or closed the picker in time.
    TimedOut,
}

impl fmt::Display for SelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionError::Busy => write!(f, "A model selection is already in progress"),
            SelectionError::TimedOut => write!(f, "Model selection timed out"),
        }
    }
}

impl Error for SelectionError {}

struct PendingSelection {
    id: u64,
    config: SelectionConfig,
    responder: oneshot::Sender<Option<Selection>>,
}

#[derive(Default)]
struct SelectorSlot {
    pending: Option<PendingSelection>,
    next_id: u64,
}

pub struct ModelSelector {
    slot: Mutex<SelectorSlot>,
    open: watch::Sender<Option<SelectionConfig>>,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSelector {
    pub fn new() -> Self {
        let (open, _) = watch::channel(None);
        Self {
            slot: Mutex::new(SelectorSlot::default()),
            open,
        }
    }

    /// Open the picker and wait for the outcome.
    ///
    /// Resolves to `Ok(None)` when the picker is closed or nothing was
    /// chosen in single-select mode.
    pub async fn select_models(
        &self,
        request: SelectionRequest,
    ) -> Result<Option<Selection>, SelectionError> {
        let config = SelectionConfig::from(&request);
        let (responder, receiver) = oneshot::channel();

        let id = {
            let mut slot = self.lock_slot();
            if let Some(pending) = &slot.pending {
                // A caller that stopped waiting leaves a closed responder
                // behind; that request no longer blocks new ones.
                if !pending.responder.is_closed() {
                    return Err(SelectionError::Busy);
                }
                debug!(id = pending.id, "replacing abandoned model selection");
            }
            slot.next_id += 1;
            let id = slot.next_id;
            slot.pending = Some(PendingSelection {
                id,
                config: config.clone(),
                responder,
            });
            // Published under the slot lock so observers never see a
            // transition out of order with the slot itself.
            self.open.send_replace(Some(config.clone()));
            id
        };

        debug!(id, multi_select = config.multi_select, "model selection opened");

        let outcome = match request.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, receiver).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.abandon(id);
                    return Err(SelectionError::TimedOut);
                }
            },
            None => receiver.await,
        };

        // A dropped responder means the selector itself went away.
        Ok(outcome.unwrap_or(None))
    }

    /// Finish the open request with the picker's choice. In single-select
    /// mode only the first id is used. Returns `false` when nothing was open.
    pub fn confirm_model_selection(&self, selected: Vec<String>) -> bool {
        let Some(pending) = self.take_pending() else {
            return false;
        };

        let result = if pending.config.multi_select {
            Some(Selection::Multi(selected))
        } else {
            selected.into_iter().next().map(Selection::Single)
        };
        debug!(id = pending.id, ?result, "model selection confirmed");
        let _ = pending.responder.send(result);
        true
    }

    /// Cancel the open request; the caller receives `None`. Returns `false`
    /// when nothing was open.
    pub fn close_model_selector(&self) -> bool {
        let Some(pending) = self.take_pending() else {
            return false;
        };
        debug!(id = pending.id, "model selection closed");
        let _ = pending.responder.send(None);
        true
    }

    pub fn is_open(&self) -> bool {
        self.open.borrow().is_some()
    }

    pub fn current_request(&self) -> Option<SelectionConfig> {
        self.open.borrow().clone()
    }

    /// Observe open/close transitions. The value is the open request's
    /// config, or `None` while idle.
    pub fn subscribe(&self) -> watch::Receiver<Option<SelectionConfig>> {
        self.open.subscribe()
    }

    fn take_pending(&self) -> Option<PendingSelection> {
        let mut slot = self.lock_slot();
        let pending = slot.pending.take();
        if pending.is_some() {
            self.open.send_replace(None);
        }
        pending
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.lock_slot().pending.is_some()
    }

    fn abandon(&self, id: u64) {
        let mut slot = self.lock_slot();
        if slot.pending.as_ref().is_some_and(|pending| pending.id == id) {
            slot.pending = None;
            self.open.send_replace(None);
            drop(slot);
            debug!(id, "model selection timed out");
        }
    }

    fn lock_slot(&self) -> std::sync::MutexGuard<'_, SelectorSlot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
