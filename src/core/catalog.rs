use chrono::{DateTime, Duration, Utc};

use crate::api::Model;

/// Age after which a cached catalog is considered stale (2 days).
pub const REFRESH_THRESHOLD_MS: i64 = 2 * 24 * 60 * 60 * 1000;

pub fn refresh_threshold() -> Duration {
    Duration::milliseconds(REFRESH_THRESHOLD_MS)
}

/// The cached model list together with the time it was fetched.
///
/// A catalog is only ever replaced as a whole; see [`Catalog::replace`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Catalog {
    models: Vec<Model>,
    last_fetched: Option<DateTime<Utc>>,
}

impl Catalog {
    pub fn new(models: Vec<Model>, last_fetched: Option<DateTime<Utc>>) -> Self {
        Self {
            models,
            last_fetched,
        }
    }

    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn last_fetched(&self) -> Option<DateTime<Utc>> {
        self.last_fetched
    }

    pub fn replace(&mut self, models: Vec<Model>, fetched_at: DateTime<Utc>) {
        self.models = models;
        self.last_fetched = Some(fetched_at);
    }

    /// Forget the fetch time so the next freshness check reports stale.
    pub fn invalidate(&mut self) {
        self.last_fetched = None;
    }

    pub fn should_refresh(&self, now: DateTime<Utc>) -> bool {
        should_refresh(self.last_fetched, now)
    }
}

/// True when the catalog was never fetched or is older than
/// [`refresh_threshold`]. Exactly at the threshold it is still fresh.
pub fn should_refresh(last_fetched: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_fetched {
        None => true,
        Some(fetched) => now.signed_duration_since(fetched) > refresh_threshold(),
    }
}
