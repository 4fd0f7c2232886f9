use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::history::db::HistoryStore;

pub type SharedState = Arc<DashboardState>;

/// State shared by every dashboard handler.
pub struct DashboardState {
    pub store: Arc<HistoryStore>,
    pub started_at: DateTime<Utc>,
}

impl DashboardState {
    pub fn new(store: Arc<HistoryStore>) -> Self {
        Self {
            store,
            started_at: Utc::now(),
        }
    }

    pub fn shared(store: Arc<HistoryStore>) -> SharedState {
        Arc::new(Self::new(store))
    }
}
