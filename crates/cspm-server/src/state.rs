use chrono::{DateTime, Utc};
use cspm_storage::InventoryStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<InventoryStore>,
    pub start_time: DateTime<Utc>,
}
