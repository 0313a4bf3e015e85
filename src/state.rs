use std::sync::Arc;

use crate::config::Config;
use crate::notify::Notifier;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub config: Arc<Config>,
    pub notifier: Notifier,
}
