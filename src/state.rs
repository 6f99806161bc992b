use std::sync::Arc;

use crate::config::Config;
use crate::services::notifier::Notifier;
use crate::store::LmsStore;
use axum::extract::FromRef;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LmsStore>,
    pub notifier: Arc<dyn Notifier>,
    pub config: Config,
}

impl FromRef<AppState> for Config {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}
