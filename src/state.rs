use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::mirror::ReportMirror;
use crate::db::Store;
use crate::risk::RiskModel;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Store>,
    pub model: Arc<RiskModel>,
    pub mirror: Arc<ReportMirror>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Store, model: RiskModel, mirror: ReportMirror, config: AppConfig) -> Self {
        Self {
            store: Arc::new(store),
            model: Arc::new(model),
            mirror: Arc::new(mirror),
            config: Arc::new(config),
        }
    }
}
