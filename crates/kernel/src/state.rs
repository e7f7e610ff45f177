use std::sync::Arc;

use folio_authz::Authenticator;
use folio_db::Database;

use crate::settings::Settings;

/// State shared by every request handler
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub db: Database,
    pub authenticator: Arc<dyn Authenticator>,
}

impl AppState {
    pub fn new(settings: Settings, db: Database, authenticator: Arc<dyn Authenticator>) -> Self {
        Self {
            settings: Arc::new(settings),
            db,
            authenticator,
        }
    }
}
