use std::sync::Arc;

use parley_db::Database;
use parley_gateway::Hub;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    pub hub: Hub,
}
