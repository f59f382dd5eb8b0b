use tokio::sync::Mutex;

use crate::auth::AuthManager;
use crate::config::Config;
use crate::db::DbPool;
use crate::notifier::SmsNotifier;
use crate::recommender::MealRecommender;
use crate::sessions::SessionStore;

/// Shared application state, held behind an `Arc` by every handler.
pub struct AppContext {
    pub db_pool: DbPool,
    pub sessions: Mutex<SessionStore>,
    pub auth_manager: AuthManager,
    pub recommender: MealRecommender,
    pub notifier: SmsNotifier,
    pub config: Config,
}

impl AppContext {
    pub fn new(
        db_pool: DbPool,
        sessions: SessionStore,
        auth_manager: AuthManager,
        recommender: MealRecommender,
        notifier: SmsNotifier,
        config: Config,
    ) -> Self {
        Self {
            db_pool,
            sessions: Mutex::new(sessions),
            auth_manager,
            recommender,
            notifier,
            config,
        }
    }
}
