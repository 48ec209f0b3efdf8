use std::sync::Arc;

use hostel_db::Database;

use crate::auth::AuthService;
use crate::complaints::ComplaintService;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub auth: AuthService,
    pub complaints: ComplaintService,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, auth: AuthService, complaints: ComplaintService) -> AppState {
        Arc::new(Self {
            db,
            auth,
            complaints,
        })
    }
}
