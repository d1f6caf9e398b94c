//! Shared application state handed to every handler.

use stockyard_db::Database;

use crate::auth::JwtKeys;
use crate::guard::SubmissionGuard;

#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub jwt: JwtKeys,
    pub guard: SubmissionGuard,
}

impl AppState {
    pub fn new(db: Database, jwt: JwtKeys) -> Self {
        AppState {
            db,
            jwt,
            guard: SubmissionGuard::new(),
        }
    }
}
