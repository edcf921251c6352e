//! Shared application state.

use khata_db::Database;

use crate::auth::JwtVerifier;

/// State shared by every handler. Cheap to clone: the database is a pool
/// handle and the verifier is a small secret wrapper.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub verifier: JwtVerifier,
}

impl AppState {
    /// Creates the shared state.
    pub fn new(db: Database, verifier: JwtVerifier) -> Self {
        AppState { db, verifier }
    }
}
