//! Application state management

use mongodb::Client;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: crate::config::Config,
    pub mongo_client: Client,
    /// Shared by every image upload
    pub http: reqwest::Client,
}
