pub mod api;
pub mod config;
pub mod db;
pub mod events;
pub mod graphql;
pub mod spotify;

pub use db::DbPool;

use config::Config;
use graphql::AppSchema;
use spotify::SpotifyClient;
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub db: DbPool,
    pub spotify: Arc<SpotifyClient>,
    pub schema: AppSchema,
}

impl AppState {
    pub fn new(config: Config, db: DbPool) -> Self {
        let spotify = Arc::new(SpotifyClient::new(config.spotify.clone()));
        let schema = graphql::build_schema(db.clone(), spotify.clone());
        Self {
            config,
            db,
            spotify,
            schema,
        }
    }
}
