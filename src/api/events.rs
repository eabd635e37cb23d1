//! Legacy REST read endpoint for events.
//!
//! Kept alongside the GraphQL surface for clients that only need the plain
//! listing. Unlike GraphQL, auth failures map to transport-level statuses:
//! missing cookie is 401, present-but-invalid is 403.

use axum::{extract::State, Json};
use axum_extra::extract::CookieJar;
use std::sync::Arc;

use crate::db::Event;
use crate::events;
use crate::AppState;

use super::auth::{self, TOKEN_COOKIE};
use super::error::ApiError;

/// List every event
pub async fn list_events(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Json<Vec<Event>>, ApiError> {
    let token = jar
        .get(TOKEN_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    let caller = auth::verify_token(&state.config.auth, &token)
        .ok_or_else(|| ApiError::forbidden("Forbidden"))?;

    let events = events::list_all(&state.db, Some(&caller)).await?;
    Ok(Json(events))
}
