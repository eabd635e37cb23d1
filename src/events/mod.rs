//! Event access control.
//!
//! Every read and write against the events table goes through here. Each
//! operation takes the caller identity resolved by the authentication gate;
//! mutations re-read the target record and confirm ownership before touching
//! anything.

use std::collections::HashMap;

use thiserror::Error;
use uuid::Uuid;

use crate::api::auth::Caller;
use crate::api::validation::validate_event_input;
use crate::db::{serialize_artists, serialize_location, DbPool, Event, EventInput, EventRow};

#[derive(Debug, Error)]
pub enum EventError {
    /// No valid caller identity for an operation that requires one.
    #[error("Unauthorized")]
    Unauthorized,
    /// Caller is authenticated but may not touch this event. Also covers the
    /// event-not-found case so non-owners cannot probe for existence.
    #[error("Forbidden")]
    Forbidden,
    #[error("Validation failed")]
    Validation(HashMap<String, Vec<String>>),
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<EventError> for crate::api::error::ApiError {
    fn from(err: EventError) -> Self {
        use crate::api::error::ApiError;
        match err {
            EventError::Unauthorized => ApiError::unauthorized("Unauthorized"),
            EventError::Forbidden => ApiError::forbidden("Forbidden"),
            EventError::Validation(fields) => ApiError::validation(fields),
            EventError::Database(e) => ApiError::from(e),
        }
    }
}

fn require_caller(caller: Option<&Caller>) -> Result<&Caller, EventError> {
    caller.ok_or(EventError::Unauthorized)
}

/// List every event, irrespective of owner. Requires an authenticated caller.
pub async fn list_all(pool: &DbPool, caller: Option<&Caller>) -> Result<Vec<Event>, EventError> {
    require_caller(caller)?;

    let rows: Vec<EventRow> = sqlx::query_as("SELECT * FROM events")
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Event::from).collect())
}

/// List only the caller's own events.
pub async fn list_mine(pool: &DbPool, caller: Option<&Caller>) -> Result<Vec<Event>, EventError> {
    let caller = require_caller(caller)?;

    let rows: Vec<EventRow> = sqlx::query_as("SELECT * FROM events WHERE created_by = ?")
        .bind(&caller.user_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(Event::from).collect())
}

/// Create an event owned by the caller. Validation runs strictly before the
/// insert; a rejected input writes nothing.
pub async fn create(
    pool: &DbPool,
    caller: Option<&Caller>,
    input: EventInput,
) -> Result<Event, EventError> {
    let caller = require_caller(caller)?;

    validate_event_input(&input).map_err(EventError::Validation)?;

    let event = Event {
        id: Uuid::new_v4().to_string(),
        name: input.name,
        date_from: input.date_from,
        date_to: input.date_to,
        location: input.location,
        artists: input.artists,
        created_by: caller.user_id.clone(),
    };

    sqlx::query(
        r#"
        INSERT INTO events (id, name, date_from, date_to, location, artists, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&event.id)
    .bind(&event.name)
    .bind(&event.date_from)
    .bind(&event.date_to)
    .bind(serialize_location(&event.location))
    .bind(serialize_artists(&event.artists))
    .bind(&event.created_by)
    .execute(pool)
    .await?;

    Ok(event)
}

/// Replace all mutable fields of an event the caller owns. Ownership cannot
/// change: `created_by` is forced back to the caller on every update.
pub async fn update(
    pool: &DbPool,
    caller: Option<&Caller>,
    event_id: &str,
    input: EventInput,
) -> Result<Event, EventError> {
    let caller = require_caller(caller)?;

    read_owned(pool, caller, event_id).await?;

    validate_event_input(&input).map_err(EventError::Validation)?;

    let event = Event {
        id: event_id.to_string(),
        name: input.name,
        date_from: input.date_from,
        date_to: input.date_to,
        location: input.location,
        artists: input.artists,
        created_by: caller.user_id.clone(),
    };

    sqlx::query(
        r#"
        UPDATE events SET
            name = ?,
            date_from = ?,
            date_to = ?,
            location = ?,
            artists = ?,
            created_by = ?
        WHERE id = ?
        "#,
    )
    .bind(&event.name)
    .bind(&event.date_from)
    .bind(&event.date_to)
    .bind(serialize_location(&event.location))
    .bind(serialize_artists(&event.artists))
    .bind(&event.created_by)
    .bind(event_id)
    .execute(pool)
    .await?;

    Ok(event)
}

/// Delete an event the caller owns. Returns true on success.
pub async fn delete(
    pool: &DbPool,
    caller: Option<&Caller>,
    event_id: &str,
) -> Result<bool, EventError> {
    let caller = require_caller(caller)?;

    read_owned(pool, caller, event_id).await?;

    sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(event_id)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Re-read the target record and confirm the caller owns it. Missing record
/// and foreign record produce the same Forbidden.
async fn read_owned(pool: &DbPool, caller: &Caller, event_id: &str) -> Result<EventRow, EventError> {
    let existing: Option<EventRow> = sqlx::query_as("SELECT * FROM events WHERE id = ?")
        .bind(event_id)
        .fetch_optional(pool)
        .await?;

    match existing {
        Some(row) if row.created_by == caller.user_id => Ok(row),
        _ => Err(EventError::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Artist;
    use sqlx::sqlite::SqlitePoolOptions;

    fn caller(id: &str) -> Caller {
        Caller {
            user_id: id.to_string(),
            email: format!("{}@example.com", id),
        }
    }

    fn test_input() -> EventInput {
        EventInput {
            name: "Test Festival 2025".to_string(),
            date_from: "20250717".to_string(),
            date_to: "20250720".to_string(),
            location: vec![46.2276, 7.3606],
            artists: vec![Artist {
                id: None,
                name: "Test Artist".to_string(),
                href: None,
                image_url: None,
            }],
        }
    }

    /// Pool with no schema at all: any store access would surface as a
    /// Database error, so getting Unauthorized proves the store was never
    /// touched.
    async fn schemaless_pool() -> DbPool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unauthenticated_fails_before_store_access() {
        let pool = schemaless_pool().await;

        assert!(matches!(
            list_all(&pool, None).await,
            Err(EventError::Unauthorized)
        ));
        assert!(matches!(
            list_mine(&pool, None).await,
            Err(EventError::Unauthorized)
        ));
        assert!(matches!(
            create(&pool, None, test_input()).await,
            Err(EventError::Unauthorized)
        ));
        assert!(matches!(
            update(&pool, None, "some-id", test_input()).await,
            Err(EventError::Unauthorized)
        ));
        assert!(matches!(
            delete(&pool, None, "some-id").await,
            Err(EventError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_create_assigns_id_and_owner() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let event = create(&pool, Some(&u1), test_input()).await.unwrap();

        assert!(!event.id.is_empty());
        assert_eq!(event.created_by, "u1");
        assert_eq!(event.name, "Test Festival 2025");
    }

    #[tokio::test]
    async fn test_create_round_trip_via_list_mine() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let created = create(&pool, Some(&u1), test_input()).await.unwrap();

        let mine = list_mine(&pool, Some(&u1)).await.unwrap();
        assert_eq!(mine.len(), 1);
        let fetched = &mine[0];
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.name, "Test Festival 2025");
        assert_eq!(fetched.date_from, "20250717");
        assert_eq!(fetched.date_to, "20250720");
        assert_eq!(fetched.location, vec![46.2276, 7.3606]);
        assert_eq!(fetched.artists.len(), 1);
        assert_eq!(fetched.artists[0].name, "Test Artist");
        assert_eq!(fetched.created_by, "u1");
    }

    #[tokio::test]
    async fn test_create_validation_runs_before_persistence() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let mut input = test_input();
        input.location = vec![46.2276];
        let err = create(&pool, Some(&u1), input).await.unwrap_err();
        assert!(matches!(err, EventError::Validation(ref e) if e.contains_key("location")));

        // Nothing was written
        assert!(list_all(&pool, Some(&u1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_mine_filters_and_list_all_does_not() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");
        let u2 = caller("u2");

        create(&pool, Some(&u1), test_input()).await.unwrap();
        create(&pool, Some(&u1), test_input()).await.unwrap();
        create(&pool, Some(&u2), test_input()).await.unwrap();

        let mine = list_mine(&pool, Some(&u1)).await.unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|e| e.created_by == "u1"));

        let all = list_all(&pool, Some(&u1)).await.unwrap();
        assert_eq!(all.len(), 3);
    }

    #[tokio::test]
    async fn test_update_by_owner_replaces_fields() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let created = create(&pool, Some(&u1), test_input()).await.unwrap();

        let mut input = test_input();
        input.name = "Renamed Festival".to_string();
        input.artists.clear();
        let updated = update(&pool, Some(&u1), &created.id, input).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.name, "Renamed Festival");
        assert_eq!(updated.created_by, "u1");

        let mine = list_mine(&pool, Some(&u1)).await.unwrap();
        assert_eq!(mine[0].name, "Renamed Festival");
        assert!(mine[0].artists.is_empty());
    }

    #[tokio::test]
    async fn test_update_by_non_owner_is_forbidden_and_writes_nothing() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");
        let u2 = caller("u2");

        let created = create(&pool, Some(&u1), test_input()).await.unwrap();

        let mut input = test_input();
        input.name = "Hijacked".to_string();
        let err = update(&pool, Some(&u2), &created.id, input).await.unwrap_err();
        assert!(matches!(err, EventError::Forbidden));

        let mine = list_mine(&pool, Some(&u1)).await.unwrap();
        assert_eq!(mine[0].name, "Test Festival 2025");
    }

    #[tokio::test]
    async fn test_update_missing_event_is_forbidden() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let err = update(&pool, Some(&u1), "does-not-exist", test_input())
            .await
            .unwrap_err();
        assert!(matches!(err, EventError::Forbidden));
    }

    #[tokio::test]
    async fn test_delete_by_owner() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");

        let created = create(&pool, Some(&u1), test_input()).await.unwrap();
        assert!(delete(&pool, Some(&u1), &created.id).await.unwrap());
        assert!(list_all(&pool, Some(&u1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_non_owner_and_missing_collapse_to_forbidden() {
        let pool = crate::db::init_test().await;
        let u1 = caller("u1");
        let u2 = caller("u2");

        let created = create(&pool, Some(&u1), test_input()).await.unwrap();

        let err = delete(&pool, Some(&u2), &created.id).await.unwrap_err();
        assert!(matches!(err, EventError::Forbidden));

        let err = delete(&pool, Some(&u2), "does-not-exist").await.unwrap_err();
        assert!(matches!(err, EventError::Forbidden));

        // Still there
        assert_eq!(list_all(&pool, Some(&u1)).await.unwrap().len(), 1);
    }
}
