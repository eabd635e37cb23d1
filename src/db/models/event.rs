//! Event models and DTOs.
//!
//! `location` and `artists` live in JSON TEXT columns; the row type keeps the
//! raw strings and converts to the domain type at the edge.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// An artist embedded in an event. Never persisted on its own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Artist {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    pub id: String,
    pub name: String,
    #[serde(rename = "dateFrom")]
    pub date_from: String,
    #[serde(rename = "dateTo")]
    pub date_to: String,
    /// Always exactly two numbers: [lat, lon].
    pub location: Vec<f64>,
    #[serde(default)]
    pub artists: Vec<Artist>,
    #[serde(rename = "createdBy")]
    pub created_by: String,
}

/// Client-supplied event fields. `created_by` is deliberately absent: it is
/// always derived from the authenticated caller, never from input.
#[derive(Debug, Clone)]
pub struct EventInput {
    pub name: String,
    pub date_from: String,
    pub date_to: String,
    pub location: Vec<f64>,
    pub artists: Vec<Artist>,
}

/// Raw event row as stored in SQLite.
#[derive(Debug, Clone, FromRow)]
pub struct EventRow {
    pub id: String,
    pub name: String,
    pub date_from: String,
    pub date_to: String,
    pub location: String,
    pub artists: Option<String>,
    pub created_by: String,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            date_from: row.date_from,
            date_to: row.date_to,
            location: parse_location(&row.location),
            artists: parse_artists(row.artists.as_deref()),
            created_by: row.created_by,
        }
    }
}

/// Helper to parse a location JSON array from the database
pub fn parse_location(json: &str) -> Vec<f64> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Helper to serialize a location to JSON for the database
pub fn serialize_location(location: &[f64]) -> String {
    serde_json::to_string(location).unwrap_or_else(|_| "[]".to_string())
}

/// Helper to parse an artists JSON array from the database
pub fn parse_artists(json: Option<&str>) -> Vec<Artist> {
    json.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

/// Helper to serialize artists to JSON for the database
pub fn serialize_artists(artists: &[Artist]) -> Option<String> {
    if artists.is_empty() {
        None
    } else {
        serde_json::to_string(artists).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_round_trip() {
        let location = vec![46.2276, 7.3606];
        let json = serialize_location(&location);
        assert_eq!(parse_location(&json), location);
    }

    #[test]
    fn test_parse_location_garbage_is_empty() {
        assert!(parse_location("not json").is_empty());
    }

    #[test]
    fn test_artists_round_trip() {
        let artists = vec![Artist {
            id: Some("4Z8W4fKeB5YxbusRsdQVPb".to_string()),
            name: "Radiohead".to_string(),
            href: Some("https://open.spotify.com/artist/4Z8W4fKeB5YxbusRsdQVPb".to_string()),
            image_url: None,
        }];
        let json = serialize_artists(&artists).unwrap();
        assert_eq!(parse_artists(Some(&json)), artists);
    }

    #[test]
    fn test_serialize_artists_empty_is_none() {
        assert!(serialize_artists(&[]).is_none());
        assert_eq!(parse_artists(None), Vec::<Artist>::new());
    }
}
