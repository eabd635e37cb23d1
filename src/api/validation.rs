//! Input validation for API requests.
//!
//! Field-level validation functions returning per-field messages. Event
//! validation always runs before persistence; a failed check means nothing
//! was written.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;

use crate::db::{Artist, EventInput};

use super::error::ValidationErrorBuilder;

lazy_static! {
    /// Regex for validating email addresses
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

/// Validate an email address
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email is too long (max 254 characters)".to_string());
    }

    if !EMAIL_REGEX.is_match(email) {
        return Err("Invalid email address".to_string());
    }

    Ok(())
}

/// Validate a password at sign-up
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    Ok(())
}

/// Validate an event name
fn validate_event_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("Name is required".to_string());
    }

    if name.len() > 200 {
        return Err("Name is too long (max 200 characters)".to_string());
    }

    Ok(())
}

/// Validate an event date field
fn validate_event_date(date: &str, field: &str) -> Result<(), String> {
    if date.is_empty() {
        return Err(format!("{} is required", field));
    }

    Ok(())
}

/// Validate an event location: exactly two finite numbers, [lat, lon]
fn validate_location(location: &[f64]) -> Result<(), String> {
    if location.len() != 2 {
        return Err("Location must contain exactly 2 numbers".to_string());
    }

    if location.iter().any(|n| !n.is_finite()) {
        return Err("Location coordinates must be finite numbers".to_string());
    }

    Ok(())
}

/// Validate an embedded artist
fn validate_artist(artist: &Artist) -> Result<(), String> {
    if artist.name.is_empty() {
        return Err("Artist name is required".to_string());
    }

    Ok(())
}

/// Validate a full event input, collecting every field failure.
pub fn validate_event_input(input: &EventInput) -> Result<(), HashMap<String, Vec<String>>> {
    let mut errors = ValidationErrorBuilder::new();

    if let Err(e) = validate_event_name(&input.name) {
        errors.add("name", e);
    }

    if let Err(e) = validate_event_date(&input.date_from, "dateFrom") {
        errors.add("dateFrom", e);
    }

    if let Err(e) = validate_event_date(&input.date_to, "dateTo") {
        errors.add("dateTo", e);
    }

    if let Err(e) = validate_location(&input.location) {
        errors.add("location", e);
    }

    for (i, artist) in input.artists.iter().enumerate() {
        if let Err(e) = validate_artist(artist) {
            errors.add(format!("artists.{}.name", i), e);
        }
    }

    errors.finish()
}
