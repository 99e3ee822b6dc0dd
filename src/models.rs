/// Data Models Module
///
/// This module defines the core data structures used throughout the application.
/// Source records mirror the JSON files on disk; the row types mirror the five
/// tables of the star schema.
use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

/// One song-metadata file: a song and the artist who performs it
#[derive(Debug, Clone, Deserialize)]
pub struct SongFileRecord {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub artist_name: String,
    pub artist_location: Option<String>,
    pub artist_latitude: Option<f64>,
    pub artist_longitude: Option<f64>,
    pub year: i32,
    pub duration: f64,
}

/// One line of an event log, as written by the application
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEvent {
    #[serde(default, deserialize_with = "string_or_number")]
    pub user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Option<String>,
    pub ts: Option<i64>,
    pub page: Option<String>,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    pub session_id: Option<i64>,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// A `NextSong` event with the fields every play needs
#[derive(Debug, Clone, PartialEq)]
pub struct PlayEvent {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Level,
    pub ts: i64,
    pub song: Option<String>,
    pub artist: Option<String>,
    pub length: Option<f64>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Subscription level of a user
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Free,
    Paid,
}

impl Level {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Row of the `songs` table
#[derive(Debug, Clone, PartialEq)]
pub struct Song {
    pub song_id: String,
    pub title: String,
    pub artist_id: String,
    pub year: i32,
    pub duration: f64,
}

/// Row of the `artists` table
#[derive(Debug, Clone, PartialEq)]
pub struct Artist {
    pub artist_id: String,
    pub name: String,
    pub location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// Row of the `users` table
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub user_id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub gender: Option<String>,
    pub level: Level,
}

/// Row of the `time` table
#[derive(Debug, Clone, PartialEq)]
pub struct TimeRow {
    pub start_time: NaiveDateTime,
    pub hour: i32,
    pub day: i32,
    pub week: i32,
    pub month: i32,
    pub year: i32,
    /// Monday = 0
    pub weekday: i32,
}

/// Row of the `songplays` fact table (the surrogate key is assigned by the store)
#[derive(Debug, Clone, PartialEq)]
pub struct SongPlay {
    pub start_time: NaiveDateTime,
    pub user_id: String,
    pub level: Level,
    pub song_id: Option<String>,
    pub artist_id: Option<String>,
    pub session_id: i64,
    pub location: Option<String>,
    pub user_agent: Option<String>,
}

/// Natural key used to resolve a play to a known song and artist
#[derive(Debug, Clone, Copy)]
pub struct SongKey<'a> {
    pub title: &'a str,
    pub artist_name: &'a str,
    pub duration: f64,
}

/// Result of a successful natural-key lookup
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct SongMatch {
    pub song_id: String,
    pub artist_id: String,
}

/// Accept `"7"`, `7` or `null` for identifiers the logs write inconsistently
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(serde::de::Error::custom(format!("expected string or number, found {}", other))),
    }
}
