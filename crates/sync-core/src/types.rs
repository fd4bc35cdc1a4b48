//! Identifier types shared by every index-sync crate.
//!
//! `EntityType` tags an application-level entity (the thing a search document
//! or an embedded part of one is built from), `EventType` is the kind of row
//! change a trigger recorded, and `IdColumnType` tells the event model how to
//! read an id column back out of an event-log row.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Name of an entity type, e.g. `Place` or `Sorcerer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(String);

impl EntityType {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityType {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for EntityType {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Error returned when an event type value read from the database is unknown.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventTypeError {
    #[error("Unknown event type value: {0}")]
    UnknownValue(i32),

    #[error("Unknown event type name: {0}")]
    UnknownName(String),
}

/// Kind of row change recorded in an event log.
///
/// The integer values are what the generated triggers write into the
/// event-type column, the names are used in generated trigger names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventType {
    Insert,
    Update,
    Delete,
}

impl EventType {
    /// All event types, in value order.
    pub const ALL: [EventType; 3] = [EventType::Insert, EventType::Update, EventType::Delete];

    pub fn value(self) -> i32 {
        match self {
            EventType::Insert => 0,
            EventType::Update => 1,
            EventType::Delete => 2,
        }
    }

    pub fn from_value(value: i32) -> Result<Self, EventTypeError> {
        match value {
            0 => Ok(EventType::Insert),
            1 => Ok(EventType::Update),
            2 => Ok(EventType::Delete),
            other => Err(EventTypeError::UnknownValue(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Insert => "INSERT",
            EventType::Update => "UPDATE",
            EventType::Delete => "DELETE",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "INSERT" => Ok(EventType::Insert),
            "UPDATE" => Ok(EventType::Update),
            "DELETE" => Ok(EventType::Delete),
            _ => Err(EventTypeError::UnknownName(s.to_string())),
        }
    }
}

/// Value type of an id column in an event-log table.
///
/// # YAML Format
///
/// ```yaml
/// column_types:
///   placeId: int64
///   code: text
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdColumnType {
    /// 32-bit signed integer
    Int32,

    /// 64-bit signed integer
    Int64,

    /// Character data
    Text,

    /// UUID, stored either natively or as its canonical string
    Uuid,
}

impl fmt::Display for IdColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IdColumnType::Int32 => "int32",
            IdColumnType::Int64 => "int64",
            IdColumnType::Text => "text",
            IdColumnType::Uuid => "uuid",
        };
        f.write_str(name)
    }
}
