//! Value representations passed between the event log, the synchronizer and
//! the external collaborators.

use crate::types::{EntityType, EventType, IdColumnType};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identity of one entity instance.
///
/// Multi-column keys are represented as `Composite`, in the column order the
/// event model declares them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Int(i64),
    Uuid(Uuid),
    Text(String),
    Composite(Vec<IdValue>),
}

impl IdValue {
    /// Read an id column value using its declared column type.
    ///
    /// Returns `None` when the raw value can't represent the column type,
    /// e.g. a string that isn't a number for an `int64` column.
    pub fn from_column(value: &serde_json::Value, column_type: IdColumnType) -> Option<Self> {
        match column_type {
            IdColumnType::Int32 => {
                let v = json_as_i64(value)?;
                i32::try_from(v).ok().map(|v| IdValue::Int(v as i64))
            }
            IdColumnType::Int64 => json_as_i64(value).map(IdValue::Int),
            IdColumnType::Text => match value {
                serde_json::Value::String(s) => Some(IdValue::Text(s.clone())),
                serde_json::Value::Number(n) => Some(IdValue::Text(n.to_string())),
                _ => None,
            },
            IdColumnType::Uuid => value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(IdValue::Uuid),
        }
    }
}

fn json_as_i64(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

impl fmt::Display for IdValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdValue::Int(v) => write!(f, "{v}"),
            IdValue::Uuid(u) => write!(f, "{u}"),
            IdValue::Text(s) => f.write_str(s),
            IdValue::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

impl From<i64> for IdValue {
    fn from(v: i64) -> Self {
        IdValue::Int(v)
    }
}

impl From<i32> for IdValue {
    fn from(v: i32) -> Self {
        IdValue::Int(v as i64)
    }
}

impl From<&str> for IdValue {
    fn from(v: &str) -> Self {
        IdValue::Text(v.to_string())
    }
}

impl From<Uuid> for IdValue {
    fn from(v: Uuid) -> Self {
        IdValue::Uuid(v)
    }
}

/// One change event: which entity changed and how.
///
/// Change events are compared by all three fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UpdateInfo {
    entity_type: EntityType,
    id: IdValue,
    event_type: EventType,
}

impl UpdateInfo {
    pub fn new(entity_type: impl Into<EntityType>, id: impl Into<IdValue>, event_type: EventType) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            event_type,
        }
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn id(&self) -> &IdValue {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }
}

/// Current state of one entity as loaded by an entity provider.
///
/// `data` holds the entity's properties the way the persistence layer
/// exposes them; the synchronizer only reads back-reference properties from
/// it, everything else is passed through to the index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRecord {
    pub entity_type: EntityType,
    pub id: IdValue,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl EntityRecord {
    pub fn new(entity_type: impl Into<EntityType>, id: impl Into<IdValue>) -> Self {
        Self {
            entity_type: entity_type.into(),
            id: id.into(),
            data: serde_json::Map::new(),
        }
    }

    /// Builder-style setter for a property.
    pub fn with_field(mut self, name: impl Into<String>, value: serde_json::Value) -> Self {
        self.data.insert(name.into(), value);
        self
    }

    /// Ids of type `id_type` referenced through `property`.
    ///
    /// A scalar yields one id, an array one id per non-null element, and an
    /// object its `id_property` member. A missing or `null` property yields
    /// none, which is how a cleared back-reference looks.
    ///
    /// Returns `None` if any referenced value can't be read as `id_type`.
    pub fn reference_ids(
        &self,
        property: &str,
        id_property: &str,
        id_type: IdColumnType,
    ) -> Option<Vec<IdValue>> {
        let read = |value: &serde_json::Value| match value {
            serde_json::Value::Object(obj) => obj
                .get(id_property)
                .and_then(|id| IdValue::from_column(id, id_type)),
            other => IdValue::from_column(other, id_type),
        };
        match self.data.get(property) {
            None | Some(serde_json::Value::Null) => Some(Vec::new()),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .filter(|item| !item.is_null())
                .map(read)
                .collect(),
            Some(other) => read(other).map(|id| vec![id]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_from_column() {
        assert_eq!(
            IdValue::from_column(&json!("42"), IdColumnType::Int64),
            Some(IdValue::Int(42))
        );
        assert_eq!(
            IdValue::from_column(&json!(i64::MAX), IdColumnType::Int32),
            None
        );
        assert_eq!(
            IdValue::from_column(&json!(7), IdColumnType::Text),
            Some(IdValue::from("7"))
        );
        let uuid = Uuid::new_v4();
        assert_eq!(
            IdValue::from_column(&json!(uuid.to_string()), IdColumnType::Uuid),
            Some(IdValue::Uuid(uuid))
        );
        assert_eq!(IdValue::from_column(&json!("nope"), IdColumnType::Uuid), None);
    }

    #[test]
    fn test_id_display() {
        let id = IdValue::Composite(vec![IdValue::Int(1), IdValue::from("x")]);
        assert_eq!(id.to_string(), "(1, x)");
    }

    #[test]
    fn test_update_info_equality() {
        let a = UpdateInfo::new("Place", 1, EventType::Update);
        let b = UpdateInfo::new("Place", 1i64, EventType::Update);
        let c = UpdateInfo::new("Place", 1, EventType::Delete);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.entity_type().as_str(), "Place");
        assert_eq!(a.id(), &IdValue::Int(1));
    }

    #[test]
    fn test_reference_ids() {
        let record = EntityRecord::new("Sorcerer", 2)
            .with_field("place", json!(1))
            .with_field("guilds", json!([3, null, "4"]))
            .with_field("mentor", json!(null))
            .with_field("school", json!({"code": 9}));
        let ints = |property: &str| record.reference_ids(property, "code", IdColumnType::Int64);

        assert_eq!(ints("place"), Some(vec![IdValue::Int(1)]));
        assert_eq!(ints("guilds"), Some(vec![IdValue::Int(3), IdValue::Int(4)]));
        assert_eq!(ints("mentor"), Some(Vec::new()));
        assert_eq!(ints("missing"), Some(Vec::new()));
        assert_eq!(ints("school"), Some(vec![IdValue::Int(9)]));
    }

    #[test]
    fn test_reference_ids_follow_root_id_type() {
        let place = Uuid::new_v4();
        let record = EntityRecord::new("Sorcerer", 2)
            .with_field("placeId", json!(place.to_string()))
            .with_field("guildCode", json!(17))
            .with_field("mentor", json!({"id": "not-a-uuid"}));

        assert_eq!(
            record.reference_ids("placeId", "id", IdColumnType::Uuid),
            Some(vec![IdValue::Uuid(place)])
        );
        assert_eq!(
            record.reference_ids("guildCode", "id", IdColumnType::Text),
            Some(vec![IdValue::from("17")])
        );
        assert_eq!(record.reference_ids("mentor", "id", IdColumnType::Uuid), None);
    }
}
