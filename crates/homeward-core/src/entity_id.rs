//! Entity id type representing a `domain.object_id` pair

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error type for invalid entity ids
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EntityIdError {
    #[error("entity id must contain exactly one '.' separator: {0:?}")]
    MissingSeparator(String),

    #[error("entity id has an empty domain: {0:?}")]
    EmptyDomain(String),

    #[error("entity id has an empty object id: {0:?}")]
    EmptyObjectId(String),
}

/// A Home Assistant entity id such as `light.kitchen` or `binary_sensor.door`
///
/// Stored as the full string with the separator position remembered, so the
/// id can be handed to wire frames without reassembly. The client accepts
/// whatever the server hands back; only the structural `domain.object_id`
/// shape is enforced.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId {
    full: String,
    dot: usize,
}

impl EntityId {
    /// Parse an entity id from its `domain.object_id` form
    pub fn parse(s: impl Into<String>) -> Result<Self, EntityIdError> {
        let full = s.into();
        let dot = match full.find('.') {
            Some(i) if full[i + 1..].contains('.') => {
                return Err(EntityIdError::MissingSeparator(full))
            }
            Some(i) => i,
            None => return Err(EntityIdError::MissingSeparator(full)),
        };
        if dot == 0 {
            return Err(EntityIdError::EmptyDomain(full));
        }
        if dot + 1 == full.len() {
            return Err(EntityIdError::EmptyObjectId(full));
        }
        Ok(Self { full, dot })
    }

    /// The domain part, e.g. `light` in `light.kitchen`
    pub fn domain(&self) -> &str {
        &self.full[..self.dot]
    }

    /// The object id part, e.g. `kitchen` in `light.kitchen`
    pub fn object_id(&self) -> &str {
        &self.full[self.dot + 1..]
    }

    /// The full `domain.object_id` string
    pub fn as_str(&self) -> &str {
        &self.full
    }
}

impl FromStr for EntityId {
    type Err = EntityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = EntityIdError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(s)
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> String {
        id.full
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let id: EntityId = "sensor.outdoor_temperature".parse().unwrap();
        assert_eq!(id.domain(), "sensor");
        assert_eq!(id.object_id(), "outdoor_temperature");
        assert_eq!(id.to_string(), "sensor.outdoor_temperature");
    }

    #[test]
    fn test_missing_separator() {
        assert!(matches!(
            EntityId::parse("no_separator"),
            Err(EntityIdError::MissingSeparator(_))
        ));
        assert!(matches!(
            EntityId::parse("too.many.parts"),
            Err(EntityIdError::MissingSeparator(_))
        ));
    }

    #[test]
    fn test_empty_parts() {
        assert!(matches!(
            EntityId::parse(".object"),
            Err(EntityIdError::EmptyDomain(_))
        ));
        assert!(matches!(
            EntityId::parse("domain."),
            Err(EntityIdError::EmptyObjectId(_))
        ));
    }

    #[test]
    fn test_serde_roundtrip() {
        let id = EntityId::parse("switch.kitchen").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"switch.kitchen\"");

        let parsed: EntityId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn test_deserialize_invalid() {
        assert!(serde_json::from_str::<EntityId>("\"not-an-id\"").is_err());
    }
}
