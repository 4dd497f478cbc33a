//! Shared identifier wrappers for alignflow.
//!
//! Records created by the engine (OKRs, objectives, key results, audit
//! entries) carry generated UUID identifiers. Users come from an external
//! directory and keep whatever opaque key that directory assigns.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Error returned when parsing an identifier fails.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct IdParseError {
    message: String,
}

impl IdParseError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

macro_rules! define_uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4().to_string())
            }

            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                Uuid::parse_str(value)
                    .map_err(|e| IdParseError::new(format!("Invalid {}: {}", $label, e)))?;
                Ok(Self(value.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

macro_rules! define_key_id {
    ($(#[$meta:meta])* $name:ident, $label:expr) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            pub fn parse(value: &str) -> Result<Self, IdParseError> {
                let trimmed = value.trim();
                if trimmed.is_empty() {
                    return Err(IdParseError::new(format!("Invalid {}: empty", $label)));
                }
                if trimmed.chars().any(char::is_whitespace) {
                    return Err(IdParseError::new(format!(
                        "Invalid {}: '{}' contains whitespace",
                        $label, trimmed
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_uuid_id!(
    /// Identity of an OKR aggregate.
    OkrId,
    "OKR ID"
);
define_uuid_id!(ObjectiveId, "objective ID");
define_uuid_id!(KeyResultId, "key result ID");
define_uuid_id!(AuditId, "audit ID");

define_key_id!(
    /// Directory key of a user. Assigned by the user directory, not by us.
    UserId,
    "user ID"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uuid_id_roundtrip() {
        let id = OkrId::new();
        let parsed: OkrId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_uuid_id_rejects_garbage() {
        let err = OkrId::parse("okr-123").unwrap_err();
        assert!(err.to_string().contains("OKR ID"));
    }

    #[test]
    fn test_user_id_accepts_directory_keys() {
        let id = UserId::parse(" u12 ").unwrap();
        assert_eq!(id.as_str(), "u12");
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("two words").is_err());
    }

    #[test]
    fn test_user_id_serde_validates() {
        let id: UserId = serde_json::from_str("\"u7\"").unwrap();
        assert_eq!(id.as_str(), "u7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"u7\"");
        assert!(serde_json::from_str::<UserId>("\"   \"").is_err());
    }
}
