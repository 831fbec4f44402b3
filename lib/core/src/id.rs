//! Strongly-typed ID types for domain entities.
//!
//! Identifiers are issued by the hosted backend as UUID text. They are kept
//! opaque here: parsing only checks the canonical 8-4-4-4-12 hexadecimal
//! shape and normalizes to lowercase.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when parsing an ID from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of ID that failed to parse.
    pub id_type: &'static str,
    /// The reason for the parse failure.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

/// Lengths of the hyphen-separated groups of a canonical UUID.
const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

fn check_uuid_shape(s: &str) -> Result<(), String> {
    let groups: Vec<&str> = s.split('-').collect();
    if groups.len() != UUID_GROUPS.len() {
        return Err(format!("expected 5 groups, found {}", groups.len()));
    }
    for (group, expected) in groups.iter().zip(UUID_GROUPS) {
        if group.len() != expected {
            return Err(format!("group '{group}' should be {expected} characters"));
        }
        if let Some(c) = group.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(format!("invalid character '{c}'"));
        }
    }
    Ok(())
}

/// Macro to generate a strongly-typed ID wrapper around backend-issued UUID text.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(String);

        impl $name {
            /// Returns the ID as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                check_uuid_shape(s).map_err(|reason| ParseIdError {
                    id_type: stringify!($name),
                    reason,
                })?;
                Ok(Self(s.to_ascii_lowercase()))
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIdError;

            fn try_from(s: String) -> Result<Self, Self::Error> {
                s.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Unique identifier for a user, issued by the identity service.
    UserId
);

define_id!(
    /// Unique identifier for an organization.
    OrganizationId
);

define_id!(
    /// Unique identifier for a project within an organization.
    ProjectId
);
