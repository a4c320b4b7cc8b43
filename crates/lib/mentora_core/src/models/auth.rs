//! Authentication domain models.
//!
//! Store records carry everything a row holds. The public `Identity` view and
//! the token `IdentityClaims` never carry the password hash.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of roles an identity can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a stored or requested role name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownRole(pub String);

impl fmt::Display for UnknownRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown role '{}'", self.0)
    }
}

impl std::error::Error for UnknownRole {}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(UnknownRole(other.to_string())),
        }
    }
}

/// Identity row as persisted, including credential material.
#[derive(Clone)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub failed_attempts: u32,
    pub last_failed_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for IdentityRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityRecord")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .field("roles", &self.roles)
            .field("failed_attempts", &self.failed_attempts)
            .field("last_failed_attempt", &self.last_failed_attempt)
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

impl IdentityRecord {
    /// Public view without credential material.
    pub fn to_identity(&self) -> Identity {
        Identity {
            id: self.id,
            email: self.email.clone(),
            name: self.name.clone(),
            roles: self.roles.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Input for inserting a new identity.
#[derive(Clone)]
pub struct NewIdentity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
}

/// Partial update applied by administrators.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdentityUpdate {
    pub name: Option<String>,
    pub roles: Option<Vec<Role>>,
}

/// Identity as exposed outside the auth boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session row. Never mutated after insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: Uuid,
    pub identity_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Failed-attempt columns of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailedAttempts {
    pub count: u32,
    pub last_failed_at: Option<DateTime<Utc>>,
}

/// Claim set carried inside a bearer token and attached to authorised requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<Role>,
    pub session_id: Uuid,
}

impl IdentityClaims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// True if any of `required` is held. An empty `required` set is satisfied
    /// by any authenticated identity.
    pub fn has_any_role(&self, required: &[Role]) -> bool {
        required.is_empty() || required.iter().any(|r| self.roles.contains(r))
    }

    /// Ownership rule for per-identity resources: the owner or an admin.
    pub fn can_access(&self, owner_id: Uuid) -> bool {
        self.id == owner_id || self.has_role(Role::Admin)
    }
}
