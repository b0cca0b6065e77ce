use core::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use kardex_core::{DomainError, UserId};

use crate::permissions::Permission;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RoleError {
    #[error("invalid role: {0}")]
    Unknown(String),

    #[error(transparent)]
    Domain(#[from] DomainError),
}

/// Closed set of warehouse roles.
///
/// Parsing is the only way to turn external text into a role, so an invalid
/// role cannot exist past construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Personal,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Personal => "personal",
        }
    }

    pub fn permissions(&self) -> &'static [Permission] {
        match self {
            Role::Admin => &Permission::ALL,
            Role::Personal => &[
                Permission::ManageCatalog,
                Permission::RecordMovements,
                Permission::ViewReports,
            ],
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl FromStr for Role {
    type Err = RoleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "admin" => Ok(Role::Admin),
            "personal" => Ok(Role::Personal),
            other => Err(RoleError::Unknown(other.to_string())),
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A warehouse user as seen by the kardex layer (credentials live elsewhere).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAccount {
    id: UserId,
    username: String,
    role: Role,
}

impl UserAccount {
    pub fn new(id: UserId, username: &str, role: &str) -> Result<Self, RoleError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::field("username", "cannot be empty").into());
        }
        Ok(Self {
            id,
            username: username.to_string(),
            role: role.parse()?,
        })
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.role.allows(permission)
    }
}
