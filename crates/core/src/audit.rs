//! Audit metadata shared by catalog entities and movements.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::id::UserId;
use crate::value_object::ValueObject;

/// Creation/modification stamps embedded by composition in every entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<UserId>,
}

impl AuditMetadata {
    pub fn new(at: DateTime<Utc>, created_by: Option<UserId>) -> Self {
        Self {
            created_at: at,
            updated_at: at,
            created_by,
        }
    }

    /// Returns a copy stamped as modified at `at`.
    ///
    /// `updated_at` never moves backwards.
    pub fn touched(self, at: DateTime<Utc>) -> Self {
        Self {
            updated_at: self.updated_at.max(at),
            ..self
        }
    }
}

impl ValueObject for AuditMetadata {}
