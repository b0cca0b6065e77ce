//! Entity trait: identity + continuity across state changes.

use crate::audit::AuditMetadata;

/// Catalog entity: identified by id, carrying audit stamps.
pub trait Entity {
    /// Strongly-typed entity identifier.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    /// Returns the entity identifier.
    fn id(&self) -> &Self::Id;

    /// Creation/modification stamps.
    fn audit(&self) -> &AuditMetadata;
}
