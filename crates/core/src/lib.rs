//! `kardex-core` — shared building blocks for the kardex workspace.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers, the domain error model, audit metadata, fixed-point money and
//! the optimistic sequence expectation used by ledger stores.

pub mod audit;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod sequence;
pub mod value_object;

pub use audit::AuditMetadata;
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{MovementId, ProductId, SupplierId, TenantId, UserId};
pub use money::{Currency, Money, MoneyError, UnitCost, UNIT_COST_EXTRA_DIGITS};
pub use sequence::ExpectedSequence;
pub use value_object::ValueObject;
