//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects have no identity and are immutable: `Money` amounts, currency
/// codes, unit costs and audit stamps. To "modify" one, build a new value.
///
/// ```ignore
/// let a = Money::new(200, usd);
/// let b = Money::new(200, usd);
/// assert_eq!(a, b); // equal by value
/// ```
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
