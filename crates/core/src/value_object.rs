//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**: two instances
/// with the same attribute values are the same value. `Hours { 2h, 0h20 }`
/// is a value object; an `Account` (which keeps its identity as its name or
/// overdraft policy changes) is an entity.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
