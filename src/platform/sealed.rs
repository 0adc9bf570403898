// ABOUTME: Sealed trait pattern for the platform trait.
// ABOUTME: Prevents external implementations, allowing non-breaking evolution.

/// Only the backends in this crate implement [`super::Platform`].
pub trait Sealed {}
