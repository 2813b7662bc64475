//! Platform primitives.

pub mod futex;
