//! rigger-sudoutil validation library.
//!
//! Public interface for the validation logic, used by the helper binary
//! itself and by unit tests.

pub mod validate;
