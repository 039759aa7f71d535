//! Reference product and result verification for MMA device output.
//!
//! The [`reference`] module computes what the accelerator should have
//! produced; the [`verifier`] module compares device output against it.

pub mod error;
pub mod reference;
pub mod verifier;

pub use error::{Result, VerifyError};
pub use reference::{classify_compatibility, is_multipliable, multiply, CompatibilityClass};
pub use verifier::{compare, compare_with, first_mismatch, Mismatch, Tolerance};
