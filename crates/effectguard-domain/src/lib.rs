//! Pure effect analysis (no IO).
//!
//! Input: extracted callables, call sites, and raw annotation text produced elsewhere.
//! Output: per-namespace effective tags, findings, and a verdict.

#![forbid(unsafe_code)]

pub mod annotation;
pub mod builder;
pub mod effect;
pub mod extract;
pub mod model;
pub mod policies;
pub mod policy;
pub mod propagate;
pub mod report;

mod engine;
mod fingerprint;

#[cfg(test)]
mod proptest;
#[cfg(test)]
mod test_support;

pub use builder::BuildError;
pub use engine::{Engine, evaluate};
