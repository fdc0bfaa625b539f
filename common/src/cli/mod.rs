//! CLI-related shared utilities.
//!
//! Both binaries take the same `--color` policy; centralizing it here
//! keeps their behavior identical.

mod color;

pub use color::ColorWhen;
