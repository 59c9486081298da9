//! Foundation module - shared utilities
//!
//! Currently hosts the logging setup; the rest of the engine builds on the
//! `log` facade exported from here.

pub mod logging;
