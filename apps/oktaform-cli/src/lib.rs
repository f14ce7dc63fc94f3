//! oktaform CLI library
//!
//! Exposes the command modules so integration tests can drive them
//! against a mock Okta org.

pub mod commands;
pub mod document;
pub mod error;
pub mod logging;
pub mod provider;
pub mod report;
pub mod state_file;
