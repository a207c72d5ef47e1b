//! wikigraph-cli: command-line access to a wikigraph namespace.
//!
//! Loads the connection settings and the model schema, then runs one
//! query or mutation per invocation and prints the result as JSON.

pub mod commands;
pub mod config;
pub mod error;
