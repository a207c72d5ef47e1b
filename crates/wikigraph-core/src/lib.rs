//! wikigraph-core: Shared types, configuration, and error handling for the wikigraph adapter.
//!
//! This crate provides the foundational types used across all wikigraph components:
//! - Model schema (field descriptors, inheritance) supplied by the host application
//! - Typed values and rows exchanged with callers
//! - Graph identifiers (entities, items, properties)
//! - Configuration loading and validation
//! - The adapter error taxonomy

pub mod config;
pub mod error;
pub mod schema;
pub mod types;

pub use config::AdapterConfig;
pub use error::{AdapterError, Result};
pub use schema::{FieldDescriptor, FieldType, ModelSchema, Schema};
pub use types::{EntityId, ItemId, PropertyId, Row, Value};
