//! Wikigraph adapter: relational models over a Wikibase graph.
//!
//! Rows become items, columns become properties, and queries become
//! SPARQL. All reads and writes of a namespace flow through an
//! [`Adapter`], which keeps field mappings consistent and every entity
//! inside its namespace.

pub mod adapter;
pub mod claims;
pub mod client;
pub mod materialize;
pub mod mutations;
pub mod namespace;
pub mod query;
pub mod registry;
pub mod session;
pub mod transport;

pub use adapter::{parse_values, Adapter, Values};
pub use client::WikibaseClient;
pub use materialize::{materialize, RowStream};
pub use namespace::Namespace;
pub use query::{Filter, Operator, OrderBy, Query};
pub use registry::{PropertyRegistry, ReservedProperties, TypeResolver};
pub use session::{SessionManager, SessionToken};
pub use transport::{Binding, HttpTransport, SparqlResults, Transport};
