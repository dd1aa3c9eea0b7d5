//! Search and indexing core for a multi-tenant documentation server.
//!
//! Each tenant's corpus lives as a sequence of immutable, content-addressed
//! segments on disk ([`store`]). A [`builder::SegmentBuilder`] turns a
//! directory of markdown documents into the next segment; a
//! [`coordinator::TenantCoordinator`] keeps one segment resident per tenant,
//! polls the manifest for newer publications, and answers queries through
//! [`query::QueryEngine`].

pub mod analyzer;
pub mod bloom;
pub mod builder;
pub mod coordinator;
pub mod error;
pub mod fingerprint;
pub mod frontmatter;
pub mod knobs;
pub mod metrics;
pub mod query;
pub mod schema;
pub mod sqlite_segment;
pub mod store;

pub use builder::{IndexBuildResult, IndexBuilderOptions, SegmentBuilder, SourceType};
pub use coordinator::TenantCoordinator;
pub use error::{SearchError, Result};
pub use query::{QueryEngine, QueryResult, QuerySpec, SearchOutcome};
pub use schema::{Field, FieldType, Schema};
pub use sqlite_segment::SegmentReader;
pub use store::SegmentStore;
