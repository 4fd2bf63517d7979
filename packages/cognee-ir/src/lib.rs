//! Cognee IR - typed DataPoint model
//!
//! Feature-First Hexagonal Architecture (kept from the codegraph lineage):
//! - `error`     : crate-wide error type
//! - `base`      : fields every DataPoint carries (identity, versioning, provenance)
//! - `node`      : the `Node` sum type - one variant per concrete DataPoint subclass
//! - `edge`      : explicit and implicit edges between DataPoints
//! - `traversal` : closure walk + provenance stamping over a forest of `Node`s
//! - `ids`       : stable (uuid5) and random (uuid4) identity helpers

pub mod base;
pub mod edge;
pub mod error;
pub mod ids;
pub mod node;
pub mod traversal;

pub use base::DataPointBase;
pub use edge::Edge;
pub use error::{IrError, Result};
pub use ids::{random_id, stable_id, NAMESPACE_OID};
pub use node::{
    CodePart, DocumentChunk, Entity, EntityType, Node, NodeSet, SourceCodeChunk, Summary,
};
pub use traversal::{stamp_provenance, stamp_provenance_all, Closure};
