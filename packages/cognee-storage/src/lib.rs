//! Store-side contracts for the knowledge graph runtime: vector index (C2),
//! graph store (C3), store router (C4), and relational run/dataset catalog
//! (C9).
//!
//! - `error`   : shared `StorageError`/`ErrorKind`
//! - `graph`   : `GraphStore` trait + `InMemoryGraphStore`
//! - `vector`  : `VectorIndex` trait + `InMemoryVectorIndex`
//! - `router`  : `StoreRouter`, resolving `(owner, dataset)` to cached handles
//! - `catalog` : `RelationalCatalog` trait + SQLite/in-memory implementations

pub mod catalog;
pub mod error;
pub mod graph;
pub mod router;
pub mod vector;

#[cfg(feature = "sqlite")]
pub mod sqlite_catalog;

pub use catalog::{
    DataAccessTracking, Dataset, DatasetDatabase, EdgeMirror, InMemoryCatalog, NodeMirror,
    PipelineRun, PrincipalConfiguration, RelationalCatalog, RunStatus, User,
};
pub use error::{ErrorKind, Result, StorageError};
pub use graph::{Direction, GraphNode, GraphStore, InMemoryGraphStore, Subgraph, SubgraphFilter};
pub use router::{
    GraphFactory, InMemoryGraphFactory, InMemoryVectorFactory, StoreHandles, StoreRouter,
    VectorFactory,
};
pub use vector::{Distance, InMemoryVectorIndex, SearchFilter, SearchHit, VectorIndex, VectorItem};

#[cfg(feature = "sqlite")]
pub use sqlite_catalog::SqliteCatalog;
