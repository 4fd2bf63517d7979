//! The default `cognify` pipeline's task bodies (spec 4.7, C7) plus the
//! terminal `add_data_points` task (spec 4.5, C5).

pub mod add_data_points;
pub mod chunking;
pub mod extraction;
pub mod ontology;
pub mod summarization;

pub use add_data_points::add_data_points;
pub use chunking::{chunk_by_row, chunk_code, chunk_naive};
pub use extraction::extract_graph_from_data;
pub use ontology::ontology_resolver;
pub use summarization::summarization;
