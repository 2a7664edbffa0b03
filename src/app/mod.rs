// Application layer: the three refresh sources, their mutation entry points
// and the assistant tool surface.

pub mod assistant;
pub mod catalog;
pub mod pipelines;
pub mod sources;

pub use catalog::{Catalog, MutationOutcome};
pub use pipelines::{build_pipeline, build_pipelines, coin_catalog};
