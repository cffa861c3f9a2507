pub mod catalog;
pub mod embeddings;
pub mod engine;
pub mod index;
pub mod query;
pub mod recommendations;
pub mod scoring;

pub use catalog::Catalog;
pub use engine::{CatalogSource, FormOptions, InitState, RecommendationEngine};
pub use recommendations::Recommender;
