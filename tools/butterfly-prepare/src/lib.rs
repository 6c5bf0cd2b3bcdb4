//! Road network preprocessing
//!
//! Loads a node-based road graph with turn restrictions, removes degree-two
//! nodes, labels components while honoring turn restrictions, flags edges in
//! tiny components and writes a static query graph snapshot.

pub mod cli;
pub mod components;
pub mod compress;
pub mod config;
pub mod error;
pub mod formats;
pub mod graph;
pub mod prepare;
pub mod restriction;
pub mod types;

pub use components::{compute_components, ComponentAlgorithm, ComponentLabels, ComponentReport};
pub use config::PrepareConfig;
pub use error::{Error, Result};
pub use graph::{DynamicGraph, QueryGraph, StaticGraph};
pub use prepare::{PrepareSummary, StageTimings};
pub use restriction::{RestrictionMap, TurnRestriction};
