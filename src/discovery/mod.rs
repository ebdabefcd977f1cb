//! Route discovery: candidate routes and the search engine

pub mod engine;
pub mod route;

pub use engine::{DiscoveryEngine, SearchBudget};
pub use route::{Route, RouteConfidence};
