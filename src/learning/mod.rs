//! Route outcome history, adaptive thresholds, and snapshot persistence

pub mod persistence;
pub mod store;

pub use persistence::{FilePersistence, MemoryPersistence, SnapshotPersistence};
pub use store::{LearningSnapshot, LearningStatistics, LearningStore, RoutePerformance};
