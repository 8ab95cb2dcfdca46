//! Storage layer

pub mod sqlite;

pub use sqlite::SeriesStore;
