pub mod analyzer;
pub mod batch;
pub mod column_matcher;
pub mod config;
pub mod detector;
pub mod error;
pub mod ingestion;
pub mod model;
pub mod schema;
