pub mod ingest;
pub mod query;
pub mod summary;
