pub mod discovery;
pub mod extractor;
pub mod fetcher;
pub mod models;
pub mod patterns;
