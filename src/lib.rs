pub mod api;
pub mod chunking;
pub mod core;
pub mod download;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod peer;
pub mod stores;
pub mod utils;
pub mod validation;
pub mod wal;
