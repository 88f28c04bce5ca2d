pub mod chunk;
pub mod fallback;
pub mod health;
pub mod metrics;
pub mod query;
pub mod register;
