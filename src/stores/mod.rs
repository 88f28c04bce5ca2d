pub mod chunk_store;
pub mod registry;
