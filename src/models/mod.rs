pub mod file_record;
pub mod peer;
pub mod wire;
