pub mod client;
pub mod peer_client;
