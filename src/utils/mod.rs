pub mod hex;
pub mod net;
pub mod time;
