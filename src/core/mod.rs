pub mod config;
pub mod endpoint;
pub mod error;
pub mod session;
pub mod transfer;
