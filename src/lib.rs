pub mod config;
pub mod documents;
pub mod error;
pub mod identity;
pub mod security;
pub mod server;
