pub mod cache;
pub mod config;
pub mod download;
pub mod extract;
pub mod http;
pub mod package;
pub mod version;
