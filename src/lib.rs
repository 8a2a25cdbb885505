// Library root: the binary entry point is src/main.rs.

pub mod api;
pub mod config;
pub mod error;
pub mod fetch;
pub mod loaders;
pub mod logger;
pub mod portal;
pub mod session;
pub mod staging;
