pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod service;
pub mod shutdown;
pub mod tls;
pub mod worker;
