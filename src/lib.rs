pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod link;
pub mod manifest;
pub mod output;
pub mod server;
pub mod upload;
