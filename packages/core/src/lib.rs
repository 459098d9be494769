// Library root — exposes internal modules for integration tests in `tests/`.
// Production entry point remains `src/main.rs`.

pub mod admin;
pub mod api;
pub mod db;
pub mod error;
pub mod events;
pub mod mail;
pub mod metrics;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod security;
pub mod state;
pub mod validation;

// These modules are mostly needed by the binary.
pub mod cli;
pub mod config;
pub mod logging;
