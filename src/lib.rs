pub mod config;
pub mod cors;
pub mod docs;
pub mod error;
pub mod handlers;
pub mod localization;
pub mod observability;
pub mod routes;
pub mod services;
pub mod types;
