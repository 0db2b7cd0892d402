pub mod config;
pub mod entities;
pub mod error;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod routes;
pub mod services;
pub mod state;
pub mod telemetry;
pub mod utils;
