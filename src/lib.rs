pub mod adapters;
pub mod api;
pub mod client;
pub mod config;
pub mod database;
pub mod middleware;
pub mod models;
pub mod ports;
pub mod services;
pub mod sync;
pub mod utils;
