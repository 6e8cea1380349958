pub mod app;
pub mod config;
pub mod db;
pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod risk;
pub mod state;
pub mod structure;
pub mod utils;
