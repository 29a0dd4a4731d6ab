pub mod api_error;
pub mod config;
pub mod processor;
pub mod routes;
pub mod staging;
pub mod state;
