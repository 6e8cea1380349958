pub mod alerts;
pub mod auth;
pub mod data;
pub mod prediction;
pub mod reports;
