pub mod alerts;
pub mod reports;
pub mod users;
