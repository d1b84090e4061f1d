pub mod auth;
pub mod dashboard;
pub mod datasets;
pub mod health;
pub mod settings;
pub mod users;
