pub mod app_settings;
pub mod plans;
pub mod transactions;
pub mod users;
