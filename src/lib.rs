pub mod api;
pub mod config;
pub mod error;
pub mod forecast;
pub mod mailer;
pub mod ridership;
pub mod state;
pub mod stations;
pub mod users;
