pub mod auth;
pub mod checkins;
pub mod config;
pub mod email;
pub mod error;
pub mod goals;
pub mod messages;
pub mod middleware;
pub mod notifications;
pub mod partnerships;
pub mod progress;
pub mod routes;
pub mod state;
pub mod users;
