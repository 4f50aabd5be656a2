//! API endpoint handlers.
//!
//! Handlers parse the request, lock the database for one service call and
//! map the result. Business rules and authorization live in the services.

pub mod analytics;
pub mod auth;
pub mod care;
pub mod comms;
pub mod files;
pub mod health;
pub mod reports;
pub mod residents;
pub mod shifts;
pub mod users;
