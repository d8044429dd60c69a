pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod logging;
pub mod rate_limit;
pub mod report;
pub mod schedule;
pub mod state;
pub mod tenant;
