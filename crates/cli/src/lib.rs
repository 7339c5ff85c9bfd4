//! Command-line front end: configuration, logging setup, argument
//! parsing and the wiring of session, REST client, push channel and
//! orchestrators.

pub mod app;
pub mod command;
pub mod config;
pub mod logging;
mod render;
