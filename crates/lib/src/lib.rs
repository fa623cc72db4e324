//! Switchboard core library: model catalog, routing config generation, gateway client,
//! and the conversation session used by the CLI.

pub mod app;
pub mod catalog;
pub mod config;
pub mod gateway;
pub mod init;
pub mod prompts;
pub mod routing;
pub mod session;
