pub mod auth;
pub mod config;
pub mod domain;
pub mod driver;
pub mod error;
pub mod mail;
pub mod pricing;
pub mod ui;
pub mod workflow;

#[cfg(test)]
mod testing;
