//! Session and credential lifecycle service: login, signup, refresh-token
//! rotation, logout, audit trail, and the authorization gate other services
//! mount in front of their own routes.

pub mod admin;
pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;
