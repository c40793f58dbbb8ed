use crate::state::AppState;
use axum::Router;

pub mod audit;
pub mod claims;
pub mod cookies;
pub mod credentials;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod jwt;
pub mod ledger;
pub mod password;
pub mod repo;
pub mod repo_types;
pub mod roles;
pub mod services;

pub use claims::Identity;
pub use extractors::{
    optional_authenticated, require_at_least, require_authenticated, require_role, AllowedRoles,
    AuthGate, MaybeIdentity,
};
pub use roles::Role;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(handlers::auth_routes())
        .merge(handlers::me_routes())
}
