mod dto;
pub mod handlers;

use crate::auth::{require_authenticated, require_role, AllowedRoles, Role};
use crate::state::AppState;
use axum::{middleware::from_fn_with_state, Router};

const ADMIN_ROLES: &[Role] = &[Role::Admin, Role::SuperAdmin];

pub fn router(state: &AppState) -> Router<AppState> {
    Router::new()
        .merge(handlers::admin_routes())
        .route_layer(from_fn_with_state(AllowedRoles(ADMIN_ROLES), require_role))
        .route_layer(from_fn_with_state(state.clone(), require_authenticated))
}
