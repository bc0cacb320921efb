//! Router construction for the admin console server.

use std::time::Duration;

use axum::{
    middleware as axum_mw,
    routing::{get, patch, post, put},
    Extension, Router,
};
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use highway_core::service::{DomainService, MenuService};
use highway_core::{EnforcementGate, PolicyRuntime};

use crate::handlers;
use crate::middleware::enforcement::enforce;
use crate::middleware::jwt::JwtConfig;

/// Everything handlers reach through extensions.
#[derive(Clone)]
pub struct Services {
    pub domains: DomainService,
    pub menus: MenuService,
    pub policy: PolicyRuntime,
}

/// Build the full axum router with all routes and middleware.
pub fn build_router(
    services: Services,
    gate: EnforcementGate,
    jwt_config: JwtConfig,
    read_timeout: Option<Duration>,
) -> Router {
    // Routes behind authentication and the enforcement gate
    let protected = Router::new()
        .route(
            "/api/v1/domains",
            get(handlers::domains::list_domains).post(handlers::domains::create_domain),
        )
        .route(
            "/api/v1/domains/:id",
            get(handlers::domains::get_domain)
                .put(handlers::domains::update_domain)
                .delete(handlers::domains::delete_domain),
        )
        .route(
            "/api/v1/domains/:id/enable",
            patch(handlers::domains::enable_domain),
        )
        .route(
            "/api/v1/domains/:id/disable",
            patch(handlers::domains::disable_domain),
        )
        .route(
            "/api/v1/menus",
            get(handlers::menus::list_menus).post(handlers::menus::create_menu),
        )
        .route(
            "/api/v1/menus/:id",
            get(handlers::menus::get_menu)
                .put(handlers::menus::update_menu)
                .delete(handlers::menus::delete_menu),
        )
        .route(
            "/api/v1/menus/:id/actions",
            get(handlers::menus::list_actions).post(handlers::menus::create_action),
        )
        .route(
            "/api/v1/menus/:id/actions/:action_id",
            put(handlers::menus::update_action).delete(handlers::menus::delete_action),
        )
        .route("/api/v1/policy/rules", get(handlers::policy::list_rules))
        .route(
            "/api/v1/policy/roles/:role/subjects",
            post(handlers::policy::assign_subject),
        )
        .route(
            "/api/v1/policy/roles/:role/subjects/:subject",
            axum::routing::delete(handlers::policy::revoke_subject),
        )
        .route("/api/v1/policy/reload", post(handlers::policy::reload))
        .layer(axum_mw::from_fn(enforce))
        .layer(Extension(gate))
        .layer(Extension(jwt_config));

    // Public routes (no auth)
    let public = Router::new().route("/health", get(handlers::health::health));

    let app = public
        .merge(protected)
        .layer(Extension(services.domains))
        .layer(Extension(services.menus))
        .layer(Extension(services.policy))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    match read_timeout {
        Some(t) => app.layer(TimeoutLayer::new(t)),
        None => app,
    }
}
