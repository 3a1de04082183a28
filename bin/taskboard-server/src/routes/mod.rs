//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - Middleware layers (CORS, per-request trace-ID span)
//! - Health route and the OpenAPI document, both open
//! - `/api` event-ingestion and task routes, behind the access token when one
//!   is configured

pub mod doc;
mod events;
mod health;
mod tasks;

use std::sync::Arc;

use axum::routing::get;
use axum::{middleware, Json, Router};
use tower::ServiceBuilder;

use crate::middleware::{auth, cors, trace};
use crate::state::AppState;

pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(events::router())
        .merge(tasks::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::check_access_token,
        ));

    let api_doc = doc::get_docs();

    Router::new()
        .merge(health::router())
        .route(
            "/api-docs/openapi.json",
            get(move || {
                let api_doc = api_doc.clone();
                async move { Json(api_doc) }
            }),
        )
        .nest("/api", api_router)
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
