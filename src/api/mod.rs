pub mod handlers;
pub mod middleware;
pub mod state;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, service::ServiceContext};
use state::AppState;

pub fn create_app(service_context: Arc<ServiceContext>, settings: Arc<Settings>) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // Provider webhooks (unauthenticated; signature-verified inside)
        .route("/webhooks/stripe", post(handlers::webhooks::stripe))
        .route("/webhooks/zoom", post(handlers::webhooks::zoom))
        // API routes
        .nest("/api", api_routes(app_state.clone()))
        // Admin routes
        .nest("/admin", admin_routes(app_state.clone()))
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/availability", availability_routes(state.clone()))
        .nest("/gigs", gig_routes(state.clone()))
        .nest("/bookings", booking_routes(state.clone()))
        .nest("/payments", payment_routes(state))
}

fn availability_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public queries
        .route("/:teacher_id/windows", get(handlers::availability::available_on))
        .route("/:teacher_id/weekly", get(handlers::availability::weekly_schedule))
        // Teacher-owned slot management
        .nest(
            "/",
            Router::new()
                .route("/", get(handlers::availability::list_mine))
                .route("/", post(handlers::availability::upsert))
                .route("/weekly", put(handlers::availability::replace_weekly))
                .route("/", delete(handlers::availability::delete))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn gig_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Public views
        .route("/:id", get(handlers::gigs::get))
        .route("/teacher/:teacher_id", get(handlers::gigs::list_by_teacher))
        // Protected mutations
        .nest(
            "/",
            Router::new()
                .route("/", post(handlers::gigs::create))
                .route("/:id", put(handlers::gigs::update))
                .route_layer(axum::middleware::from_fn_with_state(
                    state,
                    middleware::auth::require_auth,
                )),
        )
}

fn booking_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::bookings::list_mine))
        .route("/", post(handlers::bookings::create))
        .route("/:id", get(handlers::bookings::get))
        .route("/:id/confirm", post(handlers::bookings::confirm))
        .route("/:id/cancel", post(handlers::bookings::cancel))
        .route("/:id/complete", post(handlers::bookings::complete))
        .route("/:id/pay", post(handlers::payments::pay_booking))
        .route("/:id/reschedule", post(handlers::bookings::reschedule_request))
        .route(
            "/:id/reschedule/respond",
            post(handlers::bookings::reschedule_respond),
        )
        .route(
            "/:id/reschedule/apply",
            post(handlers::bookings::reschedule_apply),
        )
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn payment_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/direct", post(handlers::payments::book_and_pay))
        .route("/:id", get(handlers::payments::get))
        .route("/methods", get(handlers::payments::list_methods))
        .route("/methods", post(handlers::payments::save_method))
        .route(
            "/methods/:id/default",
            post(handlers::payments::set_default_method),
        )
        .route("/refunds", post(handlers::refunds::request))
        .route("/refunds/:id", get(handlers::refunds::get))
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::auth::require_auth,
        ))
}

fn admin_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/refunds/pending", get(handlers::refunds::list_pending))
        .route("/refunds/:id/review", post(handlers::refunds::review))
        .route("/settings/payments", get(handlers::settings::get_payment_settings))
        .route("/settings/payments", put(handlers::settings::update_payment_settings))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::auth::require_admin,
        ))
        .with_state(state)
}
