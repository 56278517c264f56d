use std::sync::Arc;

use axum::{
    extract::Extension,
    http::Method,
    routing::{get, post, put},
    Router,
};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub mod config;
pub mod db;
pub mod errors;

pub mod dto {
    pub mod account_dto;
    pub mod booking_dto;
    pub mod notification_dto;
    pub mod pitch_dto;
    pub mod team_dto;
}

pub mod routes {
    pub mod accounts;
    pub mod bookings;
    pub mod notifications;
    pub mod pitches;
    pub mod teams;
}

pub mod services {
    pub mod alerts;
    pub mod auth_user;
    pub mod booking_rules;
    pub mod booking_signals;
    pub mod websocket;
}

use config::Config;
use dto::notification_dto::Notification;
use routes::{accounts, bookings, notifications, pitches, teams};
use services::websocket::websocket_handler;

/// Capacity of the live notification channel.
pub const NOTIFICATION_CHANNEL_SIZE: usize = 100;

pub fn build_router(
    pool: SqlitePool,
    config: Arc<Config>,
    tx: broadcast::Sender<Notification>,
) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any)
        .allow_origin(Any);

    Router::new()
        .route("/register", post(accounts::register))
        .route("/login", post(accounts::login))
        .route("/logout", post(accounts::logout))
        .route(
            "/profile",
            get(accounts::get_profile)
                .put(accounts::update_profile)
                .delete(accounts::remove_profile),
        )
        .route("/password-reset", post(accounts::request_password_reset))
        .route("/password-reset/confirm", post(accounts::confirm_password_reset))
        .route("/accounts/{id}/role", put(accounts::assign_role))
        .route("/pitches", get(pitches::get_pitches).post(pitches::create_pitch))
        .route("/bookings", get(bookings::get_bookings).post(bookings::create_booking))
        .route(
            "/bookings/{id}",
            get(bookings::get_booking)
                .put(bookings::update_booking)
                .delete(bookings::delete_booking),
        )
        .route("/bookings/{id}/approve", post(bookings::approve_booking))
        .route("/bookings/{id}/reject", post(bookings::reject_booking))
        .route("/teams", get(teams::get_teams).post(teams::create_team))
        .route(
            "/teams/{id}",
            get(teams::get_team)
                .put(teams::update_team)
                .delete(teams::delete_team),
        )
        .route("/notifications", get(notifications::get_notifications))
        .route("/notifications/unread-count", get(notifications::unread_count))
        .route(
            "/notifications/{id}",
            get(notifications::get_notification).delete(notifications::delete_notification),
        )
        .route("/ws", get(websocket_handler))
        .layer(Extension(pool))
        .layer(Extension(config))
        .layer(Extension(tx))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
