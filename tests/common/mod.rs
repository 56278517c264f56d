#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower::ServiceExt;

use pitch_booking_backend::config::Config;
use pitch_booking_backend::dto::account_dto::{Account, Role};
use pitch_booking_backend::dto::notification_dto::Notification;
use pitch_booking_backend::routes::accounts::create_account;
use pitch_booking_backend::services::auth_user::issue_token;
use pitch_booking_backend::{build_router, db, NOTIFICATION_CHANNEL_SIZE};

pub const PASSWORD: &str = "pass12345";

pub struct TestApp {
    pub pool: SqlitePool,
    pub config: Arc<Config>,
    pub tx: broadcast::Sender<Notification>,
    router: Router,
}

pub struct TestAccount {
    pub account: Account,
    pub token: String,
}

pub fn time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

impl TestApp {
    pub async fn new() -> Self {
        let pool = db::connect_in_memory().await.unwrap();
        let config = Arc::new(Config {
            bcrypt_cost: 4,
            ..Config::default()
        });
        let (tx, _rx) = broadcast::channel(NOTIFICATION_CHANNEL_SIZE);
        let router = build_router(pool.clone(), config.clone(), tx.clone());
        Self { pool, config, tx, router }
    }

    /// Send a request to the app and return (status, JSON body or `Null`).
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("Authorization", format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let resp = self.router.clone().oneshot(request).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, token, Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.send(Method::PUT, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, token, None).await
    }

    pub async fn account(&self, username: &str, role: Option<Role>) -> TestAccount {
        self.account_with(username, role, false).await
    }

    pub async fn staff(&self, username: &str, role: Option<Role>) -> TestAccount {
        self.account_with(username, role, true).await
    }

    async fn account_with(&self, username: &str, role: Option<Role>, is_staff: bool) -> TestAccount {
        let email = format!("{username}@club.test");
        let account = create_account(
            &self.pool,
            &self.config,
            username,
            &email,
            PASSWORD,
            role,
            is_staff,
        )
        .await
        .unwrap();
        let token = issue_token(&account, &self.config).unwrap();
        TestAccount { account, token }
    }

    pub async fn pitch(&self, name: &str) -> i64 {
        sqlx::query_scalar::<_, i64>("INSERT INTO pitches (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    /// Inserts a booking directly, bypassing the approval rules.
    pub async fn insert_booking(
        &self,
        pitch_id: i64,
        created_by: Option<i64>,
        start: &str,
        end: &str,
        status: &str,
    ) -> i64 {
        sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO bookings (pitch_id, name, created_by, start_time, end_time, method, status, submitted_at)
            VALUES (?, 'Existing', ?, ?, ?, 'web', ?, ?)
            RETURNING id
            "#,
        )
        .bind(pitch_id)
        .bind(created_by)
        .bind(time(start))
        .bind(time(end))
        .bind(status)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .unwrap()
    }

    pub async fn notification_count(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM notifications")
            .fetch_one(&self.pool)
            .await
            .unwrap()
    }

    pub async fn notifications_for(&self, account_id: i64) -> Vec<Notification> {
        sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE recipient_id = ? ORDER BY id",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await
        .unwrap()
    }
}
