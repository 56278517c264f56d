mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;
use pitch_booking_backend::dto::account_dto::Role;

fn form(pitch_id: i64, start: &str, end: &str) -> Value {
    json!({
        "pitch_id": pitch_id,
        "start_time": start,
        "end_time": end,
    })
}

fn with(mut body: Value, key: &str, value: Value) -> Value {
    body[key] = value;
    body
}

/// Main pitch with an approved booking for 10:00-11:00.
async fn main_pitch_with_booking(app: &TestApp) -> i64 {
    let main = app.pitch("Main Pitch").await;
    app.insert_booking(main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "approved")
        .await;
    main
}

#[tokio::test]
async fn manager_on_clear_main_pitch_is_approved_and_keeps_channel() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let manager = app.account("manager", Some(Role::Manager)).await;

    let body = with(
        form(main, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z"),
        "method",
        json!("email"),
    );
    let (status, booking) = app.post("/bookings", Some(&manager.token), body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "approved");
    assert_eq!(booking["method"], "email");
    assert_eq!(booking["pitch_name"], "Main Pitch");
    assert_eq!(booking["created_by"], manager.account.id);
}

#[tokio::test]
async fn overlapping_manager_booking_is_conflicting() {
    let app = TestApp::new().await;
    let main = main_pitch_with_booking(&app).await;
    let manager = app.account("manager", Some(Role::Manager)).await;

    let body = with(
        form(main, "2030-05-10T10:30:00Z", "2030-05-10T11:30:00Z"),
        "method",
        json!("phone"),
    );
    let (status, booking) = app.post("/bookings", Some(&manager.token), body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "conflicting");
}

#[tokio::test]
async fn overlapping_coach_booking_is_conflicting() {
    let app = TestApp::new().await;
    let main = main_pitch_with_booking(&app).await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let body = form(main, "2030-05-10T10:30:00Z", "2030-05-10T11:30:00Z");
    let (_, booking) = app.post("/bookings", Some(&coach.token), body).await;

    assert_eq!(booking["status"], "conflicting");
}

#[tokio::test]
async fn officers_are_approved_on_main_regardless_of_overlap() {
    let app = TestApp::new().await;
    let main = main_pitch_with_booking(&app).await;

    for (name, role) in [("chair", Role::Chairman), ("sec", Role::Secretary)] {
        let officer = app.account(name, Some(role)).await;
        let body = form(main, "2030-05-10T10:30:00Z", "2030-05-10T11:30:00Z");
        let (_, booking) = app.post("/bookings", Some(&officer.token), body).await;
        assert_eq!(booking["status"], "approved", "{name}");
    }
}

#[tokio::test]
async fn touching_intervals_do_not_conflict() {
    let app = TestApp::new().await;
    let main = main_pitch_with_booking(&app).await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let body = form(main, "2030-05-10T11:00:00Z", "2030-05-10T12:00:00Z");
    let (_, booking) = app.post("/bookings", Some(&coach.token), body).await;

    assert_eq!(booking["status"], "approved");
}

#[tokio::test]
async fn only_approved_bookings_count_as_conflicts() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    for status in ["pending", "rejected", "conflicting"] {
        app.insert_booking(main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", status)
            .await;
    }
    let other_main = app.pitch("Main Pitch 2").await;
    app.insert_booking(other_main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "approved")
        .await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let body = form(main, "2030-05-10T10:15:00Z", "2030-05-10T10:45:00Z");
    let (_, booking) = app.post("/bookings", Some(&coach.token), body).await;

    assert_eq!(booking["status"], "approved");
}

#[tokio::test]
async fn non_managers_are_always_recorded_as_web() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let astro = app.pitch("Astro Pitch").await;

    for (name, role) in [
        ("coach", Role::Coach),
        ("chair", Role::Chairman),
        ("sec", Role::Secretary),
    ] {
        let account = app.account(name, Some(role)).await;
        for (i, pitch) in [main, astro].into_iter().enumerate() {
            let body = with(
                form(pitch, &format!("2030-06-0{}T09:00:00Z", i + 1), &format!("2030-06-0{}T10:00:00Z", i + 1)),
                "method",
                json!("phone"),
            );
            let (status, booking) = app.post("/bookings", Some(&account.token), body).await;
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(booking["method"], "web", "{name}");
        }
    }
}

#[tokio::test]
async fn astro_bookings_wait_for_coaches_and_officers() {
    let app = TestApp::new().await;
    let astro = app.pitch("Astro Pitch").await;

    for (name, role) in [("coach", Role::Coach), ("chair", Role::Chairman)] {
        let account = app.account(name, Some(role)).await;
        let body = form(astro, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z");
        let (_, booking) = app.post("/bookings", Some(&account.token), body).await;
        assert_eq!(booking["status"], "pending", "{name}");
    }

    let manager = app.account("manager", Some(Role::Manager)).await;
    let body = with(
        form(astro, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z"),
        "method",
        json!("phone"),
    );
    let (_, booking) = app.post("/bookings", Some(&manager.token), body).await;
    assert_eq!(booking["status"], "approved");
}

#[tokio::test]
async fn anonymous_submission_is_pending_web() {
    let app = TestApp::new().await;
    let astro = app.pitch("Astro Pitch").await;

    let body = json!({
        "pitch_id": astro,
        "name": "Local Five-a-side",
        "email": "five@example.com",
        "phone": "0871234567",
        "start_time": "2030-05-10T18:00:00Z",
        "end_time": "2030-05-10T19:00:00Z",
        "method": "phone",
    });
    let (status, booking) = app.post("/bookings", None, body).await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "pending");
    assert_eq!(booking["method"], "web");
    assert_eq!(booking["created_by"], Value::Null);
    assert_eq!(booking["name"], "Local Five-a-side");
}

#[tokio::test]
async fn anonymous_cannot_pick_the_main_pitch_or_skip_the_name() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let astro = app.pitch("Astro Pitch").await;

    let body = with(form(main, "2030-05-10T18:00:00Z", "2030-05-10T19:00:00Z"), "name", json!("Five"));
    let (status, err) = app.post("/bookings", None, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["pitch_id"].is_array());

    let body = form(astro, "2030-05-10T18:00:00Z", "2030-05-10T19:00:00Z");
    let (status, err) = app.post("/bookings", None, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["name"].is_array());

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings")
        .fetch_one(&app.pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn reversed_interval_is_rejected() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let body = form(main, "2030-05-10T11:00:00Z", "2030-05-10T10:00:00Z");
    let (status, err) = app.post("/bookings", Some(&coach.token), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["end_time"].is_array());
}

#[tokio::test]
async fn manager_must_say_how_the_request_arrived() {
    let app = TestApp::new().await;
    let astro = app.pitch("Astro Pitch").await;
    let manager = app.account("manager", Some(Role::Manager)).await;

    let body = form(astro, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z");
    let (status, err) = app.post("/bookings", Some(&manager.token), body.clone()).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["method"].is_array());

    let (status, _) = app
        .post("/bookings", Some(&manager.token), with(body, "method", json!("web")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn unknown_pitch_is_a_field_error() {
    let app = TestApp::new().await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let body = form(999, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z");
    let (status, err) = app.post("/bookings", Some(&coach.token), body).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["pitch_id"].is_array());
}

#[tokio::test]
async fn manager_reviews_astro_only() {
    let app = TestApp::new().await;
    let astro = app.pitch("Astro Pitch").await;
    let main = app.pitch("Main Pitch").await;
    let manager = app.account("manager", Some(Role::Manager)).await;

    let astro_booking = app
        .insert_booking(astro, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "pending")
        .await;
    let main_booking = app
        .insert_booking(main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "pending")
        .await;

    let (status, booking) = app
        .post(&format!("/bookings/{astro_booking}/approve"), Some(&manager.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "approved");

    let (status, _) = app
        .post(&format!("/bookings/{main_booking}/approve"), Some(&manager.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app
        .post(&format!("/bookings/{main_booking}/reject"), Some(&manager.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn officers_review_main_only() {
    let app = TestApp::new().await;
    let astro = app.pitch("Astro Pitch").await;
    let main = app.pitch("Main Pitch").await;

    for (name, role) in [("chair", Role::Chairman), ("sec", Role::Secretary)] {
        let officer = app.account(name, Some(role)).await;
        let main_booking = app
            .insert_booking(main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "pending")
            .await;
        let astro_booking = app
            .insert_booking(astro, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "pending")
            .await;

        let (status, booking) = app
            .post(&format!("/bookings/{main_booking}/reject"), Some(&officer.token), json!({}))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(booking["status"], "rejected");

        let (status, _) = app
            .post(&format!("/bookings/{astro_booking}/approve"), Some(&officer.token), json!({}))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }
}

#[tokio::test]
async fn review_needs_a_privileged_role_and_a_login() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let coach = app.account("coach", Some(Role::Coach)).await;
    let id = app
        .insert_booking(main, Some(coach.account.id), "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "pending")
        .await;

    let (status, _) = app
        .post(&format!("/bookings/{id}/approve"), Some(&coach.token), json!({}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post(&format!("/bookings/{id}/approve"), None, json!({})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn reviewing_a_decided_booking_changes_nothing() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let chair = app.account("chair", Some(Role::Chairman)).await;
    let id = app
        .insert_booking(main, None, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "rejected")
        .await;

    let (status, booking) = app
        .post(&format!("/bookings/{id}/approve"), Some(&chair.token), json!({}))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(booking["status"], "rejected");
}

#[tokio::test]
async fn coaches_list_only_their_own_bookings() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let coach = app.account("coach", Some(Role::Coach)).await;
    let manager = app.account("manager", Some(Role::Manager)).await;

    app.insert_booking(main, Some(coach.account.id), "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "approved")
        .await;
    app.insert_booking(main, None, "2030-05-11T10:00:00Z", "2030-05-11T11:00:00Z", "pending")
        .await;

    let (_, mine) = app.get("/bookings", Some(&coach.token)).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);

    let (_, all) = app.get("/bookings", Some(&manager.token)).await;
    assert_eq!(all.as_array().unwrap().len(), 2);

    let (status, _) = app.get("/bookings", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_creator_or_privileged_may_touch_a_booking() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let owner = app.account("owner", Some(Role::Coach)).await;
    let other = app.account("other", Some(Role::Coach)).await;
    let secretary = app.account("sec", Some(Role::Secretary)).await;
    let id = app
        .insert_booking(main, Some(owner.account.id), "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z", "approved")
        .await;
    let uri = format!("/bookings/{id}");

    let (status, _) = app.get(&uri, Some(&other.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let body = form(main, "2030-05-12T10:00:00Z", "2030-05-12T11:00:00Z");
    let (status, _) = app.put(&uri, Some(&other.token), body).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.delete(&uri, Some(&other.token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.get(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = app.delete(&uri, Some(&secretary.token)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get(&uri, Some(&owner.token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn moving_a_booking_reruns_the_conflict_check() {
    let app = TestApp::new().await;
    let main = main_pitch_with_booking(&app).await;
    let coach = app.account("coach", Some(Role::Coach)).await;

    let (_, booking) = app
        .post("/bookings", Some(&coach.token), form(main, "2030-05-10T12:00:00Z", "2030-05-10T13:00:00Z"))
        .await;
    assert_eq!(booking["status"], "approved");
    let uri = format!("/bookings/{}", booking["id"]);

    // Resubmitting the same slot keeps the status
    let (status, same) = app
        .put(&uri, Some(&coach.token), form(main, "2030-05-10T12:00:00Z", "2030-05-10T13:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(same["status"], "approved");

    // Overlapping only its own old slot is not a conflict
    let (_, shifted) = app
        .put(&uri, Some(&coach.token), form(main, "2030-05-10T12:30:00Z", "2030-05-10T13:30:00Z"))
        .await;
    assert_eq!(shifted["status"], "approved");

    let (_, moved) = app
        .put(&uri, Some(&coach.token), form(main, "2030-05-10T10:30:00Z", "2030-05-10T12:00:00Z"))
        .await;
    assert_eq!(moved["status"], "conflicting");
    assert_eq!(moved["start_time"], "2030-05-10T10:30:00Z");
}

#[tokio::test]
async fn editing_keeps_the_recorded_channel() {
    let app = TestApp::new().await;
    let main = app.pitch("Main Pitch").await;
    let manager = app.account("manager", Some(Role::Manager)).await;
    let chairman = app.account("chair", Some(Role::Chairman)).await;

    let body = with(
        form(main, "2030-05-10T10:00:00Z", "2030-05-10T11:00:00Z"),
        "method",
        json!("phone"),
    );
    let (status, booking) = app.post("/bookings", Some(&manager.token), body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["method"], "phone");
    let uri = format!("/bookings/{}", booking["id"]);

    // A chairman fixing the contact number leaves the channel alone
    let (status, edited) = app
        .put(&uri, Some(&chairman.token), with(body.clone(), "phone", json!("087 123 4567")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(edited["phone"], "087 123 4567");
    assert_eq!(edited["method"], "phone");

    // Managers may switch between phone and email, but not to web
    let (status, err) = app
        .put(&uri, Some(&manager.token), with(body.clone(), "method", json!("web")))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(err["fields"]["method"].is_array());

    let (status, switched) = app
        .put(&uri, Some(&manager.token), with(body, "method", json!("email")))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(switched["method"], "email");
}
