#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use common::{TestApp, uuid_of};

#[tokio::test]
async fn schedule_complete_once() {
    let app = TestApp::new();
    let (alice, bob, pid) = app.trial_pair().await;

    let at = Utc::now() + Duration::days(2);
    let created = app
        .post(
            "/checkins",
            &alice.token,
            json!({ "partnership_id": pid, "scheduled_at": at, "notes": "Weekly sync" }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED, "{:?}", created.body);
    assert!(created.body["completed_at"].is_null());
    let cid = uuid_of(&created.body["id"]);

    let notes = app.get("/notifications", &bob.token).await;
    assert_eq!(notes.body[0]["type"], "checkin_scheduled");

    let completed = app
        .post(
            &format!("/checkins/{cid}/complete"),
            &bob.token,
            json!({ "notes": "Went well" }),
        )
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    assert!(completed.body["completed_at"].is_string());
    let text = completed.body["notes"].as_str().unwrap();
    assert!(text.starts_with("Weekly sync"));
    assert!(text.ends_with("Went well"));

    let twice = app
        .post_empty(&format!("/checkins/{cid}/complete"), &alice.token)
        .await;
    assert_eq!(twice.status, StatusCode::BAD_REQUEST);

    let remind = app
        .post_empty(&format!("/checkins/{cid}/remind"), &alice.token)
        .await;
    assert_eq!(remind.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn complete_without_a_body() {
    let app = TestApp::new();
    let (alice, _, pid) = app.trial_pair().await;
    let created = app
        .post(
            "/checkins",
            &alice.token,
            json!({ "partnership_id": pid, "scheduled_at": Utc::now() }),
        )
        .await;
    let cid = uuid_of(&created.body["id"]);

    let completed = app
        .post_empty(&format!("/checkins/{cid}/complete"), &alice.token)
        .await;
    assert_eq!(completed.status, StatusCode::OK);
    assert!(completed.body["notes"].is_null());
}

#[tokio::test]
async fn list_filters_and_reschedule() {
    let app = TestApp::new();
    let (alice, bob, pid) = app.trial_pair().await;
    let soon = Utc::now() + Duration::hours(1);
    let later = Utc::now() + Duration::days(7);

    for at in [later, soon] {
        let res = app
            .post("/checkins", &bob.token, json!({ "partnership_id": pid, "scheduled_at": at }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let all = app.get("/checkins", &alice.token).await;
    let rows = all.body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    let first = uuid_of(&rows[0]["id"]);

    let moved = app
        .call(
            Method::PUT,
            &format!("/checkins/{first}"),
            Some(&alice.token),
            Some(json!({ "notes": "Bring the plan" })),
        )
        .await;
    assert_eq!(moved.status, StatusCode::OK);
    assert_eq!(moved.body["notes"], "Bring the plan");

    app.post_empty(&format!("/checkins/{first}/complete"), &alice.token)
        .await;

    let open = app
        .get(&format!("/checkins?partnership_id={pid}&completed=false"), &alice.token)
        .await;
    assert_eq!(open.body.as_array().unwrap().len(), 1);
    let done = app.get("/checkins?completed=true", &bob.token).await;
    assert_eq!(uuid_of(&done.body[0]["id"]), first);
}

#[tokio::test]
async fn reminder_notifies_the_partner() {
    let app = TestApp::new();
    let (alice, bob, pid) = app.trial_pair().await;
    let created = app
        .post(
            "/checkins",
            &alice.token,
            json!({ "partnership_id": pid, "scheduled_at": Utc::now() + Duration::days(1) }),
        )
        .await;
    let cid = uuid_of(&created.body["id"]);

    let res = app.post_empty(&format!("/checkins/{cid}/remind"), &alice.token).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let notes = app.get("/notifications", &bob.token).await;
    assert_eq!(notes.body[0]["type"], "checkin_reminder");
    assert_eq!(uuid_of(&notes.body[0]["related_entity_id"]), cid);
}

#[tokio::test]
async fn outsiders_cannot_touch_checkins() {
    let app = TestApp::new();
    let (alice, _, pid) = app.trial_pair().await;
    let created = app
        .post("/checkins", &alice.token, json!({ "partnership_id": pid, "scheduled_at": Utc::now() }))
        .await;
    let cid = uuid_of(&created.body["id"]);
    let eve = app.member("eve@example.com").await;

    let get = app.get(&format!("/checkins/{cid}"), &eve.token).await;
    assert_eq!(get.status, StatusCode::FORBIDDEN);

    let complete = app.post_empty(&format!("/checkins/{cid}/complete"), &eve.token).await;
    assert_eq!(complete.status, StatusCode::FORBIDDEN);

    let schedule = app
        .post("/checkins", &eve.token, json!({ "partnership_id": pid, "scheduled_at": Utc::now() }))
        .await;
    assert_eq!(schedule.status, StatusCode::NOT_FOUND);

    let missing = app.get(&format!("/checkins/{}", Uuid::new_v4()), &alice.token).await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
}
