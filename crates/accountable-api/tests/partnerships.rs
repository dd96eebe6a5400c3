#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use common::{TestApp, uuid_of};

#[tokio::test]
async fn request_creates_pending_partnership_and_notifies() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;

    let res = app
        .post(
            "/partnerships",
            &alice.token,
            json!({
                "partner_email": "bob@example.com",
                "message": "Keep me honest",
                "agreement": { "check_in_days": ["monday", "thursday"], "feedback_style": "direct" },
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "pending");
    assert_eq!(uuid_of(&res.body["user_one"]), alice.id);
    assert_eq!(uuid_of(&res.body["user_two"]), bob.id);
    let pid = uuid_of(&res.body["id"]);

    let agreement = app
        .get(&format!("/partnerships/{pid}/agreement"), &bob.token)
        .await;
    assert_eq!(agreement.status, StatusCode::OK);
    assert_eq!(agreement.body["feedback_style"], "direct");

    let notes = app.get("/notifications", &bob.token).await;
    assert_eq!(notes.body[0]["type"], "partnership_request");
    assert_eq!(uuid_of(&notes.body[0]["related_entity_id"]), pid);
}

#[tokio::test]
async fn unknown_partner_and_self_requests_are_rejected() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;

    let unknown = app
        .post("/partnerships", &alice.token, json!({ "partner_email": "ghost@example.com" }))
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);

    let myself = app
        .post("/partnerships", &alice.token, json!({ "partner_email": "alice@example.com" }))
        .await;
    assert_eq!(myself.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn one_live_partnership_per_pair_in_either_direction() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;
    app.request_partnership(&alice, &bob).await;

    let same = app
        .post("/partnerships", &alice.token, json!({ "partner_email": bob.email }))
        .await;
    assert_eq!(same.status, StatusCode::CONFLICT);

    let reversed = app
        .post("/partnerships", &bob.token, json!({ "partner_email": alice.email }))
        .await;
    assert_eq!(reversed.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn only_the_recipient_accepts_or_declines() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;
    let pid = app.request_partnership(&alice, &bob).await;

    let accept = app
        .post_empty(&format!("/partnerships/{pid}/accept"), &alice.token)
        .await;
    assert_eq!(accept.status, StatusCode::FORBIDDEN);

    let decline = app
        .post_empty(&format!("/partnerships/{pid}/decline"), &alice.token)
        .await;
    assert_eq!(decline.status, StatusCode::FORBIDDEN);

    let still = app.get(&format!("/partnerships/{pid}"), &alice.token).await;
    assert_eq!(still.body["status"], "pending");
}

#[tokio::test]
async fn accept_starts_trial_and_finalize_activates() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;
    let pid = app.request_partnership(&alice, &bob).await;

    // Finalizing is only possible from trial.
    let early = app
        .post_empty(&format!("/partnerships/{pid}/finalize"), &alice.token)
        .await;
    assert_eq!(early.status, StatusCode::BAD_REQUEST);

    let accepted = app
        .post_empty(&format!("/partnerships/{pid}/accept"), &bob.token)
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.body["status"], "trial");
    assert!(accepted.body["trial_end_date"].is_string());

    let again = app
        .post_empty(&format!("/partnerships/{pid}/accept"), &bob.token)
        .await;
    assert_eq!(again.status, StatusCode::BAD_REQUEST);

    let notes = app.get("/notifications", &alice.token).await;
    assert_eq!(notes.body[0]["type"], "partnership_accepted");

    let active = app
        .post_empty(&format!("/partnerships/{pid}/finalize"), &alice.token)
        .await;
    assert_eq!(active.status, StatusCode::OK);
    assert_eq!(active.body["status"], "active");
    assert!(active.body["trial_end_date"].is_null());

    let end = app
        .post_empty(&format!("/partnerships/{pid}/end-trial"), &bob.token)
        .await;
    assert_eq!(end.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn decline_ends_and_frees_the_pair() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;
    let pid = app.request_partnership(&alice, &bob).await;

    let declined = app
        .post_empty(&format!("/partnerships/{pid}/decline"), &bob.token)
        .await;
    assert_eq!(declined.status, StatusCode::OK);
    assert_eq!(declined.body["status"], "ended");

    let notes = app.get("/notifications", &alice.token).await;
    assert_eq!(notes.body[0]["type"], "partnership_declined");

    // An ended partnership no longer blocks a new request.
    app.request_partnership(&bob, &alice).await;
}

#[tokio::test]
async fn end_trial_by_either_member() {
    let app = TestApp::new();
    let (alice, bob, pid) = app.trial_pair().await;

    let ended = app
        .post_empty(&format!("/partnerships/{pid}/end-trial"), &alice.token)
        .await;
    assert_eq!(ended.status, StatusCode::OK);
    assert_eq!(ended.body["status"], "ended");

    let notes = app.get("/notifications", &bob.token).await;
    assert_eq!(notes.body[0]["type"], "partnership_ended");
}

#[tokio::test]
async fn outsiders_cannot_see_a_partnership() {
    let app = TestApp::new();
    let (_, _, pid) = app.trial_pair().await;
    let eve = app.member("eve@example.com").await;

    let res = app.get(&format!("/partnerships/{pid}"), &eve.token).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let accept = app
        .post_empty(&format!("/partnerships/{pid}/accept"), &eve.token)
        .await;
    assert_eq!(accept.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_rejects_illegal_status_changes() {
    let app = TestApp::new();
    let (alice, _, pid) = app.trial_pair().await;

    let back = app
        .call(
            Method::PUT,
            &format!("/partnerships/{pid}"),
            Some(&alice.token),
            Some(json!({ "status": "pending" })),
        )
        .await;
    assert_eq!(back.status, StatusCode::BAD_REQUEST);

    let forward = app
        .call(
            Method::PUT,
            &format!("/partnerships/{pid}"),
            Some(&alice.token),
            Some(json!({ "status": "active" })),
        )
        .await;
    assert_eq!(forward.status, StatusCode::OK);
    assert_eq!(forward.body["status"], "active");
}

#[tokio::test]
async fn update_follows_the_recipient_rule() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    let bob = app.member("bob@example.com").await;
    let pid = app.request_partnership(&alice, &bob).await;
    let uri = format!("/partnerships/{pid}");

    for status in ["trial", "ended"] {
        let res = app
            .call(Method::PUT, &uri, Some(&alice.token), Some(json!({ "status": status })))
            .await;
        assert_eq!(res.status, StatusCode::FORBIDDEN, "{status}");
    }
    let still = app.get(&uri, &alice.token).await;
    assert_eq!(still.body["status"], "pending");

    let before = Utc::now();
    let accepted = app
        .call(Method::PUT, &uri, Some(&bob.token), Some(json!({ "status": "trial" })))
        .await;
    assert_eq!(accepted.status, StatusCode::OK);
    assert_eq!(accepted.body["status"], "trial");
    let trial_end: DateTime<Utc> = serde_json::from_value(accepted.body["trial_end_date"].clone()).unwrap();
    assert!(trial_end >= before + Duration::days(14));

    let notes = app.get("/notifications", &alice.token).await;
    assert_eq!(notes.body[0]["type"], "partnership_accepted");
}

#[tokio::test]
async fn list_filters_by_status() {
    let app = TestApp::new();
    let (alice, _, _) = app.trial_pair().await;
    let carol = app.member("carol@example.com").await;
    app.request_partnership(&alice, &carol).await;

    let all = app.get("/partnerships", &alice.token).await;
    assert_eq!(all.body.as_array().unwrap().len(), 2);

    let trial = app.get("/partnerships?status=trial", &alice.token).await;
    assert_eq!(trial.body.as_array().unwrap().len(), 1);
    assert_eq!(trial.body[0]["status"], "trial");
}

#[tokio::test]
async fn search_needs_three_characters() {
    let app = TestApp::new();
    let alice = app.member("alice@example.com").await;
    app.member("bobby@example.com").await;

    let short = app.get("/users/search?q=bo", &alice.token).await;
    assert_eq!(short.status, StatusCode::BAD_REQUEST);

    let found = app.get("/partnerships/search?q=bob", &alice.token).await;
    assert_eq!(found.status, StatusCode::OK);
    assert_eq!(found.body[0]["email"], "bobby@example.com");

    let not_self = app.get("/users/search?q=alice", &alice.token).await;
    assert_eq!(not_self.body, json!([]));
}
