#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

use accountable_api::config::Settings;
use accountable_api::email::Mailer;
use accountable_api::routes;
use accountable_api::state::{AppState, AppStateInner};
use accountable_db::Database;

pub const PASSWORD: &str = "correct-horse-battery";

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub struct TestApp {
    pub state: AppState,
    router: Router,
}

/// A signed-in user.
pub struct Member {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let settings = Settings {
            jwt_secret: "integration-test-secret".into(),
            ..Default::default()
        };
        let db = Database::open_in_memory().expect("in-memory database");
        let state = AppStateInner::new(db, settings, Mailer::disabled());
        let router = routes::router(state.clone());
        Self { state, router }
    }

    pub async fn send(&self, req: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };
        TestResponse { status, headers, body }
    }

    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(req).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> TestResponse {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn post_empty(&self, uri: &str, token: &str) -> TestResponse {
        self.call(Method::POST, uri, Some(token), None).await
    }

    pub async fn register(&self, email: &str, invitation_token: Option<&str>) -> TestResponse {
        let name = email.split('@').next().unwrap_or("user");
        let body = json!({
            "email": email,
            "password": PASSWORD,
            "first_name": name,
            "last_name": "Tester",
            "time_zone": "UTC",
            "avatar_url": null,
            "invitation_token": invitation_token,
        });
        self.call(Method::POST, "/auth/register", None, Some(body)).await
    }

    pub async fn login(&self, email: &str, password: &str) -> TestResponse {
        let form = format!("username={email}&password={password}");
        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth/login")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(form))
            .unwrap();
        self.send(req).await
    }

    /// Register and log in.
    pub async fn member(&self, email: &str) -> Member {
        self.member_with_invitation(email, None).await
    }

    pub async fn member_with_invitation(&self, email: &str, invitation_token: Option<&str>) -> Member {
        let registered = self.register(email, invitation_token).await;
        assert_eq!(registered.status, StatusCode::CREATED, "{:?}", registered.body);
        let login = self.login(email, PASSWORD).await;
        assert_eq!(login.status, StatusCode::OK, "{:?}", login.body);
        Member {
            id: uuid_of(&registered.body["id"]),
            email: email.to_string(),
            token: login.body["access_token"].as_str().unwrap().to_string(),
        }
    }

    /// `from` asks `to` to partner up; returns the pending partnership id.
    pub async fn request_partnership(&self, from: &Member, to: &Member) -> Uuid {
        let res = self
            .post("/partnerships", &from.token, json!({ "partner_email": to.email }))
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        uuid_of(&res.body["id"])
    }

    /// A partnership between two fresh members, accepted into trial.
    pub async fn trial_pair(&self) -> (Member, Member, Uuid) {
        let alice = self.member("alice@example.com").await;
        let bob = self.member("bob@example.com").await;
        let pid = self.request_partnership(&alice, &bob).await;
        let accepted = self
            .post_empty(&format!("/partnerships/{pid}/accept"), &bob.token)
            .await;
        assert_eq!(accepted.status, StatusCode::OK, "{:?}", accepted.body);
        (alice, bob, pid)
    }
}

pub fn uuid_of(value: &Value) -> Uuid {
    value.as_str().unwrap().parse().unwrap()
}
