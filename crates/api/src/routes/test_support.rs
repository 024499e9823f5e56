//! Router harness over the in-memory adapters.

use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use susu_core::LedgerFacade;
use susu_core::ports::ManualClock;
use susu_core::ports::Ports;
use susu_core::ports::memory::InMemoryHandles;
use susu_shared::LedgerConfig;
use susu_shared::types::{AccountId, Money};
use tower::ServiceExt;

use crate::{AppState, create_router};

pub(crate) struct TestApp {
    router: Router,
    pub(crate) handles: InMemoryHandles,
    pub(crate) clock: Arc<ManualClock>,
}

impl TestApp {
    pub(crate) fn new() -> Self {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
        ));
        let (ports, handles) = Ports::in_memory(clock.clone());
        let facade = LedgerFacade::new(ports, LedgerConfig::default());
        Self {
            router: create_router(AppState::new(facade)),
            handles,
            clock,
        }
    }

    pub(crate) async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub(crate) async fn get(&self, uri: &str) -> Response<Body> {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub(crate) async fn post(&self, uri: &str, body: Value) -> Response<Body> {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub(crate) async fn post_empty(&self, uri: &str) -> Response<Body> {
        self.send(Request::post(uri).body(Body::empty()).unwrap())
            .await
    }

    pub(crate) fn fund(&self, account: &str, amount: i64) {
        self.handles
            .payments
            .deposit(&AccountId::from(account), Money::new(amount));
    }

    pub(crate) async fn register(&self, account: &str) {
        let response = self
            .post(
                "/api/v1/users",
                json!({"accountId": account, "name": format!("User {account}"), "phoneNumber": "+233200000000"}),
            )
            .await;
        assert!(response.status().is_success(), "register {account}");
    }

    /// Registers, verifies and funds a member.
    pub(crate) async fn member(&self, account: &str) {
        self.register(account).await;
        let response = self
            .post(
                &format!("/api/v1/users/{account}/verify"),
                json!({"verifiedBy": "agent"}),
            )
            .await;
        assert!(response.status().is_success(), "verify {account}");
        self.fund(account, 1_000_000);
    }

    /// Creates a circle and fills every seat; returns its id.
    pub(crate) async fn active_circle(&self, accounts: &[&str], contribution: i64) -> String {
        for account in accounts {
            self.member(account).await;
        }
        let seats = u32::try_from(accounts.len()).unwrap();
        let response = self
            .post(
                "/api/v1/circles",
                json!({
                    "name": "Makola traders",
                    "creatorAccountId": accounts[0],
                    "monthlyContribution": contribution,
                    "maxMembers": seats,
                    "emergencyLoansEnabled": true
                }),
            )
            .await;
        assert!(response.status().is_success(), "create circle");
        let circle_id = body_json(response).await["circleId"]
            .as_str()
            .unwrap()
            .to_string();
        for account in &accounts[1..] {
            let response = self
                .post(
                    &format!("/api/v1/circles/{circle_id}/members"),
                    json!({"accountId": account}),
                )
                .await;
            assert!(response.status().is_success(), "join {account}");
        }
        circle_id
    }
}

pub(crate) async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
