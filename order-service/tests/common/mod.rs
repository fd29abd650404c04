#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use order_service::{
    build_router,
    config::Config,
    models::{Actor, Staff, StaffRole, StaffStatus},
    services::lifecycle::NewOrder,
    services::{MemoryStore, Store},
    AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const COMPANY: &str = "acme-repairs";
pub const ENGINEER: &str = "eng-1";
pub const SECOND_ENGINEER: &str = "eng-2";
pub const RECEPTIONIST: &str = "rec-1";
pub const INACTIVE_ENGINEER: &str = "eng-gone";

pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    pub router: Router,
}

impl TestApp {
    /// Engine over a fresh in-memory store with seeded stages and staff.
    pub async fn spawn() -> Self {
        Self::spawn_with(Config::for_tests()).await
    }

    pub async fn spawn_with(config: Config) -> Self {
        let store = Arc::new(MemoryStore::new());
        let dyn_store: Arc<dyn Store> = store.clone();
        let state = AppState::build(config, dyn_store)
            .await
            .expect("Failed to build state");

        for (id, name, role, status) in [
            (ENGINEER, "Ravi Kumar", StaffRole::Engineer, StaffStatus::Active),
            (SECOND_ENGINEER, "Meena Iyer", StaffRole::Engineer, StaffStatus::Active),
            (RECEPTIONIST, "Asha Rao", StaffRole::Reception, StaffStatus::Active),
            (INACTIVE_ENGINEER, "Old Hand", StaffRole::Engineer, StaffStatus::Inactive),
        ] {
            store
                .upsert_staff(&Staff {
                    id: id.to_string(),
                    company_id: COMPANY.to_string(),
                    full_name: name.to_string(),
                    email: None,
                    role,
                    status,
                })
                .await
                .expect("Failed to seed staff");
        }

        let router = build_router(state.clone())
            .await
            .expect("Failed to build router");

        Self {
            state,
            store,
            router,
        }
    }

    pub fn actor() -> Actor {
        Actor::new(COMPANY, "manager-1", "Shop Manager")
    }

    /// Wait for queued activity entries to reach the store.
    pub async fn flush(&self) {
        self.state.activity.flush().await;
    }

    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .header("x-company-id", COMPANY)
            .header("x-user-id", "manager-1")
            .header("x-user-name", "Shop Manager");
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }
}

pub fn service(name: &str, unit_price: &str) -> Value {
    json!({
        "kind": "service",
        "name": name,
        "quantity": 1,
        "unit_price": unit_price,
        "tax_rate": "18",
    })
}

/// Two services, 1000 and 500, at 18% intrastate.
pub fn two_service_order() -> Value {
    json!({
        "customer": { "name": "Priya Sharma", "phone": "9800000000" },
        "problem_description": "Cracked screen and battery drain",
        "items": [service("Screen replacement", "1000"), service("Battery check", "500")],
        "tax_rate": "18",
        "is_inter_state": false,
    })
}

pub fn new_order(value: Value) -> NewOrder {
    serde_json::from_value(value).expect("valid order payload")
}

pub fn decimal(value: &Value) -> rust_decimal::Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a decimal: {other}"),
    }
}
