pub mod config;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use service_core::axum::{
    extract::State,
    middleware::from_fn,
    routing::{get, post, put},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{make_request_span, metrics_middleware, request_id_middleware};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::services::{
    ActivitySink, ChannelActivitySink, LifecycleEngine, Ledger, StaffDirectory, Store,
    StoreDirectory,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub engine: Arc<LifecycleEngine>,
    pub ledger: Arc<Ledger>,
    pub activity: Arc<ChannelActivitySink>,
}

impl AppState {
    /// Wire the engine, ledger and activity writer over `store` and seed the stage
    /// catalogue. Must be called from within a Tokio runtime.
    pub async fn build(config: Config, store: Arc<dyn Store>) -> Result<Self, AppError> {
        let retry = config.lifecycle.retry_policy();

        let (sink, _writer) =
            ChannelActivitySink::spawn(store.clone(), config.lifecycle.activity_buffer);
        let activity = Arc::new(sink);
        let activity_sink: Arc<dyn ActivitySink> = activity.clone();

        let ledger = Arc::new(Ledger::new(store.clone(), activity_sink.clone(), retry.clone()));
        let directory: Arc<dyn StaffDirectory> = Arc::new(StoreDirectory::new(store.clone()));
        let engine = Arc::new(LifecycleEngine::new(
            store.clone(),
            directory,
            activity_sink,
            ledger.clone(),
            retry,
            config.lifecycle.default_tax_rate,
        ));

        engine.stages().ensure_seeded().await?;

        Ok(Self {
            config,
            store,
            engine,
            ledger,
            activity,
        })
    }
}

pub async fn build_router(state: AppState) -> Result<Router, AppError> {
    let order_routes = Router::new()
        .route("/orders", post(handlers::create_order))
        .route(
            "/orders/:id",
            get(handlers::get_order).delete(handlers::delete_order),
        )
        .route("/orders/:id/items", put(handlers::update_order_items))
        .route("/orders/:id/assign", post(handlers::assign_engineer))
        .route("/orders/:id/stage", post(handlers::move_stage))
        .route(
            "/orders/:id/status",
            service_core::axum::routing::patch(handlers::update_order_status),
        )
        .route("/orders/:id/payments", post(handlers::add_order_payment))
        .route("/orders/:id/notes", post(handlers::add_order_note))
        .route("/orders/:id/activity", get(handlers::list_order_activity))
        .route("/orders/:id/reconcile", post(handlers::reconcile_order))
        .route(
            "/orders/:id/sub-tasks",
            post(handlers::create_sub_task).get(handlers::list_sub_tasks),
        )
        .route("/orders/:id/invoices", get(handlers::list_order_invoices))
        .route(
            "/orders/:id/ledger-payments",
            get(handlers::list_order_payments),
        )
        .route("/engineers/:id/work-items", get(handlers::list_work_items));

    let sub_task_routes = Router::new()
        .route(
            "/sub-tasks/:id",
            get(handlers::get_sub_task)
                .patch(handlers::update_sub_task)
                .delete(handlers::delete_sub_task),
        )
        .route(
            "/sub-tasks/:id/status",
            service_core::axum::routing::patch(handlers::update_sub_task_status),
        )
        .route("/sub-tasks/:id/reassign", post(handlers::reassign_sub_task))
        .route("/sub-tasks/:id/updates", post(handlers::add_sub_task_update))
        .route("/sub-tasks/:id/history", get(handlers::sub_task_history));

    let ledger_routes = Router::new()
        .route("/invoices", post(handlers::generate_invoice))
        .route("/invoices/:id", get(handlers::get_invoice))
        .route("/invoices/:id/reconcile", post(handlers::reconcile_invoice))
        .route("/payments", post(handlers::record_payment))
        .route(
            "/payments/:id",
            service_core::axum::routing::delete(handlers::delete_payment),
        );

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .route("/stages", get(handlers::list_stages))
        .merge(order_routes)
        .merge(sub_task_routes)
        .merge(ledger_routes)
        .with_state(state)
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(make_request_span::<service_core::axum::body::Body>),
        )
        .layer(from_fn(request_id_middleware));

    Ok(app)
}

/// Liveness probe.
pub async fn health_check(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": state.config.service_name,
    }))
}

/// Readiness probe: the store answers and the stage catalogue has an initial stage.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.ping().await.map_err(|e| {
        tracing::error!(error = %e, "Store readiness check failed");
        e
    })?;
    let initial = state.engine.stages().find_initial().await?;

    Ok(Json(serde_json::json!({
        "status": "ready",
        "service": state.config.service_name,
        "checks": {
            "store": "up",
            "initial_stage": initial.slug,
        }
    })))
}
