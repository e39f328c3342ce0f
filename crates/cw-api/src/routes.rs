//! Route handlers: read the roster, read a member, trigger a refresh.

use crate::dto::{
    FreshnessDto, HealthResponse, MemberDetail, RefreshResponse, RosterResponse,
};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

/// Builds the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/roster", get(get_roster))
        .route("/roster/members/:key", get(get_member))
        .route("/roster/refresh", post(request_refresh))
        .with_state(state)
}

/// Health check; reports whether a snapshot has ever been published.
async fn health(State(state): State<AppState>) -> Result<Json<HealthResponse>, ApiError> {
    let snapshot = state.service.current_roster().await?;
    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        populated: snapshot.is_some(),
        freshness: snapshot.as_ref().map(|s| FreshnessDto::from(&s.freshness)),
    }))
}

/// The current reconciled roster with freshness metadata.
async fn get_roster(State(state): State<AppState>) -> Result<Json<RosterResponse>, ApiError> {
    let snapshot = state
        .service
        .current_roster()
        .await?
        .ok_or(ApiError::NotPopulated)?;
    Ok(Json(RosterResponse::from(snapshot.as_ref())))
}

/// Detail for one member by identity key.
async fn get_member(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MemberDetail>, ApiError> {
    if state.service.current_roster().await?.is_none() {
        return Err(ApiError::NotPopulated);
    }
    let member = state
        .service
        .member_detail(&key)
        .await?
        .ok_or_else(|| ApiError::NotFound(key))?;
    Ok(Json(MemberDetail::from(&member)))
}

/// Requests a refresh; coalesced with any in-flight cycle.
async fn request_refresh(
    State(state): State<AppState>,
) -> Result<Json<RefreshResponse>, ApiError> {
    let outcome = state.service.request_refresh().await;
    Ok(Json(RefreshResponse { outcome }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cw_core::{
        CrewService, MemorySnapshotStore, RawCrewRecord, Reconciler, ReconcilerConfig,
        RefreshScheduler, RosterSource, SchedulerConfig, SourceResult,
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    struct FixedSource;

    #[async_trait::async_trait]
    impl RosterSource for FixedSource {
        fn id(&self) -> &str {
            "fixed"
        }

        async fn fetch_roster(&self) -> SourceResult<Vec<RawCrewRecord>> {
            Ok(vec![RawCrewRecord::named("Jane Doe")
                .with_attribute(cw_core::ATTR_LOCATION, "ISS")
                .with_attribute(cw_core::ATTR_STATUS, "active")])
        }
    }

    fn test_state() -> (AppState, Arc<RefreshScheduler>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let sources: Vec<Arc<dyn RosterSource>> = vec![Arc::new(FixedSource)];
        let scheduler = Arc::new(RefreshScheduler::new(
            SchedulerConfig::default(),
            sources,
            Reconciler::new(ReconcilerConfig::new(["fixed"])),
            store.clone(),
        ));
        (
            AppState::new(CrewService::new(store, scheduler.clone())),
            scheduler,
        )
    }

    async fn request(
        router: Router,
        method: &str,
        uri: &str,
    ) -> axum::http::Response<axum::body::Body> {
        router
            .oneshot(
                axum::http::Request::builder()
                    .method(method)
                    .uri(uri)
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_roster_before_first_cycle_is_503() {
        let (state, _) = test_state();
        let response = request(create_router(state), "GET", "/roster").await;
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_member_before_first_cycle_is_503() {
        let (state, _) = test_state();
        let response = request(create_router(state), "GET", "/roster/members/jane%20doe").await;
        assert_eq!(response.status(), axum::http::StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_roster_after_cycle_is_200() {
        let (state, scheduler) = test_state();
        scheduler.run_cycle().await;

        let router = create_router(state);
        let response = request(router.clone(), "GET", "/roster").await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        // A member that does not exist in a populated view is a plain 404.
        let response = request(router, "GET", "/roster/members/nobody").await;
        assert_eq!(response.status(), axum::http::StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_refresh_endpoint() {
        let (state, _) = test_state();
        let response = request(create_router(state), "POST", "/roster/refresh").await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }

    #[tokio::test]
    async fn test_health_reports_population() {
        let (state, scheduler) = test_state();
        let router = create_router(state);

        let response = request(router.clone(), "GET", "/health").await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);

        scheduler.run_cycle().await;
        let response = request(router, "GET", "/health").await;
        assert_eq!(response.status(), axum::http::StatusCode::OK);
    }
}
