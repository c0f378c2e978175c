#![deny(unsafe_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use civicdesk_adapters::InMemoryDirectory;
use civicdesk_core::policy::DENY_BLOCKED;
use civicdesk_core::{
    CivicEngine, CivicError, ContentPatch, EngineConfig, Identity, Issue, IssueDraft, IssueFilter,
    IssueStatus, NewUser, PageRequest, Paged, PaymentKind, PaymentOutcome, PaymentRecord,
    PlatformStats, QuotaPolicyConfig, RegistrationOutcome, SubmissionOutcome, TimelineEntry,
    TimelineStorageConfig, UpvoteOutcome,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub quota: QuotaPolicyConfig,
    pub timeline_storage: TimelineStorageConfig,
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<CivicEngine>,
    /// Kept alongside the trait object so staff/admin accounts can be
    /// provisioned out of band.
    pub directory: Arc<InMemoryDirectory>,
}

impl ServiceState {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let ServiceConfig {
            quota,
            timeline_storage,
        } = config;

        let directory = Arc::new(InMemoryDirectory::new());
        let engine = CivicEngine::bootstrap(
            directory.clone(),
            EngineConfig {
                quota,
                timeline_storage,
            },
        )
        .await
        .map_err(ServiceError::Core)?;

        Ok(Self {
            engine: Arc::new(engine),
            directory,
        })
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/users", post(register_user))
        .route("/v1/users/:email", get(get_user))
        .route("/v1/issues", post(create_issue).get(list_issues))
        .route("/v1/issues/:id", get(get_issue).patch(edit_issue))
        .route("/v1/issues/:id/timeline", get(issue_timeline))
        .route("/v1/issues/:id/upvote", post(upvote_issue))
        .route("/v1/issues/:id/assign", post(assign_issue))
        .route("/v1/issues/:id/status", post(update_status))
        .route("/v1/issues/:id/reject", post(reject_issue))
        .route("/v1/my-issues/:email", get(my_issues))
        .route("/v1/payments", post(record_payment))
        .route("/v1/admin/stats", get(admin_stats))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("core engine error: {0}")]
    Core(#[from] CivicError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] CivicError),
}

impl ApiError {
    fn forbidden(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

/// Policy denials come back as structured bodies from the handlers; this
/// mapping covers real errors: 401 for unresolved identities, 403 for
/// authorization denials, 404 for missing records, 409 for lifecycle
/// violations, 500 for collaborator failures.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Http { status, message } => {
                (status, Json(serde_json::json!({ "error": message }))).into_response()
            }
            ApiError::Core(err) => {
                let status = match &err {
                    CivicError::Unauthenticated => StatusCode::UNAUTHORIZED,
                    CivicError::Forbidden { .. } => StatusCode::FORBIDDEN,
                    CivicError::IssueNotFound(_) | CivicError::UserNotFound(_) => {
                        StatusCode::NOT_FOUND
                    }
                    CivicError::InvalidStatus(_) => StatusCode::BAD_REQUEST,
                    CivicError::InvalidTransition { .. } | CivicError::ContentLocked(_) => {
                        StatusCode::CONFLICT
                    }
                    CivicError::IdentityGate(_)
                    | CivicError::Ledger(_)
                    | CivicError::Storage(_)
                    | CivicError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, Json(serde_json::json!({ "error": err.to_string() }))).into_response()
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    timeline_backend: &'static str,
    timeline_verified: bool,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "civicdesk-service",
        timeline_backend: state.engine.timeline_backend().await,
        timeline_verified: state.engine.verify_timeline().await,
    })
}

#[derive(Debug, Clone, Serialize)]
struct RegisterResponse {
    created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<&'static str>,
    user: Identity,
}

async fn register_user(
    State(state): State<ServiceState>,
    Json(user): Json<NewUser>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let response = match state.engine.register_user(user).await? {
        RegistrationOutcome::Created(identity) => RegisterResponse {
            created: true,
            message: None,
            user: identity,
        },
        RegistrationOutcome::AlreadyExists(identity) => RegisterResponse {
            created: false,
            message: Some("user already exists"),
            user: identity,
        },
    };
    Ok(Json(response))
}

async fn get_user(
    State(state): State<ServiceState>,
    Path(email): Path<String>,
) -> Result<Json<Identity>, ApiError> {
    Ok(Json(state.engine.user(&email).await?))
}

#[derive(Debug, Clone, Serialize)]
struct CreateIssueResponse {
    created: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    issue: Option<Issue>,
}

async fn create_issue(
    State(state): State<ServiceState>,
    Json(draft): Json<IssueDraft>,
) -> Result<Json<CreateIssueResponse>, ApiError> {
    match state.engine.create_issue(draft).await? {
        SubmissionOutcome::Created(issue) => Ok(Json(CreateIssueResponse {
            created: true,
            reason: None,
            issue: Some(issue),
        })),
        SubmissionOutcome::Denied { reason } if reason == DENY_BLOCKED => {
            Err(ApiError::forbidden("you are blocked from posting issues"))
        }
        SubmissionOutcome::Denied { reason } => Ok(Json(CreateIssueResponse {
            created: false,
            reason: Some(reason),
            issue: None,
        })),
    }
}

#[derive(Debug, Clone, Deserialize)]
struct IssuesQuery {
    search: Option<String>,
    status: Option<String>,
    category: Option<String>,
    page: Option<u64>,
    limit: Option<u64>,
}

async fn list_issues(
    State(state): State<ServiceState>,
    Query(query): Query<IssuesQuery>,
) -> Result<Json<Paged<Issue>>, ApiError> {
    let status = match query.status.as_deref() {
        None => None,
        Some(value) => Some(IssueStatus::parse(value).map_err(|_| {
            ApiError::bad_request(format!(
                "invalid status '{}'; expected one of: pending, in-progress, resolved, rejected, closed",
                value
            ))
        })?),
    };

    let filter = IssueFilter {
        search: query.search,
        status,
        category: query.category,
    };
    let page = PageRequest::new(
        query.page.unwrap_or(1),
        query.limit.unwrap_or(10).min(100),
    );

    Ok(Json(state.engine.list_issues(&filter, page).await))
}

async fn get_issue(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(state.engine.issue(id).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct EditIssueRequest {
    reporter_email: String,
    #[serde(flatten)]
    patch: ContentPatch,
}

async fn edit_issue(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(request): Json<EditIssueRequest>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(
        state
            .engine
            .update_content(id, &request.reporter_email, request.patch)
            .await?,
    ))
}

async fn issue_timeline(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEntry>>, ApiError> {
    Ok(Json(state.engine.timeline(id).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct UpvoteRequest {
    user_email: String,
}

#[derive(Debug, Clone, Serialize)]
struct UpvoteResponse {
    applied: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    upvotes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

async fn upvote_issue(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(request): Json<UpvoteRequest>,
) -> Result<Json<UpvoteResponse>, ApiError> {
    let response = match state.engine.upvote(id, &request.user_email).await? {
        UpvoteOutcome::Applied { upvotes } => UpvoteResponse {
            applied: true,
            upvotes: Some(upvotes),
            reason: None,
        },
        UpvoteOutcome::Rejected { reason } => UpvoteResponse {
            applied: false,
            upvotes: None,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

#[derive(Debug, Clone, Deserialize)]
struct AssignRequest {
    staff_email: String,
    actor_email: String,
}

async fn assign_issue(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(request): Json<AssignRequest>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(
        state
            .engine
            .assign(id, &request.staff_email, &request.actor_email)
            .await?,
    ))
}

#[derive(Debug, Clone, Deserialize)]
struct StatusUpdateRequest {
    status: String,
    actor_email: String,
}

async fn update_status(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusUpdateRequest>,
) -> Result<Json<Issue>, ApiError> {
    let status = IssueStatus::parse(&request.status).map_err(|_| {
        ApiError::bad_request(format!(
            "invalid status '{}'; expected one of: pending, in-progress, resolved, rejected, closed",
            request.status
        ))
    })?;

    Ok(Json(
        state
            .engine
            .update_status(id, status, &request.actor_email)
            .await?,
    ))
}

#[derive(Debug, Clone, Deserialize)]
struct RejectRequest {
    actor_email: String,
}

async fn reject_issue(
    State(state): State<ServiceState>,
    Path(id): Path<Uuid>,
    Json(request): Json<RejectRequest>,
) -> Result<Json<Issue>, ApiError> {
    Ok(Json(state.engine.reject(id, &request.actor_email).await?))
}

async fn my_issues(
    State(state): State<ServiceState>,
    Path(email): Path<String>,
) -> Json<Vec<Issue>> {
    Json(state.engine.my_issues(&email).await)
}

#[derive(Debug, Clone, Deserialize)]
struct PaymentRequest {
    email: String,
    name: String,
    #[serde(flatten)]
    kind: PaymentKind,
    amount_minor: u64,
}

#[derive(Debug, Clone, Serialize)]
struct PaymentResponse {
    recorded: bool,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    issue: Option<Issue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
}

async fn record_payment(
    State(state): State<ServiceState>,
    Json(request): Json<PaymentRequest>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let record = PaymentRecord {
        payment_id: Uuid::new_v4(),
        email: request.email,
        payer_name: request.name,
        kind: request.kind,
        amount_minor: request.amount_minor,
        paid_at: Utc::now(),
    };

    let response = match state.engine.record_payment(record).await? {
        PaymentOutcome::SubscriptionActivated { .. } => PaymentResponse {
            recorded: true,
            outcome: "subscription_activated",
            issue: None,
            reason: None,
        },
        PaymentOutcome::Boosted(issue) => PaymentResponse {
            recorded: true,
            outcome: "boosted",
            issue: Some(issue),
            reason: None,
        },
        PaymentOutcome::BoostSkipped { reason } => PaymentResponse {
            recorded: true,
            outcome: "boost_skipped",
            issue: None,
            reason: Some(reason),
        },
    };
    Ok(Json(response))
}

async fn admin_stats(
    State(state): State<ServiceState>,
) -> Result<Json<PlatformStats>, ApiError> {
    Ok(Json(state.engine.stats().await?))
}
