use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rocket::fairing::{Fairing, Info, Kind};
use rocket::figment::Figment;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome, Request};
use rocket::response::{self, Responder, Response};
use rocket::serde::json::Json;
use rocket::{catch, catchers, get, post, routes, Build, Data, Rocket, State};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info_span, Instrument};
use uuid::Uuid;

use common::Config;

use crate::orchestrator::{Orchestrator, Served, ServiceError, Source};
use crate::records::SummaryRecord;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

/// Application state stored inside Rocket managed state.
#[derive(Clone)]
pub struct AppState {
    pub started_at: DateTime<Utc>,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            started_at: Utc::now(),
            orchestrator,
        }
    }
}

/// Request body for `POST /summaries`. A missing field gets the same error kind as an
/// invalid one.
#[derive(Debug, Deserialize)]
struct CreateRequest {
    url: Option<String>,
    word_count: Option<i64>,
}

/// A stored record plus where it came from.
#[derive(Debug, Serialize)]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub record: SummaryRecord,
    pub source: Source,
}

impl From<Served> for SummaryResponse {
    fn from(served: Served) -> Self {
        Self {
            record: served.record,
            source: served.source,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: &'static str,
    detail: String,
}

fn status_for(err: &ServiceError) -> Status {
    match err {
        ServiceError::InvalidReference(_) => Status::BadRequest,
        ServiceError::OutOfRangeParameter(_) => Status::UnprocessableEntity,
        ServiceError::NotFound => Status::NotFound,
        ServiceError::ContentFetchFailure(_) => Status::BadGateway,
        ServiceError::Storage(_) => Status::InternalServerError,
    }
}

impl<'r> Responder<'r, 'static> for ServiceError {
    fn respond_to(self, req: &'r Request<'_>) -> response::Result<'static> {
        let status = status_for(&self);
        let detail = match &self {
            ServiceError::Storage(err) => {
                error!("storage failure: {:#}", err);
                "internal storage error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(ErrorBody {
            kind: self.kind(),
            detail,
        });
        Response::build_from(body.respond_to(req)?).status(status).ok()
    }
}

/// Per-request correlation id, taken from the incoming header or generated.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

impl RequestId {
    fn of<'a>(req: &'a Request<'_>) -> &'a RequestId {
        req.local_cache(|| {
            let incoming = req
                .headers()
                .get_one(REQUEST_ID_HEADER)
                .map(str::trim)
                .filter(|id| !id.is_empty() && id.len() <= 128 && id.is_ascii());
            RequestId(incoming.map(String::from).unwrap_or_else(|| Uuid::new_v4().to_string()))
        })
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequestId {
    type Error = std::convert::Infallible;

    async fn from_request(req: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        Outcome::Success(RequestId::of(req).clone())
    }
}

/// Adds cache and hardening headers plus `X-Request-ID` to every response.
pub struct ResponseHeaders;

#[rocket::async_trait]
impl Fairing for ResponseHeaders {
    fn info(&self) -> Info {
        Info {
            name: "Response headers",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, req: &mut Request<'_>, _data: &mut Data<'_>) {
        RequestId::of(req);
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        res.set_raw_header("Cache-Control", "no-store");
        res.set_raw_header("Pragma", "no-cache");
        res.set_raw_header("X-Content-Type-Options", "nosniff");
        res.set_raw_header("X-Frame-Options", "DENY");
        res.set_raw_header("Referrer-Policy", "no-referrer");
        res.set_raw_header(REQUEST_ID_HEADER, RequestId::of(req).0.clone());
    }
}

#[post("/summaries", data = "<body>")]
async fn create_summary(
    state: &State<AppState>,
    request_id: RequestId,
    body: Json<CreateRequest>,
) -> Result<Json<SummaryResponse>, ServiceError> {
    let span = info_span!("create_summary", request_id = %request_id.0);
    async move {
        let body = body.into_inner();
        let url = body
            .url
            .ok_or_else(|| ServiceError::InvalidReference("url is required".to_string()))?;
        let word_count = body.word_count.ok_or_else(|| {
            ServiceError::OutOfRangeParameter("word_count is required".to_string())
        })?;

        let served = state.orchestrator.handle_create(&url, word_count).await?;
        Ok::<_, ServiceError>(Json(SummaryResponse::from(served)))
    }
    .instrument(span)
    .await
}

#[get("/summaries?<url>&<word_count>")]
async fn lookup_summary(
    state: &State<AppState>,
    request_id: RequestId,
    url: Option<&str>,
    word_count: Option<&str>,
) -> Result<Json<SummaryResponse>, ServiceError> {
    let span = info_span!("lookup_summary", request_id = %request_id.0);
    async move {
        let url = url.ok_or_else(|| ServiceError::InvalidReference("url is required".to_string()))?;
        let word_count = word_count.map(parse_word_count).transpose()?;
        let served = state.orchestrator.handle_lookup(url, word_count).await?;
        Ok::<_, ServiceError>(Json(SummaryResponse::from(served)))
    }
    .instrument(span)
    .await
}

/// A present but unparsable `word_count` is an error, not an absent filter.
fn parse_word_count(raw: &str) -> Result<i64, ServiceError> {
    raw.trim().parse::<i64>().map_err(|_| {
        ServiceError::OutOfRangeParameter(format!("word_count must be an integer, got '{raw}'"))
    })
}

#[get("/health/live")]
async fn live() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[get("/health/ready")]
async fn ready(state: &State<AppState>) -> (Status, Json<serde_json::Value>) {
    let uptime_seconds = (Utc::now() - state.started_at).num_seconds();
    match state.orchestrator.store().ping().await {
        Ok(()) => (
            Status::Ok,
            Json(json!({ "status": "ok", "checks": { "db": "ok" }, "uptime_seconds": uptime_seconds })),
        ),
        Err(e) => {
            error!("readiness check failed: {:#}", e);
            (
                Status::ServiceUnavailable,
                Json(json!({ "status": "unavailable", "checks": { "db": "error" } })),
            )
        }
    }
}

#[catch(default)]
fn default_catcher(status: Status, _req: &Request<'_>) -> (Status, Json<serde_json::Value>) {
    let kind = match status.code {
        400 => "bad_request",
        404 => "not_found",
        422 => "unprocessable_entity",
        _ if status.code >= 500 => "internal_error",
        _ => "client_error",
    };
    let detail = status.reason().unwrap_or("request failed");
    (status, Json(json!({ "kind": kind, "detail": detail })))
}

/// Assemble the Rocket instance without launching it. Tests drive this through
/// `rocket::local`.
pub fn build_rocket(state: AppState, figment: Figment) -> Rocket<Build> {
    rocket::custom(figment)
        .manage(state)
        .attach(ResponseHeaders)
        .mount("/", routes![create_summary, lookup_summary, live, ready])
        .register("/", catchers![default_catcher])
}

/// Launch the HTTP server and block until it shuts down.
///
/// The pool and migrations are the caller's job; this only binds and serves.
pub async fn launch_rocket(state: AppState, config: &Config) -> Result<()> {
    let figment = rocket::Config::figment()
        .merge(("address", config.server.bind.clone()))
        .merge(("port", config.server.port));

    tracing::info!(bind = %config.server.bind, port = config.server.port, "Starting Rocket HTTP server");
    build_rocket(state, figment)
        .launch()
        .await
        .map_err(|e| anyhow!("Rocket failed: {}", e))?;

    tracing::info!("Rocket HTTP server has shut down");
    Ok(())
}
