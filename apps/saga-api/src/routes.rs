use axum::{
	Json, Router,
	extract::{Query, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use saga_service::{ChatRequest, ChatResponse, RebuildReport, Recommendation, ServiceError};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/recommend/chat", post(chat))
		.route("/v1/recommend/popular", get(popular))
		.route("/v1/recommend/personalized", get(personalized))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new().route("/v1/admin/rebuild_index", post(rebuild_index)).with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn chat(
	State(state): State<AppState>,
	Json(payload): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, ApiError> {
	let response = state.service.process_prompt(payload).await?;
	Ok(Json(response))
}

async fn popular(State(state): State<AppState>) -> Json<Vec<Recommendation>> {
	Json(state.service.popular())
}

#[derive(Debug, Deserialize)]
struct PersonalizedParams {
	user_id: Option<i64>,
}

async fn personalized(
	State(state): State<AppState>,
	Query(params): Query<PersonalizedParams>,
) -> Result<Json<Vec<Recommendation>>, ApiError> {
	let Some(user_id) = params.user_id else {
		return Err(json_error(
			StatusCode::UNAUTHORIZED,
			"unauthorized",
			"A user identity is required for personalized recommendations.",
		));
	};
	let (recommendations, _) = state.service.recommend("", Some(user_id)).await?;
	Ok(Json(recommendations))
}

async fn rebuild_index(State(state): State<AppState>) -> Result<Json<RebuildReport>, ApiError> {
	let report = state.service.rebuild_index().await?;
	Ok(Json(report))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}

pub fn json_error(status: StatusCode, code: &str, message: impl Into<String>) -> ApiError {
	ApiError { status, error_code: code.to_string(), message: message.into() }
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				json_error(StatusCode::BAD_REQUEST, "invalid_request", message),
			// Without a working embedding capability no retrieval is
			// possible at all; make that diagnosable from the client.
			ServiceError::Provider { message } => json_error(
				StatusCode::INTERNAL_SERVER_ERROR,
				"recommender_init_failed",
				message,
			),
			ServiceError::Index { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "index_error", message),
			ServiceError::Storage { message } =>
				json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
