use std::sync::Arc;

use axum::{
	body::{self, Body},
	http::{Request, StatusCode},
};
use tower::util::ServiceExt;

use saga_api::{routes, state::AppState};
use saga_service::{Providers, RecommenderService};
use saga_testkit::{HashEmbedder, KeywordRerank, MemoryInteractions, TestWorkspace};

fn test_state(workspace: &TestWorkspace) -> AppState {
	let providers = Providers::new(
		Arc::new(HashEmbedder),
		Arc::new(KeywordRerank { keyword: "magic".to_string() }),
	);
	let service = RecommenderService::with_providers(
		workspace.config(),
		Arc::new(MemoryInteractions::default()),
		providers,
	);

	AppState { service: Arc::new(service) }
}

fn sample_catalog(workspace: &TestWorkspace) {
	workspace.write_catalog(
		"id,title,author,genre,description\n\
		 1,Starfall,Ada Vale,space opera,space opera galaxy fleet\n\
		 2,Dragonspire,Mia Holt,fantasy,dragon wizard magic tower\n\
		 3,Voidrunner,Ada Vale,space opera,space opera smuggler crew\n",
	);
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");

	serde_json::from_slice(&bytes).expect("Failed to parse response.")
}

#[tokio::test]
async fn health_ok() {
	let workspace = TestWorkspace::new();

	sample_catalog(&workspace);

	let app = routes::router(test_state(&workspace));
	let response = app
		.oneshot(
			Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."),
		)
		.await
		.expect("Failed to call /health.");

	assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn chat_returns_keywords_and_recommendations() {
	let workspace = TestWorkspace::new();

	sample_catalog(&workspace);

	let app = routes::router(test_state(&workspace));
	let payload = serde_json::json!({ "prompt": "space opera adventure" });
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/recommend/chat")
				.header("content-type", "application/json")
				.body(Body::from(payload.to_string()))
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call chat.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["keywords"][0], "space");
	assert_eq!(json["explanation"], "Recommendations based on your prompt.");

	let recommendations = json["recommendations"].as_array().expect("missing recommendations");

	assert!(!recommendations.is_empty());
	assert_eq!(recommendations[0]["genre"], "space opera");
	assert!(recommendations[0]["score"].as_f64().expect("missing score") > 0.0);
}

#[tokio::test]
async fn personalized_without_user_is_unauthorized() {
	let workspace = TestWorkspace::new();

	sample_catalog(&workspace);

	let app = routes::router(test_state(&workspace));
	let response = app
		.oneshot(
			Request::builder()
				.uri("/v1/recommend/personalized")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call personalized.");

	assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

	let json = json_body(response).await;

	assert_eq!(json["error_code"], "unauthorized");
}

#[tokio::test]
async fn popular_returns_the_catalog_head() {
	let workspace = TestWorkspace::new();

	sample_catalog(&workspace);

	let app = routes::router(test_state(&workspace));
	let response = app
		.oneshot(
			Request::builder()
				.uri("/v1/recommend/popular")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call popular.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;
	let items = json.as_array().expect("expected a list");

	assert_eq!(items.len(), 3);
	assert_eq!(items[0]["title"], "Starfall");
}

#[tokio::test]
async fn admin_rebuild_reports_shape() {
	let workspace = TestWorkspace::new();

	sample_catalog(&workspace);

	let app = routes::admin_router(test_state(&workspace));
	let response = app
		.oneshot(
			Request::builder()
				.method("POST")
				.uri("/v1/admin/rebuild_index")
				.body(Body::empty())
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call rebuild_index.");

	assert_eq!(response.status(), StatusCode::OK);

	let json = json_body(response).await;

	assert_eq!(json["count"], 3);
	assert_eq!(json["embedding_model"], "hash-embedder");
}
