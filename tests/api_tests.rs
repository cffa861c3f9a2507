use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};

use uniscout_api::{
    api::{create_router, AppState},
    models::CourseRecord,
    services::{
        embeddings::HashEmbeddings, index::FileIndexStore, Catalog, CatalogSource,
        RecommendationEngine,
    },
};

fn course(id: &str, program: &str, country: &str, location: &str, tuition: f64) -> CourseRecord {
    let mut record = CourseRecord::new(id);
    record.university_name = Some(format!("{location} University"));
    record.course_name = Some(format!("MSc {program}"));
    record.parent_course = Some(program.to_string());
    record.program_type = Some("Master's".to_string());
    record.country = Some(country.to_string());
    record.location = Some(location.to_string());
    record.tuition_usd = Some(tuition);
    record.university_type = Some("Public".to_string());
    record
}

fn catalog() -> Catalog {
    Catalog::from_records(vec![
        course("1", "Computer Science", "Canada", "Toronto", 20000.0),
        course("2", "Computer Science", "USA", "Boston", 55000.0),
        course("3", "Law", "USA", "Chicago", 48000.0),
        course("4", "Fine Arts", "Italy", "Milan", 9000.0),
        course("5", "Data Science", "USA", "Austin", 30000.0),
    ])
}

struct TestApp {
    server: TestServer,
    engine: Arc<RecommendationEngine>,
    _dir: tempfile::TempDir,
}

fn create_test_app(catalog: Catalog) -> TestApp {
    let dir = tempfile::tempdir().unwrap();
    let engine = Arc::new(RecommendationEngine::new(
        CatalogSource::InMemory(catalog),
        Arc::new(HashEmbeddings::new(128)),
        Arc::new(FileIndexStore::new(dir.path().join("index.json"))),
        2,
    ));
    let state = AppState::new(Arc::clone(&engine), 3, 10);
    let server = TestServer::new(create_router(state)).unwrap();

    TestApp {
        server,
        engine,
        _dir: dir,
    }
}

async fn create_ready_app(catalog: Catalog) -> TestApp {
    let app = create_test_app(catalog);
    app.engine.initialize().await.unwrap();
    app
}

#[tokio::test]
async fn test_health_check() {
    let app = create_test_app(catalog());

    let response = app.server.get("/health").await;
    response.assert_status_ok();
    assert!(response.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_request_id_is_echoed() {
    let app = create_test_app(catalog());

    let response = app
        .server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-request-id"),
            HeaderValue::from_static("client-123"),
        )
        .await;
    assert_eq!(response.headers()["x-request-id"], "client-123");
}

#[tokio::test]
async fn test_ready_reports_initialization() {
    let app = create_test_app(catalog());

    let response = app.server.get("/api/v1/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert_eq!(body["ready"], false);
    assert_eq!(body["status"], "initializing");

    app.engine.initialize().await.unwrap();

    let response = app.server.get("/api/v1/ready").await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["ready"], true);
    assert_eq!(body["courses"], 5);
    assert_eq!(body["index_source"], "built");
}

#[tokio::test]
async fn test_recommendations_unavailable_before_ready() {
    let app = create_test_app(catalog());

    let response = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "desired_program": "Law" }))
        .await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    let body: Value = response.json();
    assert!(body["retry_after"].is_number());
}

#[tokio::test]
async fn test_recommendations_flow() {
    let app = create_ready_app(catalog()).await;

    let response = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({
            "desired_program": "computer science",
            "preferred_countries": ["Canada"],
            "max_tuition_usd": 25000,
            "top_k": 2
        }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 2);
    assert!(body["search_duration_ms"].is_number());

    let first = &body["recommendations"][0];
    assert_eq!(first["course_id"], "1");
    assert_eq!(first["match_percentage"], 100.0);
    assert!(first["reasoning"].as_str().unwrap().contains("Canada"));
    assert!(first["relevance_score"].as_f64().unwrap() <= 1.0);
}

#[tokio::test]
async fn test_recommendations_default_top_k() {
    let app = create_ready_app(catalog()).await;

    let response = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "desired_program": "science" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 3);
}

#[tokio::test]
async fn test_invalid_top_k_is_rejected() {
    let app = create_ready_app(catalog()).await;

    for top_k in [0, 11] {
        let response = app
            .server
            .post("/api/v1/recommendations")
            .json(&json!({ "desired_program": "Law", "top_k": top_k }))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_empty_catalog_returns_empty_list() {
    let app = create_ready_app(Catalog::default()).await;

    let response = app
        .server
        .post("/api/v1/recommendations")
        .json(&json!({ "desired_program": "Law" }))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["count"], 0);
    assert_eq!(body["recommendations"], json!([]));
}

#[tokio::test]
async fn test_options_ordering() {
    let app = create_ready_app(catalog()).await;

    let response = app.server.get("/api/v1/options").await;
    response.assert_status_ok();
    let body: Value = response.json();

    assert_eq!(body["countries"], json!(["USA", "Canada", "Italy"]));
    assert_eq!(
        body["programs"],
        json!(["Computer Science", "Data Science", "Fine Arts", "Law"])
    );
    assert_eq!(
        body["locations"],
        json!(["Austin", "Boston", "Chicago", "Milan", "Toronto"])
    );
    assert!(!body["previous_degrees"].as_array().unwrap().is_empty());
}
