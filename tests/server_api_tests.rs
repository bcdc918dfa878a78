use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::util::ServiceExt;

use datadock::dataset::DataRegistry;
use datadock::server::{router, AppState};

/// Ten products, three columns; the pagination tests depend on these counts.
const PRODUCTS_CSV: &str = "\
id,name,price
1,Widget,9.99
2,Gadget,12.5
3,Sprocket,3.25
4,Flange,7.0
5,Grommet,0.55
6,Bracket,4.4
7,Coupler,11.0
8,Washer,0.05
9,Spindle,18.75
10,Bearing,6.6
";

fn seed(dir: &std::path::Path) {
    std::fs::write(dir.join("products.csv"), PRODUCTS_CSV).unwrap();
    std::fs::write(
        dir.join("company.json"),
        r#"{"employees":[{"id":1,"name":"John"},{"id":2,"name":"Jane"}],"departments":[{"id":1},{"id":2}]}"#,
    )
    .unwrap();
}

fn app(dir: &std::path::Path) -> (Router, Arc<DataRegistry>) {
    let registry = Arc::new(DataRegistry::new());
    registry.reload(dir).unwrap();
    let router = router(AppState {
        registry: registry.clone(),
    });
    (router, registry)
}

async fn get(router: Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = router
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, value)
}

#[tokio::test]
async fn health_endpoint_returns_ok_json() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn datasets_endpoint_lists_sources_with_cache_headers() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, headers, body) = get(router, "/datasets").await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key(header::ETAG));
    assert!(headers.contains_key(header::LAST_MODIFIED));

    assert_eq!(body["file_count"], json!(2));
    assert_eq!(body["type"], json!("multiple"));
    assert_eq!(body["files"].as_array().unwrap().len(), 2);

    let datasets: Vec<(String, u64)> = body["datasets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| {
            (
                d["name"].as_str().unwrap().to_string(),
                d["records"].as_u64().unwrap(),
            )
        })
        .collect();
    assert!(datasets.contains(&("products".to_string(), 10)));
    assert!(datasets.contains(&("company_employees".to_string(), 2)));
    assert!(datasets.contains(&("company_departments".to_string(), 2)));
}

#[tokio::test]
async fn single_dataset_without_pagination_returns_bare_array() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data?name=products").await;
    assert_eq!(status, StatusCode::OK);
    let records = body.as_array().expect("bare array, not an object");
    assert_eq!(records.len(), 10);
    assert_eq!(records[0], json!({"id": 1, "name": "Widget", "price": 9.99}));
}

#[tokio::test]
async fn pagination_wraps_records_with_totals() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data?name=products&limit=5&offset=2").await;
    assert_eq!(status, StatusCode::OK);
    let paginated = &body["products"];
    assert_eq!(paginated["total"], json!(10));
    assert_eq!(paginated["returned"], json!(5));
    let data = paginated["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    // data[0] is the source record at index 2.
    assert_eq!(data[0]["id"], json!(3));
    assert_eq!(data[4]["id"], json!(7));
}

#[tokio::test]
async fn pagination_clamps_to_available_records() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data?name=products&limit=50&offset=8").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"]["total"], json!(10));
    assert_eq!(body["products"]["returned"], json!(2));
}

#[tokio::test]
async fn multiple_names_without_pagination_return_bare_map() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) =
        get(router, "/data?name=company_employees&name=company_departments").await;
    assert_eq!(status, StatusCode::OK);
    let map = body.as_object().unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["company_employees"].as_array().unwrap().len(), 2);
    assert_eq!(map["company_departments"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn no_names_returns_every_dataset() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data").await;
    assert_eq!(status, StatusCode::OK);
    let map = body.as_object().unwrap();
    assert_eq!(map.len(), 3);
    assert!(map["products"].is_array());
}

#[tokio::test]
async fn unknown_dataset_returns_structured_404() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data?name=products&name=ghost&name=phantom").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], json!("Dataset not found"));
    assert_eq!(body["details"]["requested"], json!(["ghost", "phantom"]));
    let available = body["details"]["available"].as_array().unwrap();
    assert!(available.contains(&json!("products")));
    assert_eq!(available.len(), 3);
}

#[tokio::test]
async fn invalid_pagination_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router.clone(), "/data?name=products&limit=-1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"], json!(null));

    let (status, _, _) = get(router.clone(), "/data?name=products&offset=-3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _, _) = get(router, "/data?name=products&limit=abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn single_name_with_pagination_is_wrapped() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let (status, _, body) = get(router, "/data?name=products&limit=3").await;
    assert_eq!(status, StatusCode::OK);
    // Pagination forces the object form even for a single dataset.
    assert!(body.is_object());
    assert_eq!(body["products"]["returned"], json!(3));
}

#[tokio::test]
async fn etag_is_stable_until_the_directory_changes() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, registry) = app(tmp.path());

    let (_, first_headers, _) = get(router.clone(), "/datasets").await;
    let (_, repeat_headers, _) = get(router.clone(), "/datasets").await;
    let first = first_headers.get(header::ETAG).unwrap().clone();
    assert_eq!(repeat_headers.get(header::ETAG).unwrap(), &first);

    std::fs::write(tmp.path().join("extra.csv"), "x\n1\n").unwrap();
    registry.reload(tmp.path()).unwrap();

    let (_, changed_headers, _) = get(router, "/datasets").await;
    assert_ne!(changed_headers.get(header::ETAG).unwrap(), &first);
}

#[tokio::test]
async fn forecast_endpoint_returns_mock_entries_per_category() {
    let tmp = tempfile::tempdir().unwrap();
    seed(tmp.path());
    let (router, _) = app(tmp.path());

    let request = Request::builder()
        .method("POST")
        .uri("/forecast_demand")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"filters":{"product_category":["office supplies","electronics"]}}"#,
        ))
        .unwrap();
    let response = router.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(body["total_records"], json!(4));
    assert_eq!(
        body["categories"],
        json!(["office supplies", "electronics"])
    );
    assert_eq!(
        body["forecast_data"][0]["product_id"],
        json!("PROD_OFFICE_SUPPLIES_001")
    );
}
