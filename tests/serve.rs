use axum::body::{to_bytes, Body};
use axum::extract::Query;
use axum::http::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, RANGE};
use axum::http::{HeaderMap, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tower::ServiceExt;

use media_range::{serve_file, ServeConfig};

const FIXTURE: &str = "Hello world this is a file to test range requests on!\n";

#[derive(Deserialize)]
struct FileRequest {
    path: String,
}

async fn get_file(Query(q): Query<FileRequest>, headers: HeaderMap) -> impl IntoResponse {
    serve_file(&q.path, &headers, &ServeConfig::default().with_buffer_size(8)).await
}

fn app() -> Router {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    Router::new().route("/file", get(get_file))
}

async fn request(path: &str, range: Option<&str>) -> Response {
    let mut request = Request::get(format!("/file?path={path}"));
    if let Some(range) = range {
        request = request.header(RANGE, range);
    }
    app().oneshot(request.body(Body::empty()).unwrap()).await.unwrap()
}

fn header<'a>(response: &'a Response, name: axum::http::HeaderName) -> &'a str {
    response.headers().get(name).unwrap().to_str().unwrap()
}

async fn body(response: Response) -> Vec<u8> {
    to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()
}

#[tokio::test]
async fn test_whole_file() {
    let response = request("test/fixture.txt", None).await;

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!("bytes", header(&response, ACCEPT_RANGES));
    assert_eq!("54", header(&response, CONTENT_LENGTH));
    assert_eq!("bytes 0-53/54", header(&response, CONTENT_RANGE));
    assert_eq!("text/plain", header(&response, CONTENT_TYPE));
    assert_eq!(FIXTURE.as_bytes(), &body(response).await[..]);
}

#[tokio::test]
async fn test_partial_content() {
    let response = request("test/fixture.txt", Some("bytes=12-25")).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!("14", header(&response, CONTENT_LENGTH));
    assert_eq!("bytes 12-25/54", header(&response, CONTENT_RANGE));
    assert_eq!(&FIXTURE.as_bytes()[12..=25], &body(response).await[..]);
}

#[tokio::test]
async fn test_open_ended_range() {
    let response = request("test/fixture.txt", Some("bytes=35-")).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!("bytes 35-53/54", header(&response, CONTENT_RANGE));
    assert_eq!(b"range requests on!\n", &body(response).await[..]);
}

#[tokio::test]
async fn test_range_past_end() {
    let response = request("test/fixture.txt", Some("bytes=1500-2000")).await;

    assert_eq!(StatusCode::PARTIAL_CONTENT, response.status());
    assert_eq!("1", header(&response, CONTENT_LENGTH));
    assert_eq!("bytes 53-53/54", header(&response, CONTENT_RANGE));
    assert_eq!(b"\n", &body(response).await[..]);
}

#[tokio::test]
async fn test_garbage_range() {
    let response = request("test/fixture.txt", Some("bananas")).await;

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!(FIXTURE.as_bytes(), &body(response).await[..]);
}

#[tokio::test]
async fn test_empty_file() {
    let response = request("test/empty", Some("bytes=0-10")).await;

    assert_eq!(StatusCode::OK, response.status());
    assert_eq!("0", header(&response, CONTENT_LENGTH));
    assert_eq!("application/octet-stream", header(&response, CONTENT_TYPE));
    assert!(body(response).await.is_empty());
}

#[tokio::test]
async fn test_missing_file() {
    let response = request("test/missing.mp4", Some("bytes=0-10")).await;

    assert_eq!(StatusCode::NOT_FOUND, response.status());
    assert!(response.headers().get(CONTENT_RANGE).is_none());
}

#[tokio::test]
async fn test_directory_is_not_found() {
    let response = request("test", None).await;

    assert_eq!(StatusCode::NOT_FOUND, response.status());
}
