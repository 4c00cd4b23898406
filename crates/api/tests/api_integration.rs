//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use domain::{Authorization, DomainConfig};
use event_store::InMemoryEventLog;
use futures_util::StreamExt;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::{Value, json};
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            metrics_exporter_prometheus::PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup_with(config: DomainConfig) -> (axum::Router, Arc<api::routes::AppState<InMemoryEventLog>>) {
    let state = api::create_state(InMemoryEventLog::new(), config, get_metrics_handle());
    (api::create_app(state.clone()), state)
}

fn setup() -> axum::Router {
    setup_with(DomainConfig::default()).0
}

/// Percent-encodes an IRI for use as one path segment.
fn encode(iri: &str) -> String {
    iri.replace('%', "%25")
        .replace(':', "%3A")
        .replace('/', "%2F")
        .replace('?', "%3F")
        .replace('#', "%23")
}

async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    subject: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(subject) = subject {
        request = request.header("x-subject", subject);
    }
    let request = match body {
        Some(body) => request
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => request.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Creates the `acme` organization and the given projects.
async fn seed(app: &axum::Router, projects: &[&str]) {
    let (status, _) = send(app, "POST", "/orgs", None, Some(json!({ "label": "acme" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    for project in projects {
        let (status, _) = send(
            app,
            "POST",
            &format!("/projects/acme/{project}"),
            None,
            Some(json!({ "description": "test" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}

const ALICE: &str = "https://acme.example/people/alice";

async fn create_alice(app: &axum::Router, project: &str) {
    let (status, body) = send(
        app,
        "POST",
        &format!("/resources/acme/{project}"),
        None,
        Some(json!({
            "@id": ALICE,
            "types": ["https://schema.org/Person"],
            "source": { "name": "Alice" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
}

#[tokio::test]
async fn test_health_check() {
    let (status, json) = send(&setup(), "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let app = setup();
    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers()["content-type"].to_str().unwrap();
    assert!(content_type.starts_with("text/plain"));
}

#[tokio::test]
async fn resource_lifecycle_over_http() {
    let app = setup();
    seed(&app, &["data"]).await;
    create_alice(&app, "data").await;
    let path = format!("/resources/acme/data/{}", encode(ALICE));

    let (status, updated) = send(
        &app,
        "PUT",
        &format!("{path}?rev=1"),
        None,
        Some(json!({ "source": { "name": "Alice B." } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["revision"], 2);

    let (status, _) = send(
        &app,
        "POST",
        &format!("{path}/tags?rev=2"),
        None,
        Some(json!({ "tag": "v1", "rev": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, latest) = send(&app, "GET", &path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["revision"], 3);
    assert_eq!(latest["source"]["name"], "Alice B.");

    let (_, first) = send(&app, "GET", &format!("{path}?rev=1"), None, None).await;
    assert_eq!(first["source"]["name"], "Alice");

    let (status, tagged) = send(&app, "GET", &format!("{path}?tag=v1"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tagged["revision"], 1);

    let (status, deprecated) = send(&app, "DELETE", &format!("{path}?rev=3"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deprecated["deprecated"], true);

    let (_, page) = send(&app, "GET", "/resources/acme/data?deprecated=true", None, None).await;
    assert_eq!(page["total"], 1);
}

#[tokio::test]
async fn stale_revision_is_a_conflict() {
    let app = setup();
    seed(&app, &["data"]).await;
    create_alice(&app, "data").await;

    let (status, body) = send(
        &app,
        "PUT",
        &format!("/resources/acme/data/{}?rev=5", encode(ALICE)),
        None,
        Some(json!({ "source": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let message = body["error"].as_str().unwrap();
    assert!(message.contains("'5'"), "{message}");
    assert!(message.contains("expected '1'"), "{message}");
}

#[tokio::test]
async fn rejections_map_to_client_errors() {
    let app = setup();
    seed(&app, &["data"]).await;

    let (status, _) = send(
        &app,
        "POST",
        "/resources/acme/data",
        None,
        Some(json!({ "@id": ALICE, "source": [1, 2, 3] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/resources/acme/data/{}", encode(ALICE)),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    create_alice(&app, "data").await;
    let (status, _) = send(
        &app,
        "GET",
        &format!("/resources/acme/data/{}?tag=missing", encode(ALICE)),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        "GET",
        &format!("/resources/acme/data/{}?rev=1&tag=v1", encode(ALICE)),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "POST", "/projects/acme/data", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn resolves_through_cross_project_resolver() {
    let app = setup();
    seed(&app, &["data", "shared"]).await;
    create_alice(&app, "shared").await;

    let resolve = format!("/resolve/acme/data/{}", encode(ALICE));
    let (status, failure) = send(&app, "GET", &resolve, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(failure["report"]["attempts"].as_array().unwrap().len(), 1);

    let (status, body) = send(
        &app,
        "POST",
        "/resolvers/acme/data",
        None,
        Some(json!({
            "@id": "https://acme.example/resolvers/shared",
            "value": {
                "@type": "CrossProject",
                "priority": 10,
                "projects": ["acme/shared"],
                "resourceTypes": [],
                "identities": { "@type": "UseCurrentCaller" }
            }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    let (status, resolved) = send(&app, "GET", &resolve, None, None).await;
    assert_eq!(status, StatusCode::OK, "{resolved}");
    assert_eq!(resolved["project"], "acme/shared");
    assert_eq!(resolved["resource"]["source"]["name"], "Alice");
}

#[tokio::test]
async fn acl_authorization_over_http() {
    let (app, state) = setup_with(DomainConfig {
        authorization: Authorization::Acls,
        ..Default::default()
    });
    assert!(api::provision_admin(&state.services, "staff").await.unwrap());
    assert!(!api::provision_admin(&state.services, "staff").await.unwrap());

    let (status, _) = send(
        &app,
        "POST",
        "/orgs",
        Some("bob@elsewhere"),
        Some(json!({ "label": "acme" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(&app, "POST", "/orgs", Some("alice@staff"), Some(json!({ "label": "acme" }))).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = send(&app, "GET", "/orgs/acme", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, org) = send(&app, "GET", "/orgs/acme", Some("alice@staff"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(org["label"], "acme");

    let (status, _) = send(&app, "GET", "/health", Some("not-a-subject"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", "/orgs/acme", Some("not-a-subject"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

/// Reads the SSE body until `needle` shows up.
async fn read_until(body: Body, needle: &str) -> String {
    let mut stream = body.into_data_stream();
    let mut text = String::new();
    let read = async {
        while let Some(chunk) = stream.next().await {
            text.push_str(&String::from_utf8_lossy(&chunk.unwrap()));
            if text.contains(needle) {
                break;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(5), read)
        .await
        .expect("event not delivered");
    text
}

#[tokio::test]
async fn project_events_resume_after_last_event_id() {
    let app = setup();
    seed(&app, &["data"]).await;
    create_alice(&app, "data").await;

    // Offsets: 1 organization, 2 project, 3 default resolver, 4 resource.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/events/acme/data")
                .header("last-event-id", "3")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/event-stream")
    );

    let text = read_until(response.into_body(), "ResourceCreated").await;
    assert!(!text.contains("ProjectCreated"), "{text}");
    assert!(!text.contains("ResolverCreated"), "{text}");
}

#[tokio::test]
async fn resource_events_are_filtered_to_one_resource() {
    let app = setup();
    seed(&app, &["data"]).await;
    let (status, _) = send(
        &app,
        "POST",
        "/resources/acme/data",
        None,
        Some(json!({ "@id": "https://acme.example/people/bob", "source": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    create_alice(&app, "data").await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/events/acme/data/{}", encode(ALICE)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let text = read_until(response.into_body(), "ResourceCreated").await;
    assert!(text.contains("people/alice"), "{text}");
    assert!(!text.contains("people/bob"), "{text}");
}
