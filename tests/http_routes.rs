use std::{fs, path::Path};

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use http_body_util::BodyExt;
use resultview::{
    application::results::ResultService,
    cache::{CacheConfig, ResultCache},
    infra::http::{CACHE_STATUS_HEADER, HttpState, REQUEST_ID_HEADER, build_router},
};
use tempfile::TempDir;
use tower::ServiceExt;

const RECORDS: &str = r#"[
  {"url": "example.com", "status": 200, "dns tampering": "False", "ttl anomaly": "True",
   "extra": {"SYN-ACK TTL": 64,
             "TTL anomalies": [{"IPID": 1, "TTL": 65, "RST injection": "True"}]}},
  {"url": "blocked.example", "status": 403, "block page": "True",
   "extra": {"block page comment": "Served a block page"}}
]"#;

struct Harness {
    tmp: TempDir,
    router: Router,
}

impl Harness {
    fn results(&self) -> std::path::PathBuf {
        self.tmp.path().join("results")
    }

    fn write(&self, name: &str, contents: &str) {
        fs::write(self.results().join(name), contents).expect("write result file");
    }
}

fn harness(cache_enabled: bool) -> Harness {
    let tmp = TempDir::new().expect("temp dir");
    let results = tmp.path().join("results");
    fs::create_dir_all(&results).expect("results dir");

    let cache = cache_enabled.then(|| {
        ResultCache::open(&CacheConfig {
            enabled: true,
            directory: tmp.path().join("cache"),
            limit: 10,
        })
        .expect("open cache")
    });
    let router = build_router(HttpState::new(ResultService::new(results, cache)));

    Harness { tmp, router }
}

async fn get(router: &Router, uri: &str) -> (StatusCode, Option<String>, String) {
    let response = router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
        .await
        .expect("router response");

    let status = response.status();
    let cache_status = response
        .headers()
        .get(CACHE_STATUS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let body = response
        .into_body()
        .collect()
        .await
        .expect("collect body")
        .to_bytes();

    (status, cache_status, String::from_utf8_lossy(&body).into_owned())
}

fn cache_entries(dir: &Path) -> usize {
    fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(Result::ok)
                .filter(|entry| entry.file_name().to_string_lossy().ends_with(".cache"))
                .count()
        })
        .unwrap_or(0)
}

#[tokio::test]
async fn health_check_is_empty() {
    let h = harness(true);
    let (status, _, body) = get(&h.router, "/_health").await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(body.is_empty());
}

#[tokio::test]
async fn index_lists_result_files() {
    let h = harness(true);
    h.write("run-b.json", RECORDS);
    h.write("run a.json", "[]");

    let (status, _, body) = get(&h.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("Available Results"));
    assert!(body.contains("Date Modified"));
    assert!(body.contains("Date Created"));
    assert!(body.contains(r#"href="/results/run%20a.json""#));
    assert!(body.contains(r#"href="/results/run-b.json""#));
    assert!(body.find("run a.json") < body.find("run-b.json"));
    assert!(body.contains("not cached"));
}

#[tokio::test]
async fn index_without_results_directory_is_empty() {
    let h = harness(false);
    fs::remove_dir(h.results()).expect("remove results dir");

    let (status, _, body) = get(&h.router, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("No result files found."));
}

#[tokio::test]
async fn result_page_is_cached_after_first_render() {
    let h = harness(true);
    h.write("a.json", RECORDS);

    let (status, cache, first) = get(&h.router, "/results/a.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("miss"));
    assert!(first.contains("example.com"));
    assert!(first.contains("Served a block page"));
    assert_eq!(cache_entries(&h.tmp.path().join("cache")), 1);

    let (status, cache, second) = get(&h.router, "/results/a.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("hit"));
    assert_eq!(first, second);

    let (_, _, index) = get(&h.router, "/").await;
    assert!(index.contains(r#"alt="cached""#));
}

#[tokio::test]
async fn identical_content_under_new_name_is_a_hit() {
    let h = harness(true);
    h.write("a.json", RECORDS);
    get(&h.router, "/results/a.json").await;

    h.write("b.json", RECORDS);
    let (status, cache, _) = get(&h.router, "/results/b.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("hit"));
}

#[tokio::test]
async fn edited_file_is_rendered_again() {
    let h = harness(true);
    h.write("a.json", RECORDS);
    get(&h.router, "/results/a.json").await;

    h.write("a.json", r#"[{"url": "changed.example", "status": 301}]"#);
    let (status, cache, body) = get(&h.router, "/results/a.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("miss"));
    assert!(body.contains("changed.example"));
}

#[tokio::test]
async fn disabled_cache_always_misses() {
    let h = harness(false);
    h.write("a.json", RECORDS);

    for _ in 0..2 {
        let (status, cache, _) = get(&h.router, "/results/a.json").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(cache.as_deref(), Some("miss"));
    }
    assert!(!h.tmp.path().join("cache").exists());
}

#[tokio::test]
async fn invalid_json_is_unprocessable() {
    let h = harness(true);
    h.write("broken.json", "{not json");

    let (status, cache, body) = get(&h.router, "/results/broken.json").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(cache.is_none());
    assert_eq!(body, "Invalid JSON File");
    assert_eq!(cache_entries(&h.tmp.path().join("cache")), 0);
}

#[tokio::test]
async fn missing_result_is_not_found() {
    let h = harness(true);
    let (status, _, body) = get(&h.router, "/results/nope.json").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("Back to results"));
}

#[tokio::test]
async fn traversal_names_are_not_found() {
    let h = harness(true);
    fs::write(h.tmp.path().join("secret.json"), RECORDS).expect("write secret");

    for uri in ["/results/..%2Fsecret.json", "/results/..", "/results/%2E%2E"] {
        let (status, _, body) = get(&h.router, uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(!body.contains("example.com"), "{uri}");
    }
}

#[tokio::test]
async fn names_with_inner_dots_are_served() {
    let h = harness(true);
    h.write("run..v2.json", RECORDS);

    let (_, _, index) = get(&h.router, "/").await;
    assert!(index.contains(r#"href="/results/run..v2.json""#));

    let (status, cache, body) = get(&h.router, "/results/run..v2.json").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cache.as_deref(), Some("miss"));
    assert!(body.contains("example.com"));
}

#[tokio::test]
async fn every_response_carries_a_request_id() {
    let h = harness(false);
    for uri in ["/", "/_health", "/results/nope.json"] {
        let response = h
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).expect("request"))
            .await
            .expect("router response");
        assert!(response.headers().contains_key(REQUEST_ID_HEADER), "{uri}");
    }
}

#[tokio::test]
async fn unknown_route_renders_not_found_page() {
    let h = harness(false);
    let (status, _, body) = get(&h.router, "/no/such/page").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body.contains("<html"));
}

#[tokio::test]
async fn static_assets_are_served() {
    let h = harness(false);
    let response = h
        .router
        .clone()
        .oneshot(
            Request::get("/static/file_list.css")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("router response");

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("text/css")
    );

    let (status, _, _) = get(&h.router, "/static/missing.js").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
