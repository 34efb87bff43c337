use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use github2karakeep::error::ClientError;
use github2karakeep::github::{GithubClient, StarSource};
use serde_json::json;

#[derive(Debug, Clone)]
struct PageRequest {
    user: String,
    page: String,
    per_page: Option<String>,
    authorization: Option<String>,
}

#[derive(Clone)]
struct FakeGithub {
    base: String,
    fail_second_page: bool,
    requests: Arc<Mutex<Vec<PageRequest>>>,
}

async fn starred(
    State(fake): State<FakeGithub>,
    Path(user): Path<String>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let page = query.get("page").cloned().unwrap_or_else(|| "1".to_string());
    fake.requests.lock().unwrap().push(PageRequest {
        user: user.clone(),
        page: page.clone(),
        per_page: query.get("per_page").cloned(),
        authorization: headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    match page.as_str() {
        "1" => {
            let link = format!(
                r#"<{base}/users/{user}/starred?per_page=2&page=2>; rel="next", <{base}/users/{user}/starred?per_page=2&page=2>; rel="last""#,
                base = fake.base,
                user = user,
            );
            (
                [(header::LINK, link)],
                Json(json!([
                    {"id": 1, "full_name": "tokio-rs/tokio", "html_url": "https://github.com/tokio-rs/tokio",
                     "description": "async runtime", "topics": ["async", "rust"]},
                    {"id": 2, "full_name": "serde-rs/serde", "html_url": "https://github.com/serde-rs/serde",
                     "description": null}
                ])),
            )
                .into_response()
        }
        "2" if fake.fail_second_page => StatusCode::BAD_GATEWAY.into_response(),
        "2" => Json(json!([
            {"id": 3, "full_name": null, "html_url": "https://github.com/ghost/repo"}
        ]))
        .into_response(),
        _ => Json(json!([])).into_response(),
    }
}

async fn spawn_server(fail_second_page: bool) -> (String, Arc<Mutex<Vec<PageRequest>>>) {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let requests = Arc::new(Mutex::new(Vec::new()));
    let fake = FakeGithub {
        base: base.clone(),
        fail_second_page,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/users/:user/starred", get(starred))
        .with_state(fake);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (base, requests)
}

#[tokio::test]
async fn test_list_starred_follows_pages_in_order() {
    let (base, requests) = spawn_server(false).await;
    let gh = GithubClient::new(Duration::from_secs(5), &base, "gh-secret", 2).unwrap();

    let items = gh.list_starred("octocat").await.unwrap();

    let ids: Vec<u64> = items.iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(items[0].topics, vec!["async", "rust"]);
    assert_eq!(items[0].url.as_deref(), Some("https://github.com/tokio-rs/tokio"));
    assert_eq!(items[1].description, None);
    assert_eq!(items[2].full_name, None);

    let requests = requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].user, "octocat");
    assert_eq!(requests[0].page, "1");
    assert_eq!(requests[0].per_page.as_deref(), Some("2"));
    assert_eq!(requests[0].authorization.as_deref(), Some("Bearer gh-secret"));
    assert_eq!(requests[1].page, "2");
}

#[tokio::test]
async fn test_failed_page_fails_whole_listing() {
    let (base, _) = spawn_server(true).await;
    let gh = GithubClient::new(Duration::from_secs(5), &base, "gh-secret", 2).unwrap();

    match gh.list_starred("octocat").await {
        Err(ClientError::Service { status, .. }) => assert_eq!(status, StatusCode::BAD_GATEWAY.as_u16()),
        other => panic!("unexpected result: {:?}", other.map(|items| items.len())),
    }
}

#[tokio::test]
async fn test_unreachable_api_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let gh = GithubClient::new(Duration::from_secs(5), &base, "gh-secret", 2).unwrap();
    assert!(matches!(
        gh.list_starred("octocat").await,
        Err(ClientError::Transport(_))
    ));
}
