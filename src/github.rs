use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, HeaderMap, LINK};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use crate::error::ClientError;
use crate::model::Item;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";

/// Lists a user's starred items, fully materialized and in provider order.
#[async_trait]
pub trait StarSource: Send + Sync {
    async fn list_starred(&self, user: &str) -> Result<Vec<Item>, ClientError>;
}

#[derive(Debug, Deserialize)]
struct StarredRepo {
    id: u64,
    full_name: Option<String>,
    html_url: Option<String>,
    description: Option<String>,
    #[serde(default)]
    topics: Vec<String>,
}

impl From<StarredRepo> for Item {
    fn from(repo: StarredRepo) -> Self {
        Item {
            id: repo.id,
            full_name: repo.full_name,
            url: repo.html_url,
            description: repo.description,
            topics: repo.topics,
        }
    }
}

pub struct GithubClient {
    client: Client,
    api_url: String,
    token: String,
    per_page: u32,
}

impl GithubClient {
    pub fn new(timeout: Duration, api_url: &str, token: &str, per_page: u32) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            per_page,
        })
    }

    fn first_page_url(&self, user: &str) -> Result<Url, ClientError> {
        let raw = format!("{}/users/{}/starred", self.api_url, urlencoding::encode(user));
        let per_page = self.per_page.to_string();
        Url::parse_with_params(&raw, &[("per_page", per_page.as_str())])
            .map_err(|_| ClientError::InvalidUrl(raw))
    }

    async fn fetch_page(&self, url: Url) -> Result<(Vec<StarredRepo>, Option<Url>), ClientError> {
        let res = self
            .client
            .get(url)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(&self.token)
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            return Err(ClientError::service(res.status()));
        }

        let next = next_page_url(res.headers());
        let body = res.bytes().await?;
        let repos = serde_json::from_slice(&body)?;
        Ok((repos, next))
    }
}

#[async_trait]
impl StarSource for GithubClient {
    async fn list_starred(&self, user: &str) -> Result<Vec<Item>, ClientError> {
        let mut all = Vec::new();
        let mut next = Some(self.first_page_url(user)?);
        let mut page = 0;

        while let Some(url) = next {
            let (repos, following) = self.fetch_page(url).await?;
            tracing::debug!(page, count = repos.len(), "retrieved starred page");
            all.extend(repos.into_iter().map(Item::from));
            next = following;
            page += 1;
        }

        Ok(all)
    }
}

/// Extracts the `rel="next"` target from a GitHub `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<Url> {
    let link = headers.get(LINK)?.to_str().ok()?;
    link.split(',').find_map(|part| {
        let mut segments = part.split(';');
        let target = segments.next()?.trim();
        let is_next = segments.any(|param| param.trim() == r#"rel="next""#);
        if !is_next {
            return None;
        }
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        Url::parse(target).ok()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers_with_link(link: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(LINK, HeaderValue::from_str(link).unwrap());
        headers
    }

    #[test]
    fn test_next_page_url() {
        let headers = headers_with_link(
            r#"<https://api.github.com/user/1/starred?per_page=2&page=2>; rel="next", <https://api.github.com/user/1/starred?per_page=2&page=5>; rel="last""#,
        );
        assert_eq!(
            next_page_url(&headers).unwrap().as_str(),
            "https://api.github.com/user/1/starred?per_page=2&page=2"
        );
    }

    #[test]
    fn test_next_page_url_on_last_page() {
        let headers = headers_with_link(
            r#"<https://api.github.com/user/1/starred?page=1>; rel="first", <https://api.github.com/user/1/starred?page=4>; rel="prev""#,
        );
        assert_eq!(next_page_url(&headers), None);
        assert_eq!(next_page_url(&HeaderMap::new()), None);
    }

    #[test]
    fn test_first_page_url_encodes_user() {
        let client = GithubClient::new(Duration::from_secs(1), "https://api.github.com/", "t", 50).unwrap();
        assert_eq!(
            client.first_page_url("some user").unwrap().as_str(),
            "https://api.github.com/users/some%20user/starred?per_page=50"
        );
    }

    #[test]
    fn test_starred_repo_into_item() {
        let repo: StarredRepo = serde_json::from_str(
            r#"{"id": 1, "full_name": "a/b", "html_url": "https://github.com/a/b", "description": null, "url": "https://api.github.com/repos/a/b"}"#,
        )
        .unwrap();
        let item = Item::from(repo);
        assert_eq!(item.url.as_deref(), Some("https://github.com/a/b"));
        assert!(item.topics.is_empty());
        assert_eq!(item.description, None);
    }
}
