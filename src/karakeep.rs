use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::error::ClientError;
use crate::model::{
    AttachTagsRequest, BOOKMARK_TYPE_LINK, Bookmark, Collection, CreateBookmarkRequest,
    CreateListRequest, ErrorResponse, ListsResponse, TagRef,
};

pub const DEFAULT_LIST_ICON: &str = "🔸";

/// Karakeep answers a repeated list-membership PUT with an error whose message
/// contains this text. It is treated as success until the API is idempotent.
/// See https://github.com/karakeep-app/karakeep/issues/1402
pub const ALREADY_IN_LIST: &str = "already in the list";

/// Bookmark-collection service the reconciler writes into.
#[async_trait]
pub trait BookmarkStore: Send + Sync {
    async fn list_collections(&self) -> Result<Vec<Collection>, ClientError>;

    async fn create_collection(&self, name: &str) -> Result<Collection, ClientError>;

    async fn create_bookmark(&self, title: &str, url: &str, description: &str) -> Result<Bookmark, ClientError>;

    async fn attach_bookmark_to_collection(&self, bookmark_id: &str, collection_id: &str) -> Result<(), ClientError>;

    /// Attaches `tags` after the configured default tag. Issues no request when
    /// the combined list is empty.
    async fn attach_tags(&self, bookmark_id: &str, tags: &[String]) -> Result<(), ClientError>;
}

pub struct KarakeepClient {
    client: Client,
    host: String,
    token: String,
    default_tag: String,
}

impl KarakeepClient {
    pub fn new(timeout: Duration, host: &str, token: &str, default_tag: &str) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            host: host.trim_matches('/').to_string(),
            token: token.to_string(),
            default_tag: default_tag.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v1/{}", self.host, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.header(ACCEPT, "application/json").bearer_auth(&self.token)
    }

    async fn expect_json<T: DeserializeOwned>(res: Response, expected: StatusCode) -> Result<T, ClientError> {
        if res.status() != expected {
            return Err(ClientError::service(res.status()));
        }
        let body = res.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

/// Default tag first (when set), then the caller's tags in order.
pub fn tag_payload<'a>(default_tag: &'a str, tags: &'a [String]) -> Vec<TagRef<'a>> {
    let default = (!default_tag.is_empty()).then_some(default_tag);
    default
        .into_iter()
        .chain(tags.iter().map(String::as_str))
        .map(|tag_name| TagRef { tag_name })
        .collect()
}

#[async_trait]
impl BookmarkStore for KarakeepClient {
    async fn list_collections(&self) -> Result<Vec<Collection>, ClientError> {
        let res = self
            .authorized(self.client.get(self.endpoint("lists")))
            .send()
            .await?;
        let body: ListsResponse = Self::expect_json(res, StatusCode::OK).await?;
        Ok(body.lists)
    }

    async fn create_collection(&self, name: &str) -> Result<Collection, ClientError> {
        let payload = CreateListRequest {
            name,
            icon: DEFAULT_LIST_ICON,
        };
        let res = self
            .authorized(self.client.post(self.endpoint("lists")))
            .json(&payload)
            .send()
            .await?;
        Self::expect_json(res, StatusCode::CREATED).await
    }

    async fn create_bookmark(&self, title: &str, url: &str, description: &str) -> Result<Bookmark, ClientError> {
        let payload = CreateBookmarkRequest {
            bookmark_type: BOOKMARK_TYPE_LINK,
            url,
            title,
            summary: (!description.is_empty()).then_some(description),
        };
        let res = self
            .authorized(self.client.post(self.endpoint("bookmarks")))
            .json(&payload)
            .send()
            .await?;
        Self::expect_json(res, StatusCode::CREATED).await
    }

    async fn attach_bookmark_to_collection(&self, bookmark_id: &str, collection_id: &str) -> Result<(), ClientError> {
        let path = format!(
            "lists/{}/bookmarks/{}",
            urlencoding::encode(collection_id),
            urlencoding::encode(bookmark_id)
        );
        let res = self
            .authorized(self.client.put(self.endpoint(&path)))
            .send()
            .await?;

        let status = res.status();
        if status == StatusCode::NO_CONTENT {
            return Ok(());
        }

        let body = res.bytes().await?;
        let error_body = serde_json::from_slice::<ErrorResponse>(&body).ok();
        match error_body {
            Some(e) if e.contains(ALREADY_IN_LIST) => {
                tracing::debug!(bookmark_id, collection_id, "bookmark already in list");
                Ok(())
            }
            body => Err(ClientError::Service { status, body }),
        }
    }

    async fn attach_tags(&self, bookmark_id: &str, tags: &[String]) -> Result<(), ClientError> {
        let payload = AttachTagsRequest {
            tags: tag_payload(&self.default_tag, tags),
        };
        if payload.tags.is_empty() {
            return Ok(());
        }

        let path = format!("bookmarks/{}/tags", urlencoding::encode(bookmark_id));
        let res = self
            .authorized(self.client.post(self.endpoint(&path)))
            .json(&payload)
            .send()
            .await?;

        if res.status() != StatusCode::OK {
            return Err(ClientError::service(res.status()));
        }
        Ok(())
    }
}
