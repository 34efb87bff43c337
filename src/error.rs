use reqwest::StatusCode;
use thiserror::Error;

use crate::model::ErrorResponse;

/// Failure of a single HTTP call against GitHub or Karakeep.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("transport error")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected status {status}{}", describe_body(.body))]
    Service {
        status: StatusCode,
        body: Option<ErrorResponse>,
    },
    #[error("malformed response body")]
    Decode(#[from] serde_json::Error),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn service(status: StatusCode) -> Self {
        ClientError::Service { status, body: None }
    }
}

fn describe_body(body: &Option<ErrorResponse>) -> String {
    match body {
        Some(b) => format!(" ({}: {})", b.code, b.error),
        None => String::new(),
    }
}

/// A starred item that cannot be turned into a bookmark.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ItemError {
    #[error("starred repo {id} has no {field}")]
    MissingField { id: u64, field: &'static str },
}

/// Aborts a sync pass. Each variant names the step that failed.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to retrieve starred repos for {user}")]
    ListStarred {
        user: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to retrieve karakeep lists")]
    ListCollections(#[source] ClientError),
    #[error("failed to create list {name}")]
    CreateCollection {
        name: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to create bookmark for {repo}")]
    CreateBookmark {
        repo: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to attach bookmark {bookmark_id} to list {list_id}")]
    AttachToCollection {
        bookmark_id: String,
        list_id: String,
        #[source]
        source: ClientError,
    },
    #[error("failed to attach tags to bookmark {bookmark_id}")]
    AttachTags {
        bookmark_id: String,
        #[source]
        source: ClientError,
    },
}
