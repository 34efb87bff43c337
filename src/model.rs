use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// One starred repository as returned by the source lister.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Item {
    pub id: u64,
    pub full_name: Option<String>,
    pub url: Option<String>,
    pub description: Option<String>,
    pub topics: Vec<String>,
}

/// The fields of an [`Item`] needed to create a bookmark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidItem<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub description: &'a str,
}

impl Item {
    pub fn validate(&self) -> Result<ValidItem<'_>, ItemError> {
        let title = non_empty(&self.full_name).ok_or(ItemError::MissingField {
            id: self.id,
            field: "full_name",
        })?;
        let url = non_empty(&self.url).ok_or(ItemError::MissingField {
            id: self.id,
            field: "url",
        })?;

        Ok(ValidItem {
            title,
            url,
            description: self.description.as_deref().unwrap_or(""),
        })
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bookmark {
    pub id: String,
}

// Karakeep wire types

#[derive(Debug, Deserialize)]
pub struct ListsResponse {
    pub lists: Vec<Collection>,
}

#[derive(Debug, Serialize)]
pub struct CreateListRequest<'a> {
    pub name: &'a str,
    pub icon: &'a str,
}

pub const BOOKMARK_TYPE_LINK: &str = "link";

#[derive(Debug, Serialize)]
pub struct CreateBookmarkRequest<'a> {
    #[serde(rename = "type")]
    pub bookmark_type: &'a str,
    pub url: &'a str,
    pub title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct AttachTagsRequest<'a> {
    pub tags: Vec<TagRef<'a>>,
}

#[derive(Debug, PartialEq, Eq, Serialize)]
pub struct TagRef<'a> {
    #[serde(rename = "tagName")]
    pub tag_name: &'a str,
}

/// Structured error body returned by Karakeep on non-success responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: String,
}

impl ErrorResponse {
    pub fn contains(&self, needle: &str) -> bool {
        self.error.contains(needle)
    }
}
