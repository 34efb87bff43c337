use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::github::StarSource;
use crate::karakeep::BookmarkStore;
use crate::model::{Item, ValidItem};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PassStats {
    pub listed: usize,
    pub exported: usize,
    pub skipped: usize,
}

/// One unit of work the scheduler can run repeatedly.
#[async_trait]
pub trait SyncPass: Send + Sync {
    async fn run_pass(&self) -> Result<PassStats, SyncError>;
}

#[derive(Debug, Clone)]
pub struct ReconcilerOptions {
    pub user: String,
    pub list_name: String,
    /// Zero or negative exports every eligible item.
    pub export_limit: i64,
    pub extract_topics: bool,
}

impl ReconcilerOptions {
    fn limit_reached(&self, exported: usize) -> bool {
        self.export_limit > 0 && exported as i64 >= self.export_limit
    }
}

pub struct Reconciler {
    source: Arc<dyn StarSource>,
    store: Arc<dyn BookmarkStore>,
    opts: ReconcilerOptions,
}

impl Reconciler {
    pub fn new(source: Arc<dyn StarSource>, store: Arc<dyn BookmarkStore>, opts: ReconcilerOptions) -> Self {
        Self { source, store, opts }
    }

    async fn resolve_list_id(&self) -> Result<String, SyncError> {
        let lists = self
            .store
            .list_collections()
            .await
            .map_err(SyncError::ListCollections)?;

        if let Some(list) = lists.into_iter().find(|l| l.name == self.opts.list_name) {
            return Ok(list.id);
        }

        let created = self
            .store
            .create_collection(&self.opts.list_name)
            .await
            .map_err(|source| SyncError::CreateCollection {
                name: self.opts.list_name.clone(),
                source,
            })?;
        tracing::info!(list = %created.name, list_id = %created.id, "created karakeep list");
        Ok(created.id)
    }

    /// Creates the bookmark, puts it in the list and tags it.
    async fn export_item(&self, item: &Item, valid: ValidItem<'_>, list_id: &str) -> Result<(), SyncError> {
        let bookmark = self
            .store
            .create_bookmark(valid.title, valid.url, valid.description)
            .await
            .map_err(|source| SyncError::CreateBookmark {
                repo: valid.title.to_string(),
                source,
            })?;

        self.store
            .attach_bookmark_to_collection(&bookmark.id, list_id)
            .await
            .map_err(|source| SyncError::AttachToCollection {
                bookmark_id: bookmark.id.clone(),
                list_id: list_id.to_string(),
                source,
            })?;

        let tags: &[String] = if self.opts.extract_topics { &item.topics } else { &[] };
        self.store
            .attach_tags(&bookmark.id, tags)
            .await
            .map_err(|source| SyncError::AttachTags {
                bookmark_id: bookmark.id.clone(),
                source,
            })?;

        tracing::debug!(repo = valid.title, bookmark_id = %bookmark.id, "exported starred repo");
        Ok(())
    }
}

#[async_trait]
impl SyncPass for Reconciler {
    async fn run_pass(&self) -> Result<PassStats, SyncError> {
        tracing::info!(user = %self.opts.user, list = %self.opts.list_name, "starting exporter");

        let items = self
            .source
            .list_starred(&self.opts.user)
            .await
            .map_err(|source| SyncError::ListStarred {
                user: self.opts.user.clone(),
                source,
            })?;

        let mut stats = PassStats {
            listed: items.len(),
            ..Default::default()
        };
        tracing::info!(total = stats.listed, "retrieved starred repos");

        let list_id = self.resolve_list_id().await?;

        for item in &items {
            let valid = match item.validate() {
                Ok(valid) => valid,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping starred repo");
                    stats.skipped += 1;
                    continue;
                }
            };

            self.export_item(item, valid, &list_id).await?;
            stats.exported += 1;
            if self.opts.limit_reached(stats.exported) {
                tracing::info!(limit = self.opts.export_limit, "export limit reached");
                break;
            }
        }

        tracing::info!(
            listed = stats.listed,
            exported = stats.exported,
            skipped = stats.skipped,
            "exporter finished"
        );
        Ok(stats)
    }
}
