use std::sync::Arc;

use inkpress_appwrite::{InputFile, PreviewOptions, Query, id};
use reqwest::Url;
use tracing::{debug, info, warn};

use crate::backend::{FileStore, PostStore, StoredFile};
use crate::error::{Result, ServiceError};
use crate::post::{NewPost, Post, PostList, PostUpdate, default_post_queries, validate_id};

/// Post CRUD and file storage over a pair of stores.
///
/// Cheap to clone; construct one at startup and hand clones to consumers.
/// "Not found" is the only failure folded into a success value
/// (`Ok(None)` / `Ok(false)`); everything else is returned as an error.
#[derive(Clone)]
pub struct ContentService {
    posts: Arc<dyn PostStore>,
    files: Arc<dyn FileStore>,
}

fn log_failure(op: &str, key: &str, err: &ServiceError) {
    warn!(op, key, error = %err, "content service call failed");
}

impl ContentService {
    pub fn new(posts: Arc<dyn PostStore>, files: Arc<dyn FileStore>) -> Self {
        Self { posts, files }
    }

    /// Use one backend for both posts and files.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: PostStore + FileStore + 'static,
    {
        Self {
            posts: backend.clone(),
            files: backend,
        }
    }

    // -- Posts --------------------------------------------------------------

    pub async fn create_post(&self, post: NewPost) -> Result<Post> {
        let result = async {
            validate_id("slug", &post.slug)?;
            self.posts.create(&post).await
        }
        .await;
        match result {
            Ok(created) => {
                info!(slug = %created.slug, "post created");
                Ok(created)
            }
            Err(e) => {
                log_failure("create_post", &post.slug, &e);
                Err(e)
            }
        }
    }

    pub async fn update_post(&self, slug: &str, update: PostUpdate) -> Result<Post> {
        let result = async {
            validate_id("slug", slug)?;
            self.posts.update(slug, &update).await
        }
        .await;
        result.inspect_err(|e| log_failure("update_post", slug, e))
    }

    /// Returns `Ok(false)` when no post has this slug.
    pub async fn delete_post(&self, slug: &str) -> Result<bool> {
        let result = async {
            validate_id("slug", slug)?;
            self.posts.delete(slug).await
        }
        .await;
        found_or(result, "delete_post", slug, |_| true, false)
    }

    /// Returns `Ok(None)` when no post has this slug.
    pub async fn get_post(&self, slug: &str) -> Result<Option<Post>> {
        let result = async {
            validate_id("slug", slug)?;
            self.posts.get(slug).await
        }
        .await;
        found_or(result, "get_post", slug, Some, None)
    }

    /// List posts matching `queries`, forwarded to the store as given.
    pub async fn get_posts(&self, queries: &[Query]) -> Result<PostList> {
        let list = self
            .posts
            .list(queries)
            .await
            .inspect_err(|e| log_failure("get_posts", &describe(queries), e))?;
        debug!(total = list.total, returned = list.posts.len(), "posts listed");
        Ok(list)
    }

    /// List posts with the default `status == active` filter.
    pub async fn get_active_posts(&self) -> Result<PostList> {
        self.get_posts(&default_post_queries()).await
    }

    // -- Files --------------------------------------------------------------

    /// Store `file` under a freshly generated id.
    pub async fn upload_file(&self, file: InputFile) -> Result<StoredFile> {
        let file_id = id::unique();
        let name = file.name.clone();
        let stored = self
            .files
            .upload(&file_id, file)
            .await
            .inspect_err(|e| log_failure("upload_file", &name, e))?;
        info!(file = %stored.id, name = %stored.name, size = stored.size, "file uploaded");
        Ok(stored)
    }

    /// Returns `Ok(None)` when no file has this id.
    pub async fn get_file(&self, file_id: &str) -> Result<Option<StoredFile>> {
        let result = async {
            validate_id("file id", file_id)?;
            self.files.get(file_id).await
        }
        .await;
        found_or(result, "get_file", file_id, Some, None)
    }

    /// Returns `Ok(false)` when no file has this id.
    pub async fn delete_file(&self, file_id: &str) -> Result<bool> {
        let result = async {
            validate_id("file id", file_id)?;
            self.files.delete(file_id).await
        }
        .await;
        found_or(result, "delete_file", file_id, |_| true, false)
    }

    pub fn get_file_view_url(&self, file_id: &str) -> Result<Url> {
        validate_id("file id", file_id)
            .and_then(|_| self.files.view_url(file_id))
            .inspect_err(|e| log_failure("get_file_view_url", file_id, e))
    }

    pub fn get_file_download_url(&self, file_id: &str) -> Result<Url> {
        validate_id("file id", file_id)
            .and_then(|_| self.files.download_url(file_id))
            .inspect_err(|e| log_failure("get_file_download_url", file_id, e))
    }

    pub fn get_file_preview_url(&self, file_id: &str, options: &PreviewOptions) -> Result<Url> {
        validate_id("file id", file_id)
            .and_then(|_| self.files.preview_url(file_id, options))
            .inspect_err(|e| log_failure("get_file_preview_url", file_id, e))
    }
}

/// Queries as sent on the wire, for log lines.
fn describe(queries: &[Query]) -> String {
    let parts: Vec<String> = queries
        .iter()
        .map(|q| q.to_json().unwrap_or_else(|_| format!("{:?}", q.method)))
        .collect();
    format!("[{}]", parts.join(","))
}

/// Fold `NotFound` into `missing`, log and propagate every other error.
fn found_or<T, U>(
    result: Result<T>,
    op: &str,
    key: &str,
    found: impl FnOnce(T) -> U,
    missing: U,
) -> Result<U> {
    match result {
        Ok(value) => Ok(found(value)),
        Err(e) if e.is_not_found() => {
            debug!(op, key, "not found");
            Ok(missing)
        }
        Err(e) => {
            log_failure(op, key, &e);
            Err(e)
        }
    }
}
