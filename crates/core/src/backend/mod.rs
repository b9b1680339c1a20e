pub mod appwrite;
pub mod local;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inkpress_appwrite::{InputFile, PreviewOptions, Query};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::post::{NewPost, Post, PostList, PostUpdate};

/// Metadata of a file held in the bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub size: u64,
    pub created_at: Option<DateTime<Utc>>,
}

/// Document collection holding posts, keyed by slug.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create(&self, post: &NewPost) -> Result<Post>;
    async fn update(&self, slug: &str, update: &PostUpdate) -> Result<Post>;
    async fn delete(&self, slug: &str) -> Result<()>;
    async fn get(&self, slug: &str) -> Result<Post>;
    async fn list(&self, queries: &[Query]) -> Result<PostList>;
}

/// Bucket holding uploaded files.
#[async_trait]
pub trait FileStore: Send + Sync {
    async fn upload(&self, file_id: &str, file: InputFile) -> Result<StoredFile>;
    async fn get(&self, file_id: &str) -> Result<StoredFile>;
    async fn delete(&self, file_id: &str) -> Result<()>;
    fn view_url(&self, file_id: &str) -> Result<Url>;
    fn download_url(&self, file_id: &str) -> Result<Url>;
    fn preview_url(&self, file_id: &str, options: &PreviewOptions) -> Result<Url>;
}
