use async_trait::async_trait;
use inkpress_appwrite::storage::File;
use inkpress_appwrite::{
    AppwriteClient, Databases, Document, DocumentList, InputFile, PreviewOptions, Query, Storage,
};
use reqwest::Url;

use super::{FileStore, PostStore, StoredFile};
use crate::error::Result;
use crate::post::{NewPost, Post, PostFields, PostList, PostUpdate};

/// Where posts and files live inside the project.
#[derive(Debug, Clone)]
pub struct AppwriteTargets {
    pub database_id: String,
    pub collection_id: String,
    pub bucket_id: String,
}

/// Posts in a document collection and files in a storage bucket, both
/// reached through one shared client.
pub struct AppwriteBackend {
    databases: Databases,
    storage: Storage,
    targets: AppwriteTargets,
}

impl AppwriteBackend {
    pub fn new(client: AppwriteClient, targets: AppwriteTargets) -> Self {
        Self {
            databases: Databases::new(client.clone()),
            storage: Storage::new(client),
            targets,
        }
    }
}

impl From<File> for StoredFile {
    fn from(file: File) -> Self {
        Self {
            id: file.id,
            name: file.name,
            mime_type: file.mime_type,
            size: file.size_original,
            created_at: file.created_at,
        }
    }
}

#[async_trait]
impl PostStore for AppwriteBackend {
    async fn create(&self, post: &NewPost) -> Result<Post> {
        let doc: Document<PostFields> = self
            .databases
            .create_document(
                &self.targets.database_id,
                &self.targets.collection_id,
                &post.slug,
                &post.fields,
                None,
            )
            .await?;
        Ok(doc.into())
    }

    async fn update(&self, slug: &str, update: &PostUpdate) -> Result<Post> {
        let doc: Document<PostFields> = self
            .databases
            .update_document(
                &self.targets.database_id,
                &self.targets.collection_id,
                slug,
                update,
                None,
            )
            .await?;
        Ok(doc.into())
    }

    async fn delete(&self, slug: &str) -> Result<()> {
        self.databases
            .delete_document(&self.targets.database_id, &self.targets.collection_id, slug)
            .await?;
        Ok(())
    }

    async fn get(&self, slug: &str) -> Result<Post> {
        let doc: Document<PostFields> = self
            .databases
            .get_document(
                &self.targets.database_id,
                &self.targets.collection_id,
                slug,
                &[],
            )
            .await?;
        Ok(doc.into())
    }

    async fn list(&self, queries: &[Query]) -> Result<PostList> {
        let list: DocumentList<PostFields> = self
            .databases
            .list_documents(
                &self.targets.database_id,
                &self.targets.collection_id,
                queries,
            )
            .await?;
        Ok(PostList {
            total: list.total,
            posts: list.documents.into_iter().map(Post::from).collect(),
        })
    }
}

#[async_trait]
impl FileStore for AppwriteBackend {
    async fn upload(&self, file_id: &str, file: InputFile) -> Result<StoredFile> {
        let file = self
            .storage
            .create_file(&self.targets.bucket_id, file_id, file, None)
            .await?;
        Ok(file.into())
    }

    async fn get(&self, file_id: &str) -> Result<StoredFile> {
        let file = self
            .storage
            .get_file(&self.targets.bucket_id, file_id)
            .await?;
        Ok(file.into())
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        self.storage
            .delete_file(&self.targets.bucket_id, file_id)
            .await?;
        Ok(())
    }

    fn view_url(&self, file_id: &str) -> Result<Url> {
        Ok(self.storage.file_view_url(&self.targets.bucket_id, file_id)?)
    }

    fn download_url(&self, file_id: &str) -> Result<Url> {
        Ok(self
            .storage
            .file_download_url(&self.targets.bucket_id, file_id)?)
    }

    fn preview_url(&self, file_id: &str, options: &PreviewOptions) -> Result<Url> {
        Ok(self
            .storage
            .file_preview_url(&self.targets.bucket_id, file_id, options)?)
    }
}
