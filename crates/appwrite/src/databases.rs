use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::AppwriteClient;
use crate::error::Result;
use crate::query::Query;

// ---------------------------------------------------------------------------
// Data structs
// ---------------------------------------------------------------------------

/// A stored document: system attributes plus the collection's own
/// attributes flattened into `data`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document<T> {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "$collectionId", default)]
    pub collection_id: String,
    #[serde(rename = "$databaseId", default)]
    pub database_id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "$permissions", default)]
    pub permissions: Vec<String>,
    #[serde(flatten)]
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DocumentList<T> {
    pub total: u64,
    pub documents: Vec<Document<T>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateDocument<'a, D: ?Sized> {
    document_id: &'a str,
    data: &'a D,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<&'a [String]>,
}

#[derive(Serialize)]
struct UpdateDocument<'a, D: ?Sized> {
    data: &'a D,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissions: Option<&'a [String]>,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle on the document database API.
#[derive(Clone)]
pub struct Databases {
    client: AppwriteClient,
}

impl Databases {
    pub fn new(client: AppwriteClient) -> Self {
        Self { client }
    }

    fn documents_path(database_id: &str, collection_id: &str) -> String {
        format!("/databases/{database_id}/collections/{collection_id}/documents")
    }

    /// Create a document under `document_id`; the service rejects an id
    /// that already exists with 409.
    pub async fn create_document<D, T>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &D,
        permissions: Option<&[String]>,
    ) -> Result<Document<T>>
    where
        D: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let path = Self::documents_path(database_id, collection_id);
        let body = CreateDocument {
            document_id,
            data,
            permissions,
        };
        let doc: Document<T> = self.client.send_json(Method::POST, &path, &body).await?;
        debug!(document = %doc.id, collection = %collection_id, "document created");
        Ok(doc)
    }

    /// Patch the given attributes of an existing document.
    pub async fn update_document<D, T>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        data: &D,
        permissions: Option<&[String]>,
    ) -> Result<Document<T>>
    where
        D: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let path = format!(
            "{}/{document_id}",
            Self::documents_path(database_id, collection_id)
        );
        let body = UpdateDocument { data, permissions };
        self.client.send_json(Method::PATCH, &path, &body).await
    }

    pub async fn delete_document(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
    ) -> Result<()> {
        let path = format!(
            "{}/{document_id}",
            Self::documents_path(database_id, collection_id)
        );
        self.client.delete(&path).await
    }

    pub async fn get_document<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        document_id: &str,
        queries: &[Query],
    ) -> Result<Document<T>> {
        let path = format!(
            "{}/{document_id}",
            Self::documents_path(database_id, collection_id)
        );
        self.client.get_json(&path, queries).await
    }

    pub async fn list_documents<T: DeserializeOwned>(
        &self,
        database_id: &str,
        collection_id: &str,
        queries: &[Query],
    ) -> Result<DocumentList<T>> {
        let path = Self::documents_path(database_id, collection_id);
        let list: DocumentList<T> = self.client.get_json(&path, queries).await?;
        debug!(
            collection = %collection_id,
            total = list.total,
            returned = list.documents.len(),
            "listed documents"
        );
        Ok(list)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Note {
        title: String,
    }

    fn note_doc(id: &str, title: &str) -> serde_json::Value {
        json!({
            "$id": id,
            "$collectionId": "notes",
            "$databaseId": "main",
            "$createdAt": "2024-01-15T10:00:00.000+00:00",
            "$updatedAt": "2024-01-15T10:00:00.000+00:00",
            "$permissions": [],
            "title": title
        })
    }

    #[test]
    fn deserialize_document() {
        let doc: Document<Note> = serde_json::from_value(note_doc("n1", "Hello")).unwrap();
        assert_eq!(doc.id, "n1");
        assert_eq!(doc.collection_id, "notes");
        assert_eq!(doc.data.title, "Hello");
        assert!(doc.created_at.is_some());
    }

    #[tokio::test]
    async fn create_sends_document_id_and_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/databases/main/collections/notes/documents"))
            .and(body_json(json!({"documentId": "n1", "data": {"title": "Hello"}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(note_doc("n1", "Hello")))
            .expect(1)
            .mount(&server)
            .await;

        let db = Databases::new(test_client(&server));
        let doc: Document<Note> = db
            .create_document(
                "main",
                "notes",
                "n1",
                &Note {
                    title: "Hello".into(),
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(doc.id, "n1");
    }

    #[tokio::test]
    async fn update_uses_patch() {
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/v1/databases/main/collections/notes/documents/n1"))
            .and(body_json(json!({"data": {"title": "Edited"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(note_doc("n1", "Edited")))
            .expect(1)
            .mount(&server)
            .await;

        let db = Databases::new(test_client(&server));
        let doc: Document<Note> = db
            .update_document("main", "notes", "n1", &json!({"title": "Edited"}), None)
            .await
            .unwrap();
        assert_eq!(doc.data.title, "Edited");
    }

    #[tokio::test]
    async fn list_passes_queries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/databases/main/collections/notes/documents"))
            .and(query_param(
                "queries[]",
                r#"{"method":"equal","attribute":"title","values":["Hello"]}"#,
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total": 1,
                "documents": [note_doc("n1", "Hello")]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let db = Databases::new(test_client(&server));
        let list: DocumentList<Note> = db
            .list_documents("main", "notes", &[Query::equal("title", "Hello")])
            .await
            .unwrap();
        assert_eq!(list.total, 1);
        assert_eq!(list.documents[0].data.title, "Hello");
    }

    #[tokio::test]
    async fn get_missing_document_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/databases/main/collections/notes/documents/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "message": "Document with the requested ID could not be found.",
                "code": 404,
                "type": "document_not_found"
            })))
            .mount(&server)
            .await;

        let db = Databases::new(test_client(&server));
        let err = db
            .get_document::<Note>("main", "notes", "nope", &[])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn delete_accepts_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/databases/main/collections/notes/documents/n1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let db = Databases::new(test_client(&server));
        db.delete_document("main", "notes", "n1").await.unwrap();
    }
}
