use chrono::{DateTime, Utc};
use inkpress_appwrite::{Document, Query, id};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ServiceError};

/// Attribute the default listing filters on.
pub const STATUS_ATTRIBUTE: &str = "status";
/// Status matched by [`default_post_queries`].
pub const DEFAULT_POST_STATUS: PostStatus = PostStatus::Active;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Active,
    Inactive,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PostStatus {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            other => Err(ServiceError::InvalidInput(format!(
                "unknown post status: {other} (expected active or inactive)"
            ))),
        }
    }
}

/// The stored attributes of a post, as they appear in the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostFields {
    pub title: String,
    pub content: String,
    /// Id of the cover image in the file bucket.
    #[serde(default)]
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub slug: String,
    pub fields: PostFields,
}

/// Partial update. `user_id` is fixed at creation and cannot be changed.
///
/// `featured_image` is tri-state: `None` leaves it alone, `Some(None)`
/// clears it, `Some(Some(id))` sets it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured_image: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<PostStatus>,
}

impl PostUpdate {
    pub(crate) fn apply(&self, fields: &mut PostFields) {
        if let Some(ref title) = self.title {
            fields.title = title.clone();
        }
        if let Some(ref content) = self.content {
            fields.content = content.clone();
        }
        if let Some(ref image) = self.featured_image {
            fields.featured_image = image.clone();
        }
        if let Some(status) = self.status {
            fields.status = status;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Post {
    pub slug: String,
    pub fields: PostFields,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Document<PostFields>> for Post {
    fn from(doc: Document<PostFields>) -> Self {
        Self {
            slug: doc.id,
            fields: doc.data,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostList {
    /// Matches before paging.
    pub total: u64,
    pub posts: Vec<Post>,
}

/// Filter applied by [`crate::ContentService::get_active_posts`].
pub fn default_post_queries() -> Vec<Query> {
    vec![Query::equal(STATUS_ATTRIBUTE, DEFAULT_POST_STATUS.as_str())]
}

/// Reject identifiers the backend would refuse as document or file ids.
pub fn validate_id(kind: &str, value: &str) -> Result<()> {
    if id::is_valid(value) {
        Ok(())
    } else {
        Err(ServiceError::InvalidInput(format!(
            "{kind} '{value}' must be 1-{} characters of a-z, A-Z, 0-9, '.', '-', '_' and start with a letter or digit",
            id::MAX_ID_LEN
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn fields_use_collection_attribute_names() {
        let fields = PostFields {
            title: "Hello".into(),
            content: "<p>World</p>".into(),
            featured_image: Some("img1".into()),
            status: PostStatus::Active,
            user_id: "u1".into(),
        };
        assert_eq!(
            serde_json::to_value(&fields).unwrap(),
            json!({
                "title": "Hello",
                "content": "<p>World</p>",
                "featuredImage": "img1",
                "status": "active",
                "userId": "u1"
            })
        );
    }

    #[test]
    fn update_sends_only_set_fields() {
        let update = PostUpdate {
            status: Some(PostStatus::Inactive),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&update).unwrap(),
            json!({"status": "inactive"})
        );
        assert_eq!(
            serde_json::to_value(PostUpdate::default()).unwrap(),
            json!({})
        );
    }

    #[test]
    fn update_can_clear_featured_image() {
        let clear = PostUpdate {
            featured_image: Some(None),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&clear).unwrap(),
            json!({"featuredImage": null})
        );

        let mut fields = PostFields {
            title: "Hello".into(),
            content: "body".into(),
            featured_image: Some("img1".into()),
            status: PostStatus::Active,
            user_id: "u1".into(),
        };
        PostUpdate {
            featured_image: Some(Some("img2".into())),
            ..Default::default()
        }
        .apply(&mut fields);
        assert_eq!(fields.featured_image.as_deref(), Some("img2"));

        PostUpdate::default().apply(&mut fields);
        assert_eq!(fields.featured_image.as_deref(), Some("img2"));

        clear.apply(&mut fields);
        assert!(fields.featured_image.is_none());
        assert_eq!(fields.title, "Hello");
    }

    #[test]
    fn post_from_document() {
        let doc: Document<PostFields> = serde_json::from_value(json!({
            "$id": "hello-world",
            "$collectionId": "posts",
            "$databaseId": "blog",
            "$createdAt": "2024-03-01T08:30:00.000+00:00",
            "$updatedAt": "2024-03-02T08:30:00.000+00:00",
            "$permissions": [],
            "title": "Hello",
            "content": "body",
            "featuredImage": null,
            "status": "inactive",
            "userId": "u1"
        }))
        .unwrap();
        let post = Post::from(doc);
        assert_eq!(post.slug, "hello-world");
        assert_eq!(post.fields.status, PostStatus::Inactive);
        assert!(post.fields.featured_image.is_none());
        assert!(post.updated_at > post.created_at);
    }

    #[test]
    fn default_queries_filter_active() {
        let queries = default_post_queries();
        assert_eq!(queries, vec![Query::equal("status", "active")]);
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("Active".parse::<PostStatus>().unwrap(), PostStatus::Active);
        assert!("draft".parse::<PostStatus>().is_err());
    }

    #[test]
    fn slug_validation() {
        assert!(validate_id("slug", "my-first-post").is_ok());
        assert!(validate_id("slug", "").is_err());
        assert!(validate_id("slug", "My First Post").is_err());
    }
}
