use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use inkpress_appwrite::{Document, InputFile, PreviewOptions, Query, QueryMethod, id};
use reqwest::Url;
use serde_json::Value;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{FileStore, PostStore, StoredFile};
use crate::error::{Result, ServiceError};
use crate::post::{NewPost, Post, PostFields, PostList, PostUpdate};

const POSTS_DIR: &str = "posts";
const FILES_DIR: &str = "files";
const DATA_FILE: &str = "data";
const META_FILE: &str = "meta.json";
const TEMP_EXT: &str = "tmp";
/// Page size when no `limit` query is given, matching the hosted service.
const DEFAULT_LIMIT: usize = 25;

/// Posts and files kept in a directory tree, for offline use and tests.
///
/// Layout: `posts/<slug>.json` and `files/<id>/{data,meta.json}`.
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    pub fn init(path: impl AsRef<Path>) -> Result<Self> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join(POSTS_DIR))?;
        std::fs::create_dir_all(root.join(FILES_DIR))?;
        Ok(Self { root })
    }

    fn post_path(&self, slug: &str) -> PathBuf {
        self.root.join(POSTS_DIR).join(format!("{slug}.json"))
    }

    fn file_dir(&self, file_id: &str) -> PathBuf {
        self.root.join(FILES_DIR).join(file_id)
    }

    async fn read_post(&self, slug: &str) -> Result<Document<PostFields>> {
        let data = tokio::fs::read(self.post_path(slug))
            .await
            .map_err(|e| not_found(e, format!("post '{slug}'")))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Write `data` to a fresh temp file next to the posts. The file is
    /// removed again if the write fails part way.
    async fn write_temp(&self, data: &[u8]) -> Result<PathBuf> {
        let tmp = self
            .root
            .join(POSTS_DIR)
            .join(format!(".{}.{TEMP_EXT}", id::unique()));
        let written = async {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(tmp)
    }

    /// Replace a post file in one step so readers never see a partial one.
    async fn write_post(&self, doc: &Document<PostFields>) -> Result<()> {
        let tmp = self.write_temp(&serde_json::to_vec_pretty(doc)?).await?;
        if let Err(e) = tokio::fs::rename(&tmp, self.post_path(&doc.id)).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }

    async fn read_all_posts(&self) -> Result<Vec<Document<PostFields>>> {
        let dir = self.root.join(POSTS_DIR);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut docs = Vec::new();
        let mut read_dir = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read(&path).await?;
            match serde_json::from_slice(&data) {
                Ok(doc) => docs.push(doc),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable post"),
            }
        }
        Ok(docs)
    }

    fn file_url(&self, file_id: &str) -> Result<Url> {
        let path = std::path::absolute(self.file_dir(file_id).join(DATA_FILE))?;
        Url::from_file_path(&path).map_err(|_| {
            ServiceError::InvalidInput(format!("cannot build file url for {}", path.display()))
        })
    }
}

fn not_found(err: std::io::Error, what: String) -> ServiceError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ServiceError::NotFound(what)
    } else {
        err.into()
    }
}

#[async_trait]
impl PostStore for LocalBackend {
    async fn create(&self, post: &NewPost) -> Result<Post> {
        let now = Utc::now();
        let doc = Document {
            id: post.slug.clone(),
            collection_id: POSTS_DIR.to_string(),
            database_id: String::new(),
            created_at: Some(now),
            updated_at: Some(now),
            permissions: Vec::new(),
            data: post.fields.clone(),
        };
        let tmp = self.write_temp(&serde_json::to_vec_pretty(&doc)?).await?;

        // Linking fails if the slug is taken, and publishes the complete file.
        let linked = tokio::fs::hard_link(&tmp, self.post_path(&post.slug)).await;
        let _ = tokio::fs::remove_file(&tmp).await;
        linked.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ServiceError::AlreadyExists(format!("post '{}'", post.slug))
            } else {
                e.into()
            }
        })?;

        Ok(doc.into())
    }

    async fn update(&self, slug: &str, update: &PostUpdate) -> Result<Post> {
        let mut doc = self.read_post(slug).await?;
        update.apply(&mut doc.data);
        doc.updated_at = Some(Utc::now());
        self.write_post(&doc).await?;
        Ok(doc.into())
    }

    async fn delete(&self, slug: &str) -> Result<()> {
        tokio::fs::remove_file(self.post_path(slug))
            .await
            .map_err(|e| not_found(e, format!("post '{slug}'")))
    }

    async fn get(&self, slug: &str) -> Result<Post> {
        Ok(self.read_post(slug).await?.into())
    }

    async fn list(&self, queries: &[Query]) -> Result<PostList> {
        let plan = QueryPlan::new(queries)?;
        let docs = self.read_all_posts().await?;
        let mut rows = Vec::with_capacity(docs.len());
        for doc in docs {
            rows.push((serde_json::to_value(&doc)?, doc));
        }
        let (total, docs) = plan.run(rows)?;
        debug!(total, returned = docs.len(), "listed local posts");
        Ok(PostList {
            total,
            posts: docs.into_iter().map(Post::from).collect(),
        })
    }
}

#[async_trait]
impl FileStore for LocalBackend {
    async fn upload(&self, file_id: &str, file: InputFile) -> Result<StoredFile> {
        let dir = self.file_dir(file_id);
        tokio::fs::create_dir_all(self.root.join(FILES_DIR)).await?;
        tokio::fs::create_dir(&dir).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                ServiceError::AlreadyExists(format!("file '{file_id}'"))
            } else {
                e.into()
            }
        })?;

        let stored = StoredFile {
            id: file_id.to_string(),
            mime_type: file
                .mime_type
                .clone()
                .unwrap_or_else(|| guess_mime(&file.name).to_string()),
            name: file.name,
            size: file.data.len() as u64,
            created_at: Some(Utc::now()),
        };
        tokio::fs::write(dir.join(DATA_FILE), &file.data).await?;
        tokio::fs::write(dir.join(META_FILE), serde_json::to_vec_pretty(&stored)?).await?;
        Ok(stored)
    }

    async fn get(&self, file_id: &str) -> Result<StoredFile> {
        let data = tokio::fs::read(self.file_dir(file_id).join(META_FILE))
            .await
            .map_err(|e| not_found(e, format!("file '{file_id}'")))?;
        Ok(serde_json::from_slice(&data)?)
    }

    async fn delete(&self, file_id: &str) -> Result<()> {
        tokio::fs::remove_dir_all(self.file_dir(file_id))
            .await
            .map_err(|e| not_found(e, format!("file '{file_id}'")))
    }

    fn view_url(&self, file_id: &str) -> Result<Url> {
        self.file_url(file_id)
    }

    fn download_url(&self, file_id: &str) -> Result<Url> {
        self.file_url(file_id)
    }

    fn preview_url(&self, _file_id: &str, _options: &PreviewOptions) -> Result<Url> {
        Err(ServiceError::Unsupported(
            "image previews need the hosted backend".into(),
        ))
    }
}

fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("heic") => "image/heic",
        Some("svg") => "image/svg+xml",
        Some("txt" | "md") => "text/plain",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

// ---------------------------------------------------------------------------
// Query evaluation
// ---------------------------------------------------------------------------

enum Cursor<'a> {
    After(&'a str),
    Before(&'a str),
}

struct QueryPlan<'a> {
    filters: Vec<&'a Query>,
    order: Vec<(&'a str, bool)>,
    limit: usize,
    offset: usize,
    cursor: Option<Cursor<'a>>,
}

impl<'a> QueryPlan<'a> {
    fn new(queries: &'a [Query]) -> Result<Self> {
        let mut plan = Self {
            filters: Vec::new(),
            order: Vec::new(),
            limit: DEFAULT_LIMIT,
            offset: 0,
            cursor: None,
        };
        for q in queries {
            match q.method {
                QueryMethod::OrderAsc => plan.order.push((attribute(q)?, false)),
                QueryMethod::OrderDesc => plan.order.push((attribute(q)?, true)),
                QueryMethod::Limit => plan.limit = count(q)?,
                QueryMethod::Offset => plan.offset = count(q)?,
                QueryMethod::CursorAfter => plan.cursor = Some(Cursor::After(text(q, 0)?)),
                QueryMethod::CursorBefore => plan.cursor = Some(Cursor::Before(text(q, 0)?)),
                QueryMethod::Select => {
                    return Err(ServiceError::Unsupported(
                        "select queries are not supported by the local backend".into(),
                    ));
                }
                _ => {
                    attribute(q)?;
                    plan.filters.push(q);
                }
            }
        }
        Ok(plan)
    }

    /// Filter, order and page `rows`; returns the match count before paging.
    fn run<T>(&self, rows: Vec<(Value, T)>) -> Result<(u64, Vec<T>)> {
        let mut matched = Vec::new();
        for (value, item) in rows {
            if self.matches(&value)? {
                matched.push((value, item));
            }
        }
        let total = matched.len() as u64;

        matched.sort_by(|(a, _), (b, _)| {
            for (attr, desc) in &self.order {
                let ord = compare(field(a, attr), field(b, attr)).unwrap_or(Ordering::Equal);
                let ord = if *desc { ord.reverse() } else { ord };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            compare(field(a, "$createdAt"), field(b, "$createdAt"))
                .unwrap_or(Ordering::Equal)
                .then_with(|| compare(field(a, "$id"), field(b, "$id")).unwrap_or(Ordering::Equal))
        });

        let window: Vec<T> = match &self.cursor {
            None => page(matched.into_iter(), self.offset, self.limit),
            Some(cursor) => {
                let id = match cursor {
                    Cursor::After(id) | Cursor::Before(id) => *id,
                };
                let idx = matched
                    .iter()
                    .position(|(v, _)| field(v, "$id").as_str() == Some(id))
                    .ok_or_else(|| {
                        ServiceError::InvalidInput(format!("cursor document '{id}' not found"))
                    })?;
                match cursor {
                    Cursor::After(_) => {
                        page(matched.into_iter().skip(idx + 1), self.offset, self.limit)
                    }
                    Cursor::Before(_) => {
                        let before: Vec<_> = matched.into_iter().take(idx).collect();
                        let mut items = page(before.into_iter().rev(), self.offset, self.limit);
                        items.reverse();
                        items
                    }
                }
            }
        };
        Ok((total, window))
    }

    fn matches(&self, doc: &Value) -> Result<bool> {
        for q in &self.filters {
            if !filter_matches(doc, q)? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn page<T>(items: impl Iterator<Item = (Value, T)>, offset: usize, limit: usize) -> Vec<T> {
    items.skip(offset).take(limit).map(|(_, item)| item).collect()
}

fn field<'v>(doc: &'v Value, attribute: &str) -> &'v Value {
    doc.get(attribute).unwrap_or(&Value::Null)
}

fn attribute(q: &Query) -> Result<&str> {
    q.attribute.as_deref().ok_or_else(|| {
        ServiceError::InvalidInput(format!("{:?} query needs an attribute", q.method))
    })
}

fn value(q: &Query, idx: usize) -> Result<&Value> {
    q.values.get(idx).ok_or_else(|| {
        ServiceError::InvalidInput(format!("{:?} query needs {} value(s)", q.method, idx + 1))
    })
}

fn text(q: &Query, idx: usize) -> Result<&str> {
    value(q, idx)?
        .as_str()
        .ok_or_else(|| ServiceError::InvalidInput(format!("{:?} query needs a string", q.method)))
}

fn count(q: &Query) -> Result<usize> {
    value(q, 0)?
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| {
            ServiceError::InvalidInput(format!("{:?} query needs a non-negative integer", q.method))
        })
}

fn filter_matches(doc: &Value, q: &Query) -> Result<bool> {
    let current = field(doc, attribute(q)?);
    let ord = |idx: usize| -> Result<Option<Ordering>> { Ok(compare(current, value(q, idx)?)) };
    Ok(match q.method {
        QueryMethod::Equal => q.values.iter().any(|v| v == current),
        QueryMethod::NotEqual => !q.values.iter().any(|v| v == current),
        QueryMethod::LessThan => ord(0)? == Some(Ordering::Less),
        QueryMethod::LessThanEqual => matches!(ord(0)?, Some(Ordering::Less | Ordering::Equal)),
        QueryMethod::GreaterThan => ord(0)? == Some(Ordering::Greater),
        QueryMethod::GreaterThanEqual => {
            matches!(ord(0)?, Some(Ordering::Greater | Ordering::Equal))
        }
        QueryMethod::Between => {
            matches!(ord(0)?, Some(Ordering::Greater | Ordering::Equal))
                && matches!(ord(1)?, Some(Ordering::Less | Ordering::Equal))
        }
        QueryMethod::IsNull => current.is_null(),
        QueryMethod::IsNotNull => !current.is_null(),
        QueryMethod::StartsWith => current
            .as_str()
            .is_some_and(|s| text(q, 0).is_ok_and(|p| s.starts_with(p))),
        QueryMethod::EndsWith => current
            .as_str()
            .is_some_and(|s| text(q, 0).is_ok_and(|p| s.ends_with(p))),
        QueryMethod::Search => {
            let needle = text(q, 0)?.to_lowercase();
            current
                .as_str()
                .is_some_and(|s| s.to_lowercase().contains(&needle))
        }
        other => {
            return Err(ServiceError::Unsupported(format!(
                "{other:?} is not a filter"
            )));
        }
    })
}

/// Order two attribute values. Timestamps compare as instants, other
/// strings lexically, numbers numerically; mixed kinds are unordered.
fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                DateTime::parse_from_rfc3339(x),
                DateTime::parse_from_rfc3339(y),
            ) {
                (Ok(dx), Ok(dy)) => Some(dx.cmp(&dy)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}
