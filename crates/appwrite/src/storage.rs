use std::fmt;
use std::path::Path;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Method, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{AppwriteClient, decode};
use crate::error::{AppwriteError, Result};

/// Uploads above this size are split into chunks of this size.
pub const CHUNK_SIZE: usize = 5 * 1024 * 1024;

// ---------------------------------------------------------------------------
// Data structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    #[serde(rename = "$id")]
    pub id: String,
    #[serde(rename = "bucketId")]
    pub bucket_id: String,
    #[serde(rename = "$createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "$updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(rename = "$permissions", default)]
    pub permissions: Vec<String>,
    pub name: String,
    #[serde(default)]
    pub signature: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    #[serde(rename = "sizeOriginal", default)]
    pub size_original: u64,
    #[serde(rename = "chunksTotal", default)]
    pub chunks_total: u64,
    #[serde(rename = "chunksUploaded", default)]
    pub chunks_uploaded: u64,
}

/// File contents plus the name and optional mime type sent with them.
#[derive(Debug, Clone)]
pub struct InputFile {
    pub name: String,
    pub mime_type: Option<String>,
    pub data: Bytes,
}

impl InputFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: None,
            data: data.into(),
        }
    }

    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("upload")
            .to_string();
        Ok(Self::from_bytes(name, data))
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageGravity {
    Center,
    TopLeft,
    Top,
    TopRight,
    Left,
    Right,
    BottomLeft,
    Bottom,
    BottomRight,
}

impl ImageGravity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Center => "center",
            Self::TopLeft => "top-left",
            Self::Top => "top",
            Self::TopRight => "top-right",
            Self::Left => "left",
            Self::Right => "right",
            Self::BottomLeft => "bottom-left",
            Self::Bottom => "bottom",
            Self::BottomRight => "bottom-right",
        }
    }
}

impl std::str::FromStr for ImageGravity {
    type Err = AppwriteError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "center" => Self::Center,
            "top-left" => Self::TopLeft,
            "top" => Self::Top,
            "top-right" => Self::TopRight,
            "left" => Self::Left,
            "right" => Self::Right,
            "bottom-left" => Self::BottomLeft,
            "bottom" => Self::Bottom,
            "bottom-right" => Self::BottomRight,
            other => {
                return Err(AppwriteError::InvalidArgument(format!(
                    "unknown gravity: {other}"
                )));
            }
        })
    }
}

impl fmt::Display for ImageGravity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpg,
    Jpeg,
    Png,
    Webp,
    Heic,
    Avif,
    Gif,
}

impl ImageFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jpg => "jpg",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
            Self::Webp => "webp",
            Self::Heic => "heic",
            Self::Avif => "avif",
            Self::Gif => "gif",
        }
    }
}

impl std::str::FromStr for ImageFormat {
    type Err = AppwriteError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "jpg" => Self::Jpg,
            "jpeg" => Self::Jpeg,
            "png" => Self::Png,
            "webp" => Self::Webp,
            "heic" => Self::Heic,
            "avif" => Self::Avif,
            "gif" => Self::Gif,
            other => {
                return Err(AppwriteError::InvalidArgument(format!(
                    "unknown image format: {other}"
                )));
            }
        })
    }
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Image transformation applied by the preview endpoint. Unset fields are
/// left to the service defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreviewOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub gravity: Option<ImageGravity>,
    pub quality: Option<u8>,
    pub border_width: Option<u32>,
    /// Hex color without the leading `#`.
    pub border_color: Option<String>,
    pub border_radius: Option<u32>,
    pub opacity: Option<f32>,
    pub rotation: Option<i32>,
    /// Hex color without the leading `#`.
    pub background: Option<String>,
    pub output: Option<ImageFormat>,
}

impl PreviewOptions {
    pub fn validate(&self) -> Result<()> {
        fn check(ok: bool, msg: &str) -> Result<()> {
            if ok {
                Ok(())
            } else {
                Err(AppwriteError::InvalidArgument(msg.to_string()))
            }
        }
        check(self.width.is_none_or(|w| w <= 4000), "width must be 0..=4000")?;
        check(self.height.is_none_or(|h| h <= 4000), "height must be 0..=4000")?;
        check(self.quality.is_none_or(|q| q <= 100), "quality must be 0..=100")?;
        check(
            self.border_width.is_none_or(|b| b <= 100),
            "border width must be 0..=100",
        )?;
        check(
            self.border_radius.is_none_or(|r| r <= 4000),
            "border radius must be 0..=4000",
        )?;
        check(
            self.opacity.is_none_or(|o| (0.0..=1.0).contains(&o)),
            "opacity must be 0..=1",
        )?;
        check(
            self.rotation.is_none_or(|r| (-360..=360).contains(&r)),
            "rotation must be -360..=360",
        )?;
        for color in [&self.border_color, &self.background].into_iter().flatten() {
            check(
                color.len() == 6 && color.chars().all(|c| c.is_ascii_hexdigit()),
                "colors must be six hex digits",
            )?;
        }
        Ok(())
    }

    fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(v) = self.width {
            params.push(("width", v.to_string()));
        }
        if let Some(v) = self.height {
            params.push(("height", v.to_string()));
        }
        if let Some(v) = self.gravity {
            params.push(("gravity", v.as_str().to_string()));
        }
        if let Some(v) = self.quality {
            params.push(("quality", v.to_string()));
        }
        if let Some(v) = self.border_width {
            params.push(("borderWidth", v.to_string()));
        }
        if let Some(ref v) = self.border_color {
            params.push(("borderColor", v.clone()));
        }
        if let Some(v) = self.border_radius {
            params.push(("borderRadius", v.to_string()));
        }
        if let Some(v) = self.opacity {
            params.push(("opacity", v.to_string()));
        }
        if let Some(v) = self.rotation {
            params.push(("rotation", v.to_string()));
        }
        if let Some(ref v) = self.background {
            params.push(("background", v.clone()));
        }
        if let Some(v) = self.output {
            params.push(("output", v.as_str().to_string()));
        }
        params
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Handle on the storage (bucket) API.
#[derive(Clone)]
pub struct Storage {
    client: AppwriteClient,
}

impl Storage {
    pub fn new(client: AppwriteClient) -> Self {
        Self { client }
    }

    fn files_path(bucket_id: &str) -> String {
        format!("/storage/buckets/{bucket_id}/files")
    }

    fn file_path(bucket_id: &str, file_id: &str) -> String {
        format!("{}/{file_id}", Self::files_path(bucket_id))
    }

    /// Upload a file under `file_id`. Files larger than [`CHUNK_SIZE`] are
    /// sent as sequential chunks; follow-up chunks carry the id returned by
    /// the first one.
    pub async fn create_file(
        &self,
        bucket_id: &str,
        file_id: &str,
        file: InputFile,
        permissions: Option<&[String]>,
    ) -> Result<File> {
        let url = self.client.url(&Self::files_path(bucket_id));
        let size = file.size();

        if size <= CHUNK_SIZE {
            let resp = self
                .client
                .execute(Method::POST, &url, |req| {
                    let form = upload_form(file_id, &file, file.data.clone(), permissions)?;
                    Ok(req.multipart(form))
                })
                .await?;
            let uploaded: File = decode(resp, &url).await?;
            info!(file = %uploaded.id, size, "file uploaded");
            return Ok(uploaded);
        }

        let mut uploaded_id: Option<String> = None;
        let mut last: Option<File> = None;
        let mut start = 0;
        while start < size {
            let end = (start + CHUNK_SIZE).min(size);
            let chunk = file.data.slice(start..end);
            let range = format!("bytes {start}-{}/{size}", end - 1);
            let resp = self
                .client
                .execute(Method::POST, &url, |req| {
                    let form = upload_form(file_id, &file, chunk.clone(), permissions)?;
                    let req = req.header("Content-Range", &range).multipart(form);
                    Ok(match &uploaded_id {
                        Some(id) => req.header("X-Appwrite-ID", id),
                        None => req,
                    })
                })
                .await?;
            let progress: File = decode(resp, &url).await?;
            debug!(
                file = %progress.id,
                chunks_uploaded = progress.chunks_uploaded,
                chunks_total = progress.chunks_total,
                "chunk uploaded"
            );
            uploaded_id = Some(progress.id.clone());
            last = Some(progress);
            start = end;
        }

        let uploaded = last.ok_or_else(|| {
            AppwriteError::InvalidArgument("chunked upload produced no response".into())
        })?;
        info!(file = %uploaded.id, size, chunks = uploaded.chunks_total, "file uploaded");
        Ok(uploaded)
    }

    pub async fn get_file(&self, bucket_id: &str, file_id: &str) -> Result<File> {
        self.client
            .get_json(&Self::file_path(bucket_id, file_id), &[])
            .await
    }

    pub async fn delete_file(&self, bucket_id: &str, file_id: &str) -> Result<()> {
        self.client
            .delete(&Self::file_path(bucket_id, file_id))
            .await
    }

    /// URL serving the file inline (no request is made).
    pub fn file_view_url(&self, bucket_id: &str, file_id: &str) -> Result<Url> {
        let path = format!("{}/view", Self::file_path(bucket_id, file_id));
        self.client.resource_url(&path, &[])
    }

    /// URL serving the file as an attachment (no request is made).
    pub fn file_download_url(&self, bucket_id: &str, file_id: &str) -> Result<Url> {
        let path = format!("{}/download", Self::file_path(bucket_id, file_id));
        self.client.resource_url(&path, &[])
    }

    /// URL of a transformed image preview (no request is made).
    pub fn file_preview_url(
        &self,
        bucket_id: &str,
        file_id: &str,
        options: &PreviewOptions,
    ) -> Result<Url> {
        options.validate()?;
        let path = format!("{}/preview", Self::file_path(bucket_id, file_id));
        self.client.resource_url(&path, &options.to_params())
    }
}

fn upload_form(
    file_id: &str,
    file: &InputFile,
    data: Bytes,
    permissions: Option<&[String]>,
) -> Result<Form> {
    let len = data.len() as u64;
    let mut part = Part::stream_with_length(Body::from(data), len).file_name(file.name.clone());
    if let Some(ref mime) = file.mime_type {
        part = part
            .mime_str(mime)
            .map_err(|e| AppwriteError::InvalidArgument(format!("mime type {mime}: {e}")))?;
    }
    let mut form = Form::new().text("fileId", file_id.to_string()).part("file", part);
    for permission in permissions.unwrap_or_default() {
        form = form.text("permissions[]", permission.clone());
    }
    Ok(form)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::tests::test_client;
    use serde_json::json;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn file_json(id: &str, uploaded: u64, total: u64) -> serde_json::Value {
        json!({
            "$id": id,
            "bucketId": "images",
            "$createdAt": "2024-01-15T10:00:00.000+00:00",
            "$updatedAt": "2024-01-15T10:00:00.000+00:00",
            "$permissions": [],
            "name": "cover.png",
            "signature": "5d529fd02b544198ae075bd57c1762bb",
            "mimeType": "image/png",
            "sizeOriginal": 17890,
            "chunksTotal": total,
            "chunksUploaded": uploaded
        })
    }

    #[test]
    fn deserialize_file() {
        let f: File = serde_json::from_value(file_json("f1", 1, 1)).unwrap();
        assert_eq!(f.id, "f1");
        assert_eq!(f.mime_type, "image/png");
        assert_eq!(f.size_original, 17890);
    }

    #[test]
    fn preview_url_carries_options() {
        let client = AppwriteClient::new(crate::ClientConfig::new(
            "https://example.com/v1",
            "blog",
        ))
        .unwrap();
        let storage = Storage::new(client);
        let options = PreviewOptions {
            width: Some(400),
            gravity: Some(ImageGravity::TopLeft),
            quality: Some(80),
            output: Some(ImageFormat::Webp),
            ..Default::default()
        };
        let url = storage.file_preview_url("images", "f1", &options).unwrap();
        assert_eq!(url.path(), "/v1/storage/buckets/images/files/f1/preview");
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(pairs.contains(&("width".into(), "400".into())));
        assert!(pairs.contains(&("gravity".into(), "top-left".into())));
        assert!(pairs.contains(&("quality".into(), "80".into())));
        assert!(pairs.contains(&("output".into(), "webp".into())));
        assert!(pairs.contains(&("project".into(), "blog".into())));
    }

    #[test]
    fn preview_options_are_validated() {
        let bad = [
            PreviewOptions {
                quality: Some(101),
                ..Default::default()
            },
            PreviewOptions {
                width: Some(5000),
                ..Default::default()
            },
            PreviewOptions {
                opacity: Some(1.5),
                ..Default::default()
            },
            PreviewOptions {
                rotation: Some(-400),
                ..Default::default()
            },
            PreviewOptions {
                background: Some("#ffffff".into()),
                ..Default::default()
            },
        ];
        for options in &bad {
            assert!(options.validate().is_err(), "{options:?}");
        }
        assert!(PreviewOptions::default().validate().is_ok());
    }

    #[test]
    fn parses_gravity_and_format() {
        assert_eq!(
            "bottom-right".parse::<ImageGravity>().unwrap(),
            ImageGravity::BottomRight
        );
        assert_eq!("PNG".parse::<ImageFormat>().unwrap(), ImageFormat::Png);
        assert!("sideways".parse::<ImageGravity>().is_err());
    }

    #[tokio::test]
    async fn small_upload_is_single_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/storage/buckets/images/files"))
            .respond_with(ResponseTemplate::new(201).set_body_json(file_json("f1", 1, 1)))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Storage::new(test_client(&server));
        let file = InputFile::from_bytes("cover.png", vec![0u8; 1024]);
        let uploaded = storage.create_file("images", "f1", file, None).await.unwrap();
        assert_eq!(uploaded.id, "f1");
    }

    #[tokio::test]
    async fn large_upload_is_chunked() {
        let server = MockServer::start().await;
        let size = CHUNK_SIZE + 10;
        Mock::given(method("POST"))
            .and(path("/v1/storage/buckets/images/files"))
            .and(header(
                "Content-Range",
                format!("bytes 0-{}/{size}", CHUNK_SIZE - 1).as_str(),
            ))
            .respond_with(ResponseTemplate::new(201).set_body_json(file_json("f1", 1, 2)))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/storage/buckets/images/files"))
            .and(header(
                "Content-Range",
                format!("bytes {CHUNK_SIZE}-{}/{size}", size - 1).as_str(),
            ))
            .and(header_exists("X-Appwrite-ID"))
            .respond_with(ResponseTemplate::new(201).set_body_json(file_json("f1", 2, 2)))
            .expect(1)
            .mount(&server)
            .await;

        let storage = Storage::new(test_client(&server));
        let file = InputFile::from_bytes("big.bin", vec![7u8; size]);
        let uploaded = storage.create_file("images", "f1", file, None).await.unwrap();
        assert_eq!(uploaded.chunks_uploaded, 2);
    }

    #[tokio::test]
    async fn from_path_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.jpg");
        tokio::fs::write(&path, b"jpeg").await.unwrap();
        let file = InputFile::from_path(&path).await.unwrap();
        assert_eq!(file.name, "cover.jpg");
        assert_eq!(file.size(), 4);
    }
}
