pub mod auth;
pub mod client;
pub mod databases;
pub mod error;
pub mod id;
pub mod query;
pub mod storage;

pub use auth::Credentials;
pub use client::{AppwriteClient, ClientConfig};
pub use databases::{Databases, Document, DocumentList};
pub use error::{AppwriteError, Result};
pub use query::{Query, QueryMethod};
pub use storage::{ImageFormat, ImageGravity, InputFile, PreviewOptions, Storage};
