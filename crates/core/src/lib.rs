pub mod backend;
pub mod error;
pub mod post;
pub mod service;

pub use backend::StoredFile;
pub use error::{Result, ServiceError};
pub use inkpress_appwrite::{ImageFormat, ImageGravity, InputFile, PreviewOptions, Query};
pub use post::{NewPost, Post, PostFields, PostList, PostStatus, PostUpdate};
pub use service::ContentService;
