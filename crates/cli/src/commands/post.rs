use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde_json::json;

use inkpress_core::post::{STATUS_ATTRIBUTE, default_post_queries};
use inkpress_core::{NewPost, Post, PostFields, PostStatus, PostUpdate, Query};

use crate::config::AppConfig;

#[derive(Args)]
pub struct PostArgs {
    #[command(subcommand)]
    action: PostAction,
}

#[derive(Subcommand)]
enum PostAction {
    /// Create a post keyed by its slug
    Create {
        /// Unique slug, used as the document ID
        slug: String,
        #[arg(long)]
        title: String,
        /// Post body
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        /// Read the post body from a file
        #[arg(long)]
        content_file: Option<PathBuf>,
        /// File ID of the cover image
        #[arg(long)]
        featured_image: Option<String>,
        /// active or inactive
        #[arg(long, default_value = "active")]
        status: String,
        /// Author's user ID
        #[arg(long)]
        user_id: String,
    },
    /// Change fields of an existing post
    Update {
        slug: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long, conflicts_with = "content_file")]
        content: Option<String>,
        #[arg(long)]
        content_file: Option<PathBuf>,
        #[arg(long, conflicts_with = "clear_featured_image")]
        featured_image: Option<String>,
        /// Remove the cover image
        #[arg(long)]
        clear_featured_image: bool,
        #[arg(long)]
        status: Option<String>,
    },
    /// Delete a post
    Delete { slug: String },
    /// Show a single post
    Get {
        slug: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List posts (active ones unless filters are given)
    List {
        /// Only posts with this status
        #[arg(long, conflicts_with = "all")]
        status: Option<String>,
        /// Include every status
        #[arg(long)]
        all: bool,
        /// Raw query in the service's JSON form; repeatable
        #[arg(long = "query")]
        queries: Vec<String>,
        /// Maximum number of posts returned
        #[arg(long)]
        limit: Option<u32>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub async fn run(args: PostArgs, config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let service = config.open_service()?;

    match args.action {
        PostAction::Create {
            slug,
            title,
            content,
            content_file,
            featured_image,
            status,
            user_id,
        } => {
            let content = read_content(content, content_file)?.unwrap_or_default();
            let post = service
                .create_post(NewPost {
                    slug,
                    fields: PostFields {
                        title,
                        content,
                        featured_image,
                        status: status.parse()?,
                        user_id,
                    },
                })
                .await?;
            println!(
                "{} Post '{}' created.",
                console::style("✓").green(),
                post.slug
            );
        }
        PostAction::Update {
            slug,
            title,
            content,
            content_file,
            featured_image,
            clear_featured_image,
            status,
        } => {
            let update = PostUpdate {
                title,
                content: read_content(content, content_file)?,
                featured_image: featured_image_change(featured_image, clear_featured_image),
                status: status.map(|s| s.parse::<PostStatus>()).transpose()?,
            };
            let post = service.update_post(&slug, update).await?;
            println!(
                "{} Post '{}' updated.",
                console::style("✓").green(),
                post.slug
            );
        }
        PostAction::Delete { slug } => {
            if service.delete_post(&slug).await? {
                println!("Post '{slug}' deleted.");
            } else {
                anyhow::bail!("post '{slug}' not found");
            }
        }
        PostAction::Get { slug, json } => {
            let post = service
                .get_post(&slug)
                .await?
                .ok_or_else(|| anyhow::anyhow!("post '{slug}' not found"))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&post_json(&post))?);
            } else {
                print_post(&post);
            }
        }
        PostAction::List {
            status,
            all,
            queries,
            limit,
            json,
        } => {
            let mut filters = Vec::new();
            if let Some(status) = status {
                let status: PostStatus = status.parse()?;
                filters.push(Query::equal(STATUS_ATTRIBUTE, status.as_str()));
            }
            for raw in &queries {
                filters.push(
                    Query::from_json(raw).with_context(|| format!("invalid query: {raw}"))?,
                );
            }
            if let Some(limit) = limit {
                filters.push(Query::limit(limit));
            }

            let has_status_filter = filters
                .iter()
                .any(|q| q.attribute.as_deref() == Some(STATUS_ATTRIBUTE));
            let list = if all || has_status_filter {
                service.get_posts(&filters).await?
            } else if filters.is_empty() {
                service.get_active_posts().await?
            } else {
                let mut with_default = default_post_queries();
                with_default.extend(filters);
                service.get_posts(&with_default).await?
            };

            if json {
                let posts: Vec<_> = list.posts.iter().map(post_json).collect();
                let out = json!({ "total": list.total, "posts": posts });
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }

            if list.posts.is_empty() {
                println!("No posts found.");
                return Ok(());
            }

            println!(
                "{:<30} {:<40} {:<10} {:<20}",
                "SLUG", "TITLE", "STATUS", "UPDATED"
            );
            println!("{}", "-".repeat(100));
            for post in &list.posts {
                println!(
                    "{:<30} {:<40} {:<10} {:<20}",
                    post.slug,
                    truncate(&post.fields.title, 40),
                    post.fields.status,
                    post.updated_at
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| "-".into()),
                );
            }
            if list.total > list.posts.len() as u64 {
                println!("... {} of {} shown", list.posts.len(), list.total);
            }
        }
    }
    Ok(())
}

fn read_content(inline: Option<String>, file: Option<PathBuf>) -> Result<Option<String>> {
    match (inline, file) {
        (Some(text), _) => Ok(Some(text)),
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("failed to read {}", path.display())),
        (None, None) => Ok(None),
    }
}

fn featured_image_change(image: Option<String>, clear: bool) -> Option<Option<String>> {
    if clear { Some(None) } else { image.map(Some) }
}

fn post_json(post: &Post) -> serde_json::Value {
    json!({
        "slug": post.slug,
        "title": post.fields.title,
        "content": post.fields.content,
        "featuredImage": post.fields.featured_image,
        "status": post.fields.status,
        "userId": post.fields.user_id,
        "createdAt": post.created_at,
        "updatedAt": post.updated_at,
    })
}

fn print_post(post: &Post) {
    println!("Slug:     {}", post.slug);
    println!("Title:    {}", post.fields.title);
    println!("Status:   {}", post.fields.status);
    println!("Author:   {}", post.fields.user_id);
    println!(
        "Image:    {}",
        post.fields.featured_image.as_deref().unwrap_or("-")
    );
    if let Some(created) = post.created_at {
        println!("Created:  {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(updated) = post.updated_at {
        println!("Updated:  {}", updated.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    println!();
    println!("{}", post.fields.content);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_long_titles() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer title", 10), "a much ...");
    }

    #[test]
    fn featured_image_flags() {
        assert_eq!(featured_image_change(None, false), None);
        assert_eq!(featured_image_change(None, true), Some(None));
        assert_eq!(
            featured_image_change(Some("img".into()), false),
            Some(Some("img".into()))
        );
    }

    #[test]
    fn inline_content_wins() {
        let content = read_content(Some("inline".into()), None).unwrap();
        assert_eq!(content.as_deref(), Some("inline"));
        assert!(read_content(None, None).unwrap().is_none());
    }

    #[test]
    fn content_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("body.md");
        std::fs::write(&path, "# Hello").unwrap();
        let content = read_content(None, Some(path)).unwrap();
        assert_eq!(content.as_deref(), Some("# Hello"));
    }
}
