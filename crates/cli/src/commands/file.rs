use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Args, Subcommand};
use futures::future::join_all;

use inkpress_core::{ImageFormat, ImageGravity, InputFile, PreviewOptions};

use crate::config::AppConfig;
use crate::progress;

#[derive(Args)]
pub struct FileArgs {
    #[command(subcommand)]
    action: FileAction,
}

#[derive(Subcommand)]
enum FileAction {
    /// Upload a file and print its generated ID
    Upload {
        path: PathBuf,
        /// Override the detected content type
        #[arg(long)]
        mime_type: Option<String>,
    },
    /// Show file metadata
    Info { file_id: String },
    /// Delete one or more files
    Delete {
        #[arg(required = true)]
        file_ids: Vec<String>,
    },
    /// Print the view URL of a file
    Url {
        file_id: String,
        /// Print the download URL instead
        #[arg(long)]
        download: bool,
    },
    /// Print the URL of a transformed image preview
    Preview {
        file_id: String,
        #[command(flatten)]
        options: PreviewArgs,
    },
}

#[derive(Args)]
struct PreviewArgs {
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// center, top-left, top, top-right, left, right, bottom-left, bottom, bottom-right
    #[arg(long)]
    gravity: Option<ImageGravity>,
    /// 0-100
    #[arg(long)]
    quality: Option<u8>,
    #[arg(long)]
    border_width: Option<u32>,
    /// Hex color without '#'
    #[arg(long)]
    border_color: Option<String>,
    #[arg(long)]
    border_radius: Option<u32>,
    /// 0.0-1.0
    #[arg(long)]
    opacity: Option<f32>,
    /// Degrees, -360 to 360
    #[arg(long, allow_hyphen_values = true)]
    rotation: Option<i32>,
    /// Hex color without '#'
    #[arg(long)]
    background: Option<String>,
    /// jpg, jpeg, png, webp, heic, avif, gif
    #[arg(long)]
    output: Option<ImageFormat>,
}

impl From<PreviewArgs> for PreviewOptions {
    fn from(args: PreviewArgs) -> Self {
        Self {
            width: args.width,
            height: args.height,
            gravity: args.gravity,
            quality: args.quality,
            border_width: args.border_width,
            border_color: args.border_color.map(strip_hash),
            border_radius: args.border_radius,
            opacity: args.opacity,
            rotation: args.rotation,
            background: args.background.map(strip_hash),
            output: args.output,
        }
    }
}

fn strip_hash(color: String) -> String {
    color.trim_start_matches('#').to_string()
}

pub async fn run(args: FileArgs, config_path: &Path) -> Result<()> {
    let config = AppConfig::load(config_path)?;
    let service = config.open_service()?;

    match args.action {
        FileAction::Upload { path, mime_type } => {
            let mut input = InputFile::from_path(&path).await?;
            if let Some(mime) = mime_type {
                input = input.with_mime_type(mime);
            }
            let size = input.size() as u64;

            let pb = progress::create_spinner(&format!(
                "Uploading {} ({})...",
                input.name,
                progress::format_bytes(size)
            ));
            let result = service.upload_file(input).await;
            pb.finish_and_clear();
            let stored = result?;

            println!(
                "{} Uploaded {} as {}",
                console::style("✓").green(),
                stored.name,
                console::style(&stored.id).bold()
            );
        }
        FileAction::Info { file_id } => {
            let file = service
                .get_file(&file_id)
                .await?
                .ok_or_else(|| anyhow::anyhow!("file '{file_id}' not found"))?;
            println!("ID:       {}", file.id);
            println!("Name:     {}", file.name);
            println!("Type:     {}", file.mime_type);
            println!("Size:     {}", progress::format_bytes(file.size));
            if let Some(created) = file.created_at {
                println!("Created:  {}", created.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        FileAction::Delete { file_ids } => {
            let results = join_all(file_ids.iter().map(|id| service.delete_file(id))).await;
            let mut failed = 0;
            for (id, result) in file_ids.iter().zip(results) {
                match result {
                    Ok(true) => println!("{} Deleted {id}", console::style("✓").green()),
                    Ok(false) => {
                        failed += 1;
                        println!("{} {id}: not found", console::style("✗").red());
                    }
                    Err(e) => {
                        failed += 1;
                        println!("{} {id}: {e}", console::style("✗").red());
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{failed} of {} deletions failed", file_ids.len());
            }
        }
        FileAction::Url { file_id, download } => {
            let url = if download {
                service.get_file_download_url(&file_id)?
            } else {
                service.get_file_view_url(&file_id)?
            };
            println!("{url}");
        }
        FileAction::Preview { file_id, options } => {
            let url = service.get_file_preview_url(&file_id, &options.into())?;
            println!("{url}");
        }
    }
    Ok(())
}
