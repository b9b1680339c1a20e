pub mod file;
pub mod init;
pub mod post;

use clap::Subcommand;

#[derive(Subcommand)]
pub enum Command {
    /// Write a config file for a backend
    Init(init::InitArgs),
    /// Create, edit, list and remove posts
    Post(post::PostArgs),
    /// Upload files and resolve their URLs
    File(file::FileArgs),
}
