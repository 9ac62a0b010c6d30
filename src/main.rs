use ai_tools_uploads::app::App;
use ai_tools_uploads::models::ImageFile;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "ai-tools-uploads")]
#[command(about = "Upload and manage blog images on the configured storage backend")]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Upload an image, optionally making it a post's featured image.
    Upload {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        /// Post id to attach the uploaded image to.
        #[arg(long)]
        post: Option<String>,
        /// Override the content type inferred from the file name.
        #[arg(long, value_name = "MIME")]
        content_type: Option<String>,
    },
    /// Delete a stored image by the filename returned at upload.
    Delete {
        #[arg(value_name = "FILENAME")]
        filename: String,
    },
    /// Delete a post together with its image.
    DeletePost {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Show which storage backend the environment selects.
    Provider,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn read_image_file(path: &Path, content_type: Option<String>) -> Result<ImageFile> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let mut file = ImageFile::new(bytes);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        file = file.with_name(name);
    }
    if let Some(content_type) = content_type {
        file = file.with_content_type(content_type);
    }
    Ok(file)
}

async fn run(app: App, command: Command) -> Result<bool> {
    match command {
        Command::Upload {
            path,
            post,
            content_type,
        } => {
            let file = read_image_file(&path, content_type).await?;
            let summary = match post {
                Some(post_id) => app.attach_image(&post_id, &file).await?,
                None => app.upload(&file).await?,
            };
            print_json(&summary)?;
            Ok(true)
        }
        Command::Delete { filename } => {
            let deleted = app.delete_image(&filename).await;
            print_json(&serde_json::json!({ "filename": filename, "deleted": deleted }))?;
            Ok(deleted)
        }
        Command::DeletePost { id } => match app.delete_post(&id).await? {
            Some(deleted) => {
                print_json(&deleted)?;
                Ok(true)
            }
            None => {
                error!("Post '{}' not found", id);
                Ok(false)
            }
        },
        Command::Provider => {
            println!("{}", app.provider());
            Ok(true)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ai_tools_uploads=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let app = match App::from_env() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };
    info!("Using {} image storage", app.provider());

    match run(app, args.command).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Command failed: {:#}", e);
            std::process::exit(1);
        }
    }
}
