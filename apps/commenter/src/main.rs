use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CommentController, ControllerEvent, DurableNameCache, HttpCommentStore, ListState, NameCache,
    SubmitOutcome, COMMENTER_NAME_KEY,
};
use shared::domain::{Comment, PostId};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Read and write comments on a published post")]
struct Args {
    /// Comment server base url. Overrides commenter.toml and COMMENTS_SERVER_URL.
    #[arg(long)]
    server_url: Option<String>,
    /// Local database remembering the commenter name.
    #[arg(long)]
    cache_database_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every comment on a post.
    List { post_id: String },
    /// Add a comment to a post, then print the refreshed thread.
    Post {
        post_id: String,
        content: String,
        /// Display name; defaults to the last name used on this machine.
        #[arg(long)]
        name: Option<String>,
    },
    /// Show the cached commenter name.
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let args = Args::parse();

    let mut settings = load_settings()?;
    if let Some(server_url) = args.server_url {
        settings.server_url = server_url;
    }
    if let Some(cache_database_url) = args.cache_database_url {
        settings.cache_database_url = cache_database_url;
    }

    let name_cache = DurableNameCache::initialize(&settings.cache_database_url).await?;

    if let Command::Whoami = args.command {
        match name_cache.get(COMMENTER_NAME_KEY).await? {
            Some(name) => println!("{name}"),
            None => println!("(no cached name)"),
        }
        return Ok(());
    }

    let store = Arc::new(HttpCommentStore::new(&settings.server_url)?);
    info!(server_url = %store.base_url(), "commenter: using comment server");
    let controller = CommentController::new_with_dependencies(store, name_cache);
    spawn_event_log(&controller);

    match args.command {
        Command::List { post_id } => {
            controller
                .attach(PostId::new(post_id))
                .await
                .map_err(|e| anyhow!("could not load comments: {e}"))?;
        }
        Command::Post {
            post_id,
            content,
            name,
        } => {
            controller
                .attach(PostId::new(post_id))
                .await
                .map_err(|e| anyhow!("could not load comments: {e}"))?;
            if let Some(name) = name {
                controller.set_commenter_name(name).await;
            }
            controller.set_content(content).await;

            match controller.submit().await? {
                SubmitOutcome::Created => println!("comment posted"),
                SubmitOutcome::CreatedRefreshFailed(message) => {
                    println!("comment posted, but the thread could not be reloaded: {message}");
                }
            }
        }
        Command::Whoami => {}
    }

    print_thread(&controller.snapshot().await.list);
    controller.detach().await;
    Ok(())
}

fn spawn_event_log(controller: &Arc<CommentController>) {
    let mut events = controller.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ControllerEvent::ListStateChanged(ListState::Loaded(comments)) => {
                    debug!(count = comments.len(), "commenter: thread loaded");
                }
                other => debug!(event = ?other, "commenter: controller event"),
            }
        }
    });
}

fn print_thread(list: &ListState) {
    match list {
        ListState::Loaded(comments) if comments.is_empty() => println!("no comments yet"),
        ListState::Loaded(comments) => comments.iter().for_each(print_comment),
        ListState::LoadFailed(message) => println!("comments unavailable: {message}"),
        ListState::Idle | ListState::Loading => {}
    }
}

fn print_comment(comment: &Comment) {
    println!(
        "#{} {} ({})\n    {}",
        comment.id.0,
        comment.author,
        comment.created_at.format("%Y-%m-%d %H:%M"),
        comment.content
    );
}
