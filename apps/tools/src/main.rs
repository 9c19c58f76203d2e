use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use server_api::normalize_new_comment;
use shared::{domain::PostId, protocol::CreateCommentRequest};
use storage::Storage;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "sqlite://./data/comments.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    AddComment {
        post_id: String,
        author: String,
        content: String,
    },
    ListComments {
        post_id: String,
    },
    CountComments {
        post_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::AddComment {
            post_id,
            author,
            content,
        } => {
            let comment = normalize_new_comment(
                PostId::new(post_id),
                CreateCommentRequest { author, content },
            )
            .map_err(|e| anyhow!("{}", e.message))?;
            let inserted = storage.insert_comment(&comment).await?;
            println!(
                "created comment_id={} at {}",
                inserted.comment_id.0,
                inserted.created_at.to_rfc3339()
            );
        }
        Command::ListComments { post_id } => {
            for comment in storage
                .list_comments_for_post(&PostId::new(post_id))
                .await?
            {
                println!(
                    "{}\t{}\t{}\t{}",
                    comment.id.0,
                    comment.created_at.to_rfc3339(),
                    comment.author,
                    comment.content
                );
            }
        }
        Command::CountComments { post_id } => {
            let count = storage
                .count_comments_for_post(&PostId::new(post_id))
                .await?;
            println!("{count}");
        }
    }

    Ok(())
}
