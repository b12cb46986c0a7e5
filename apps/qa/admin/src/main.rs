//! qa-admin
//!
//! Operator tooling for QA knowledge entries: applies the schema, lists entries and
//! inspects, rebuilds, drops, migrates or searches an owner's vector index.

use clap::{Parser, Subcommand};
use core_config::tracing::{init_tracing, install_color_eyre};
use core_config::{Environment, FromEnv};
use domain_qa_documents::QaDocumentSort;
use domain_qa_index::{BackendKind, SearchKind};
use eyre::{Result, WrapErr};
use tracing::info;
use uuid::Uuid;

mod commands;
mod config;

use commands::Admin;
use config::Config;

#[derive(Parser)]
#[command(name = "qa-admin")]
#[command(about = "Manage QA entries and their vector indexes")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,

    /// List an owner's QA entries
    List {
        #[arg(short, long)]
        owner: Uuid,

        /// Case-insensitive match against question or answer
        #[arg(short, long)]
        keyword: Option<String>,

        /// Only enabled (true) or only disabled (false) entries
        #[arg(long)]
        enabled: Option<bool>,

        /// -created_at, created_at or position
        #[arg(short, long, default_value = "-created_at", allow_hyphen_values = true)]
        sort: QaDocumentSort,

        #[arg(short, long, default_value_t = 20)]
        limit: usize,

        #[arg(long, default_value_t = 0)]
        offset: usize,
    },

    /// Show the owner's index descriptor and vector count
    Status {
        #[arg(short, long)]
        owner: Uuid,
    },

    /// Drop the owner's collection and rebuild it from enabled entries
    Rebuild {
        #[arg(short, long)]
        owner: Uuid,
    },

    /// Drop the owner's collection; entries refill it as they are written
    DropIndex {
        #[arg(short, long)]
        owner: Uuid,
    },

    /// Move the owner's vectors to another vector store
    MigrateIndex {
        #[arg(short, long)]
        owner: Uuid,

        /// Target vector store (weaviate, qdrant, milvus)
        #[arg(long)]
        to: BackendKind,
    },

    /// Search the owner's index
    Search {
        #[arg(short, long)]
        owner: Uuid,

        text: String,

        #[arg(short = 'k', long, default_value_t = 4)]
        top_k: usize,

        /// Only return hits scoring at least this much
        #[arg(long)]
        score_threshold: Option<f32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    install_color_eyre();

    let environment = Environment::from_env();
    init_tracing(&environment);

    let cli = Cli::parse();
    let config = Config::from_env().wrap_err("Failed to load configuration")?;

    info!("Connecting to database...");
    let admin = Admin::connect(config).await?;

    match cli.command {
        Commands::Migrate => admin.migrate().await?,

        Commands::List {
            owner,
            keyword,
            enabled,
            sort,
            limit,
            offset,
        } => {
            admin
                .list(owner, keyword, enabled, sort, limit, offset)
                .await?
        }

        Commands::Status { owner } => admin.status(owner).await?,

        Commands::Rebuild { owner } => admin.rebuild(owner).await?,

        Commands::DropIndex { owner } => admin.drop_index(owner).await?,

        Commands::MigrateIndex { owner, to } => admin.migrate_index(owner, to).await?,

        Commands::Search {
            owner,
            text,
            top_k,
            score_threshold,
        } => {
            let kind = match score_threshold {
                Some(_) => SearchKind::SimilarityScoreThreshold,
                None => SearchKind::Similarity,
            };
            admin.search(owner, &text, kind, top_k, score_threshold).await?
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_with_descending_sort() {
        let owner = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "qa-admin",
            "list",
            "--owner",
            &owner.to_string(),
            "--keyword",
            "pricing",
        ])
        .unwrap();

        let Commands::List {
            owner: parsed,
            keyword,
            sort,
            limit,
            ..
        } = cli.command
        else {
            panic!("expected list");
        };
        assert_eq!(parsed, owner);
        assert_eq!(keyword.as_deref(), Some("pricing"));
        assert_eq!(sort, QaDocumentSort::CreatedAtDesc);
        assert_eq!(limit, 20);
    }

    #[test]
    fn test_parse_migrate_index_target() {
        let owner = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "qa-admin",
            "migrate-index",
            "--owner",
            &owner.to_string(),
            "--to",
            "milvus",
        ])
        .unwrap();

        assert!(matches!(
            cli.command,
            Commands::MigrateIndex { to: BackendKind::Milvus, .. }
        ));
    }

    #[test]
    fn test_parse_drop_index() {
        let owner = Uuid::new_v4();
        let cli =
            Cli::try_parse_from(["qa-admin", "drop-index", "--owner", &owner.to_string()]).unwrap();

        assert!(matches!(cli.command, Commands::DropIndex { owner: parsed } if parsed == owner));
    }

    #[test]
    fn test_unknown_vector_store_is_rejected() {
        let owner = Uuid::new_v4();
        let result = Cli::try_parse_from([
            "qa-admin",
            "migrate-index",
            "--owner",
            &owner.to_string(),
            "--to",
            "pinecone",
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn test_parse_search_with_threshold() {
        let owner = Uuid::new_v4();
        let cli = Cli::try_parse_from([
            "qa-admin",
            "search",
            "--owner",
            &owner.to_string(),
            "What is X?",
            "--score-threshold",
            "0.8",
        ])
        .unwrap();

        let Commands::Search {
            text,
            top_k,
            score_threshold,
            ..
        } = cli.command
        else {
            panic!("expected search");
        };
        assert_eq!(text, "What is X?");
        assert_eq!(top_k, 4);
        assert_eq!(score_threshold, Some(0.8));
    }
}
