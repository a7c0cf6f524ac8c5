mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use flexi_logger::{Logger, LoggerHandle};
use photojournal_core::config::{JournalConfig, DEFAULT_CELL_PADDING};
use photojournal_core::Journal;

/// pjournal: a personal photo journal
#[derive(Parser)]
#[command(name = "pjournal", version, about)]
struct Cli {
    /// Journal root directory
    #[arg(long, default_value_t = default_root())]
    root: String,

    /// Log level or filter spec (overridden by RUST_LOG)
    #[arg(long, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add one or more images as new entries
    Add {
        /// Image files to import
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Memo text attached to every added entry
        #[arg(long, default_value = "")]
        memo: String,
        /// Folder name or ID to file the entries under
        #[arg(long)]
        folder: Option<String>,
    },
    /// List entries, newest first
    Ls {
        /// Only show entries in this folder (name or ID)
        #[arg(long)]
        folder: Option<String>,
    },
    /// Show one entry in detail
    Show {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Write an entry's image to a file
    Export {
        /// Entry ID or unique ID prefix
        id: String,
        /// Destination file
        dest: PathBuf,
        /// Export the thumbnail instead of the original
        #[arg(long)]
        thumbnail: bool,
    },
    /// Replace an entry's memo
    Memo {
        /// Entry ID or unique ID prefix
        id: String,
        /// New memo text
        text: String,
    },
    /// Move an entry into a folder, or out of any folder with --none
    Mv {
        /// Entry ID or unique ID prefix
        id: String,
        /// Target folder name or ID
        #[arg(required_unless_present = "none")]
        folder: Option<String>,
        /// Remove the entry from its folder
        #[arg(long, conflicts_with = "folder")]
        none: bool,
    },
    /// Delete an entry and its images
    Rm {
        /// Entry ID or unique ID prefix
        id: String,
    },
    /// Manage folders
    Folders {
        #[command(subcommand)]
        action: Option<FoldersAction>,
    },
    /// Print the masonry layout computed for a gallery width
    Layout {
        /// Content width in points
        #[arg(long, default_value_t = 390.0)]
        width: f64,
        /// Inset applied on every side of each cell
        #[arg(long, default_value_t = DEFAULT_CELL_PADDING)]
        padding: f64,
        /// Only lay out entries in this folder (name or ID)
        #[arg(long)]
        folder: Option<String>,
        /// Emit JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Backfill cached image sizes for older entries
    Migrate,
    /// Remove image files that no entry references
    Sweep {
        /// Only report what would be removed
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
enum FoldersAction {
    /// List folders in display order
    List,
    /// Create a folder at the end of the list
    Add {
        /// Folder name
        name: String,
    },
    /// Rename a folder
    Rename {
        /// Folder name or ID
        folder: String,
        /// New name
        name: String,
    },
    /// Delete a folder; its entries become unfiled
    Rm {
        /// Folder name or ID
        folder: String,
    },
}

fn default_root() -> String {
    JournalConfig::default_root().to_string_lossy().to_string()
}

fn init_logging(level: &str) -> Result<LoggerHandle> {
    let handle = Logger::try_with_env_or_str(level)?
        .log_to_stderr()
        .format(flexi_logger::default_format)
        .start()?;
    Ok(handle)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _logger = init_logging(&cli.log_level)?;
    log::debug!("event=cli_start root={}", cli.root);

    let journal = Journal::open(JournalConfig::new(&cli.root)).await?;
    if !matches!(cli.command, Commands::Migrate) && journal.run_startup_migration().await.failed {
        log::warn!("event=startup_migration_failed action=continue");
    }

    match cli.command {
        Commands::Add {
            paths,
            memo,
            folder,
        } => commands::entries::add(&journal, paths, &memo, folder.as_deref()).await?,
        Commands::Ls { folder } => commands::entries::ls(&journal, folder.as_deref()).await?,
        Commands::Show { id } => commands::entries::show(&journal, &id).await?,
        Commands::Export {
            id,
            dest,
            thumbnail,
        } => commands::entries::export(&journal, &id, &dest, thumbnail).await?,
        Commands::Memo { id, text } => commands::entries::memo(&journal, &id, &text).await?,
        Commands::Mv { id, folder, none } => {
            let target = if none { None } else { folder };
            commands::entries::mv(&journal, &id, target.as_deref()).await?
        }
        Commands::Rm { id } => commands::entries::rm(&journal, &id).await?,
        Commands::Folders { action } => match action {
            None | Some(FoldersAction::List) => commands::folders::list(&journal).await?,
            Some(FoldersAction::Add { name }) => commands::folders::add(&journal, &name).await?,
            Some(FoldersAction::Rename { folder, name }) => {
                commands::folders::rename(&journal, &folder, &name).await?
            }
            Some(FoldersAction::Rm { folder }) => commands::folders::rm(&journal, &folder).await?,
        },
        Commands::Layout {
            width,
            padding,
            folder,
            json,
        } => commands::layout::run(&journal, width, padding, folder.as_deref(), json).await?,
        Commands::Migrate => commands::maintenance::migrate(&journal).await?,
        Commands::Sweep { dry_run } => commands::maintenance::sweep(&journal, dry_run).await?,
    }

    Ok(())
}
