//! CLI adapter: parses the subcommand surface (`SPEC_FULL.md` §6, flag
//! syntax illustrative) and dispatches onto the store layer directly for
//! everything that's a plain read/write, or drains a runner's event
//! stream to a live terminal display for anything that streams.
//!
//! Grounded on the teacher's `colored::Colorize` usage in `src/hash.rs`
//! for terminal styling; `clap` is adopted from the wider example pack
//! (`Alb-O-xeno`, `MystenLabs-sui`) since the teacher carries no CLI
//! argument-parsing dependency of its own.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use colored::Colorize;
use futures_util::StreamExt;

use crate::config::Config;
use crate::errors::Result;
use crate::events::ProgressEvent;
use crate::runner::EventStream;
use crate::store::document_version_store::DocumentVersionStore;
use crate::store::{ConflictPolicy, DocumentStore, ProjectStore};
use crate::version::{BumpKind, Version};

#[derive(Parser, Debug)]
#[command(name = "vdocs", about = "Video-documentation orchestration and versioned storage")]
pub struct Cli {
    /// Overrides `VDOCS_DATA_DIR` for this invocation.
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    #[arg(long)]
    pub user: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List every document for this user.
    List,
    /// Show a document's current content.
    View {
        doc_id: String,
        #[arg(long, default_value = "en")]
        language: String,
    },
    #[command(subcommand)]
    Project(ProjectCommand),
    #[command(subcommand)]
    Tag(TagCommand),
    #[command(subcommand)]
    Version(VersionCommand),
}

#[derive(Subcommand, Debug)]
pub enum ProjectCommand {
    Create {
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "en")]
        default_language: String,
    },
    List,
    Show {
        project_id: String,
    },
    Delete {
        project_id: String,
    },
    AddDoc {
        project_id: String,
        doc_id: String,
        #[arg(long)]
        chapter_id: Option<String>,
    },
    RemoveDoc {
        project_id: String,
        doc_id: String,
    },
    MoveDoc {
        project_id: String,
        doc_id: String,
        target_chapter_id: String,
    },
}

#[derive(Subcommand, Debug)]
pub enum TagCommand {
    Add { doc_id: String, tag: String },
    Remove { doc_id: String, tag: String },
    List,
    Search { query: String },
}

#[derive(Subcommand, Debug)]
pub enum VersionCommand {
    List { doc_id: String },
    Bump {
        doc_id: String,
        #[arg(value_enum)]
        kind: BumpKindArg,
        #[arg(long, default_value = "")]
        notes: String,
    },
    Restore {
        doc_id: String,
        version: Version,
        #[arg(long, default_value = "en")]
        language: String,
    },
    Diff {
        doc_id: String,
        v1: Version,
        v2: Version,
        #[arg(long, default_value = "en")]
        language: String,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum BumpKindArg {
    Minor,
    Major,
}

impl From<BumpKindArg> for BumpKind {
    fn from(value: BumpKindArg) -> Self {
        match value {
            BumpKindArg::Minor => BumpKind::Minor,
            BumpKindArg::Major => BumpKind::Major,
        }
    }
}

/// Run a parsed CLI invocation to completion, printing results directly
/// (no streaming involved: these are all plain store reads/writes).
pub async fn dispatch(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::from_env();
    if let Some(root) = cli.data_root {
        config.data_root = root;
    }
    let docs = DocumentStore::new(config.user_dir(&cli.user));
    let projects = ProjectStore::new(config.user_dir(&cli.user));

    match cli.command {
        Command::List => {
            for doc_id in docs.list_docs().await? {
                println!("{doc_id}");
            }
        }
        Command::View { doc_id, language } => match docs.get_content(&doc_id, &language).await? {
            Some(content) => println!("{content}"),
            None => {
                eprintln!("{}", format!("no content for {doc_id}/{language}").red());
                return Ok(ExitCode::FAILURE);
            }
        },
        Command::Project(action) => dispatch_project(&projects, action).await?,
        Command::Tag(action) => dispatch_tag(&docs, action).await?,
        Command::Version(action) => dispatch_version(&docs, action).await?,
    }
    Ok(ExitCode::SUCCESS)
}

async fn dispatch_project(projects: &ProjectStore, action: ProjectCommand) -> Result<()> {
    match action {
        ProjectCommand::Create {
            name,
            description,
            default_language,
        } => {
            let id = projects.create_project(&name, &description, &default_language).await?;
            println!("{}", id.green());
        }
        ProjectCommand::List => {
            for id in projects.list_projects().await? {
                println!("{id}");
            }
        }
        ProjectCommand::Show { project_id } => match projects.get_project(&project_id).await? {
            Some(manifest) => println!("{}", serde_json::to_string_pretty(&manifest).unwrap_or_default()),
            None => eprintln!("{}", format!("no such project: {project_id}").red()),
        },
        ProjectCommand::Delete { project_id } => projects.delete_project(&project_id).await?,
        ProjectCommand::AddDoc {
            project_id,
            doc_id,
            chapter_id,
        } => {
            projects.add_doc_to_project(&project_id, &doc_id, chapter_id.as_deref()).await?;
        }
        ProjectCommand::RemoveDoc { project_id, doc_id } => {
            projects.remove_doc_from_project(&project_id, &doc_id).await?;
        }
        ProjectCommand::MoveDoc {
            project_id,
            doc_id,
            target_chapter_id,
        } => {
            projects.move_doc_to_chapter(&project_id, &doc_id, &target_chapter_id).await?;
        }
    }
    Ok(())
}

async fn dispatch_tag(docs: &DocumentStore, action: TagCommand) -> Result<()> {
    match action {
        TagCommand::Add { doc_id, tag } => docs.add_tag_to_doc(&doc_id, &tag).await?,
        TagCommand::Remove { doc_id, tag } => docs.remove_tag_from_doc(&doc_id, &tag).await?,
        TagCommand::List => {
            for tag in docs.list_all_tags().await? {
                println!("{tag}");
            }
        }
        TagCommand::Search { query } => {
            for doc_id in docs.search_docs_by_title(&query).await? {
                println!("{doc_id}");
            }
        }
    }
    Ok(())
}

async fn dispatch_version(docs: &DocumentStore, action: VersionCommand) -> Result<()> {
    match action {
        VersionCommand::List { doc_id } => {
            let versions = DocumentVersionStore::new(docs, doc_id).list().await?;
            for v in versions {
                let marker = if v.is_current { " (current)".cyan().to_string() } else { String::new() };
                println!("{}{marker}", v.version);
            }
        }
        VersionCommand::Bump { doc_id, kind, notes } => {
            let bumped = DocumentVersionStore::new(docs, doc_id).bump(kind.into(), &notes).await?;
            println!("{}", bumped.to_string().green());
        }
        VersionCommand::Restore {
            doc_id,
            version,
            language,
        } => {
            let restored = DocumentVersionStore::new(docs, doc_id).restore(version, &language).await?;
            if !restored {
                eprintln!("{}", format!("no snapshot for version {version}").red());
            }
        }
        VersionCommand::Diff { doc_id, v1, v2, language } => {
            let diff = DocumentVersionStore::new(docs, doc_id).diff(v1, v2, &language).await?;
            println!("{}", serde_json::to_string_pretty(&diff).unwrap_or_default());
        }
    }
    Ok(())
}

/// Drain a runner's event stream to a live terminal display, matching
/// the exit-code contract (`SPEC_FULL.md` §6: non-zero on any `Error`
/// event). Used by the `process`/`compile`/editor commands, whose
/// underlying executor an embedding application supplies.
pub async fn drain_to_terminal(mut stream: EventStream) -> ExitCode {
    let mut exit = ExitCode::SUCCESS;
    while let Some(event) = stream.next().await {
        render_event(&event);
        if let ProgressEvent::Error { .. } = event {
            exit = ExitCode::FAILURE;
        }
    }
    exit
}

fn render_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::StageStarted { stage_name, index, total } => {
            println!("{}", format!("[{}/{total}] {stage_name}...", index + 1).cyan());
        }
        ProgressEvent::StageCompleted { stage_name, .. } => {
            println!("{}", format!("  {stage_name} done").green());
        }
        ProgressEvent::Token { token, .. } => {
            print!("{token}");
        }
        ProgressEvent::ToolCall { tool_name, .. } => {
            println!("{}", format!("  tool: {tool_name}").yellow());
        }
        ProgressEvent::PendingChange { change_id, change_type, .. } => {
            println!("{}", format!("  pending change {change_id} ({change_type})").yellow());
        }
        ProgressEvent::HumanApprovalRequired { message, .. } => {
            println!("{}", format!("  approval required: {message}").magenta());
        }
        ProgressEvent::Error { error_message, .. } => {
            eprintln!("{}", error_message.red());
        }
        ProgressEvent::Complete { message, .. } => {
            println!("{}", message.green());
        }
    }
}
