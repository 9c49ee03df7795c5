use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args as ClapArgs, Parser, Subcommand};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use console_sync::config;
use console_sync::controller::{FormController, ListController, SubmitOutcome};
use console_sync::http::{ApiClient, Attachment, LoginRedirect};
use console_sync::model::{EntityKind, Record, Scope};
use console_sync::notify::TracingNotifier;
use console_sync::service::EntityService;
use console_sync::store::Store;
use console_sync::SyncError;

type Service = EntityService<ApiClient, TracingNotifier>;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, ClapArgs)]
struct ScopeArgs {
    /// Project the board or task belongs to
    #[arg(long)]
    project: Option<String>,
    /// Board the task belongs to
    #[arg(long, requires = "project")]
    board: Option<String>,
    /// List every task of the project across boards
    #[arg(long, requires = "project", conflicts_with = "board")]
    all_tasks: bool,
}

impl ScopeArgs {
    fn scope(&self) -> Scope {
        match (&self.project, &self.board) {
            (Some(project), Some(board)) => Scope::Board {
                project: project.clone(),
                board: board.clone(),
            },
            (Some(project), None) if self.all_tasks => Scope::ProjectTasks(project.clone()),
            (Some(project), None) => Scope::Project(project.clone()),
            (None, _) => Scope::Root,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print one page of a collection
    List {
        entity: EntityKind,
        /// 1-based page number
        #[arg(long, default_value_t = 1)]
        page: u64,
        #[arg(long)]
        size: Option<u64>,
        #[arg(long)]
        query: Option<String>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Print one record
    Get {
        entity: EntityKind,
        id: String,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Create a record from a JSON object, optionally with an image
    Create {
        entity: EntityKind,
        #[arg(long)]
        json: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Apply a JSON object of changes to a record
    Update {
        entity: EntityKind,
        id: String,
        #[arg(long)]
        json: String,
        #[arg(long)]
        image: Option<PathBuf>,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Delete a record after confirmation
    Delete {
        entity: EntityKind,
        id: String,
        /// Skip the confirmation prompt
        #[arg(long, short)]
        yes: bool,
        #[command(flatten)]
        scope: ScopeArgs,
    },
    /// Attach documents to a record
    Upload {
        entity: EntityKind,
        id: String,
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },
    /// Upload a single image for a record and print its URL
    UploadImage {
        entity: EntityKind,
        id: String,
        file: PathBuf,
        /// Schema segment of the upload endpoint
        #[arg(long)]
        schema: Option<String>,
    },
    /// Print a sample configuration file
    ConfigExample,
}

/// Reports where the user has to log in; the CLI cannot navigate.
struct CliRedirect {
    origin: String,
}

impl LoginRedirect for CliRedirect {
    fn redirect(&self, login_path: &str) {
        warn!(login_path, "session rejected");
        eprintln!(
            "login required: {}{}",
            self.origin.trim_end_matches('/'),
            login_path
        );
    }
}

fn confirm_on_stdin(prompt: &str) -> bool {
    eprint!("{prompt} [y/N] ");
    let _ = io::stderr().flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(_) => matches!(line.trim(), "y" | "Y" | "yes"),
        Err(_) => false,
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn parse_object(raw: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(raw).context("--json must be valid JSON")?;
    if !value.is_object() {
        bail!("--json must be a JSON object");
    }
    Ok(value)
}

async fn read_image(path: Option<&PathBuf>) -> Result<Option<Attachment>> {
    match path {
        Some(path) => Ok(Some(
            Attachment::from_path(path)
                .await
                .with_context(|| format!("reading {}", path.display()))?,
        )),
        None => Ok(None),
    }
}

fn finish(outcome: SubmitOutcome) -> Result<()> {
    match outcome {
        SubmitOutcome::Closed(body) => print_json(&body),
        SubmitOutcome::Failed(SyncError::Validation(errors)) => {
            for (field, message) in errors.iter() {
                eprintln!("{field}: {message}");
            }
            bail!("validation failed")
        }
        SubmitOutcome::Failed(err) => Err(err.into()),
    }
}

async fn run(service: Service, command: Command, default_page_size: u64) -> Result<()> {
    match command {
        Command::List {
            entity,
            page,
            size,
            query,
            scope,
        } => {
            let mut list = ListController::new(
                service,
                entity,
                scope.scope(),
                size.unwrap_or(default_page_size),
            );
            list.set_query(query.as_deref());
            list.set_page_index(page.saturating_sub(1));
            list.sync().await?;
            let state = list.state();
            print_json(&json!({
                "items": state.items,
                "page": state.page,
                "total": state.total,
                "limit": state.limit,
                "page_count": list.page_count(),
            }))
        }
        Command::Get { entity, id, scope } => {
            let record = service.get_by_id(entity, &scope.scope(), &id).await?;
            print_json(&record.into_value())
        }
        Command::Create {
            entity,
            json,
            image,
            scope,
        } => {
            let changes = parse_object(&json)?;
            let attachment = read_image(image.as_ref()).await?;
            let mut form = FormController::new(service, entity, scope.scope(), None);
            let values = form.edited_values(Utc::now(), &changes);
            finish(form.submit(values, attachment).await)
        }
        Command::Update {
            entity,
            id,
            json,
            image,
            scope,
        } => {
            let changes = parse_object(&json)?;
            let attachment = read_image(image.as_ref()).await?;
            let scope = scope.scope();
            let record = service.get_by_id(entity, &scope, &id).await?;
            let mut form = FormController::new(service, entity, scope, Some(record));
            let values = form.edited_values(Utc::now(), &changes);
            finish(form.submit(values, attachment).await)
        }
        Command::Delete {
            entity,
            id,
            yes,
            scope,
        } => {
            let record = Record::from_value(json!({ "_id": id }))
                .context("record id must form a JSON object")?;
            let mut form = FormController::new(service, entity, scope.scope(), Some(record));
            let deleted = if yes {
                form.delete(&|_: &str| true).await?
            } else {
                form.delete(&confirm_on_stdin).await?
            };
            match deleted {
                Some(body) => print_json(&body),
                None => {
                    info!("delete cancelled");
                    Ok(())
                }
            }
        }
        Command::Upload { entity, id, files } => {
            let attachments = Attachment::read_all(&files).await?;
            let body = service.upload_documents(entity, &id, attachments).await?;
            print_json(&body)
        }
        Command::UploadImage {
            entity,
            id,
            file,
            schema,
        } => {
            let attachment = Attachment::from_path(&file).await?;
            let url = service
                .upload(entity, &id, attachment, schema.as_deref())
                .await?;
            print_json(&json!({ "file_url": url }))
        }
        // Printed before any config is loaded.
        Command::ConfigExample => Ok(()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    if let Command::ConfigExample = args.command {
        print!("{}", config::example());
        return Ok(());
    }

    let cfg = config::load(Some(&args.config))
        .with_context(|| format!("loading {}", args.config.display()))?;
    let origin = cfg.base_url()?.to_string();
    let client = ApiClient::from_config(&cfg)?.with_redirect(Arc::new(CliRedirect { origin }));
    let service = EntityService::new(
        Arc::new(client),
        Arc::new(TracingNotifier),
        Store::new(),
    );

    info!(base_url = %cfg.api.base_url, "console-sync starting");
    run(service, args.command, cfg.app.default_page_size).await
}
