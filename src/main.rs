use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qatron_board::client::ClientError;
use qatron_board::config::BoardConfig;
use qatron_board::models::{RegisterInput, RepoAuthMethod, RunFilters, RunStatus};
use qatron_board::pages::login::{LoginForm, LOGIN_FAILED};
use qatron_board::pages::new_run::NewRunForm;
use qatron_board::pages::project_features::IngestForm;
use qatron_board::pages::projects::ProjectForm;
use qatron_board::pages::run_detail::{self, TriggerOutcome};
use qatron_board::pages::{layout, runs};
use qatron_board::router::{self, Decision, Route};
use qatron_board::session::SessionStore;
use qatron_board::storage::{LocalStorage, Storage};
use qatron_board::Board;

#[derive(Parser)]
#[command(name = "qboard")]
#[command(about = "Terminal board for QAtron projects, runs, and features")]
struct Cli {
    /// Control-plane API base URL (overrides the config file and QATRON_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session token
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "QATRON_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Create a user account
    Register {
        #[arg(long)]
        email: String,
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "QATRON_PASSWORD", hide_env_values = true)]
        password: String,
        #[arg(long, default_value_t = 1)]
        organization_id: i64,
    },
    /// Clear the stored session
    Logout,
    /// Show the API URL and whether the stored session is accepted
    Status,
    /// Show the signed-in user
    Whoami,
    /// Render a board page, e.g. `/runs?project_id=3` or `/projects/2/features`
    Open {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Manage projects
    Projects {
        #[command(subcommand)]
        command: ProjectCommands,
    },
    /// List, create and trigger runs
    Runs {
        #[command(subcommand)]
        command: RunCommands,
    },
    /// Browse and ingest Gherkin features
    Features {
        #[command(subcommand)]
        command: FeatureCommands,
    },
    /// Create a project's default suite and environment
    Defaults {
        #[command(subcommand)]
        command: DefaultsCommands,
    },
    /// Show or change local configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ProjectCommands {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        repo_url: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum, default_value_t = AuthArg::Token)]
        auth: AuthArg,
    },
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        repo_url: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long, value_enum)]
        auth: Option<AuthArg>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Subcommand)]
enum RunCommands {
    List {
        #[arg(long)]
        project: Option<i64>,
        #[arg(long, value_parser = parse_status)]
        status: Option<RunStatus>,
        #[arg(long)]
        branch: Option<String>,
        #[arg(long)]
        skip: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    Show {
        id: i64,
    },
    /// Queue a run for a project's suite and environment
    Create {
        #[arg(long)]
        project: i64,
        #[arg(long)]
        suite: i64,
        #[arg(long)]
        environment: i64,
        #[arg(long)]
        branch: Option<String>,
    },
    /// Hand a queued run to a worker
    Trigger {
        id: i64,
        /// Show the run list afterwards instead of the run's detail page
        #[arg(long)]
        list: bool,
    },
}

#[derive(Subcommand)]
enum FeatureCommands {
    List {
        project: i64,
    },
    /// Ingest a feature file; reads stdin when no file is given
    Ingest {
        project: i64,
        file: Option<PathBuf>,
        /// Path recorded for the feature (defaults to the file argument)
        #[arg(long)]
        file_path: Option<String>,
    },
}

#[derive(Subcommand)]
enum DefaultsCommands {
    Ensure { project: i64 },
}

#[derive(Subcommand)]
enum ConfigCommands {
    Show,
    SetApiUrl { url: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum AuthArg {
    Token,
    Ssh,
}

impl From<AuthArg> for RepoAuthMethod {
    fn from(arg: AuthArg) -> Self {
        match arg {
            AuthArg::Token => RepoAuthMethod::Token,
            AuthArg::Ssh => RepoAuthMethod::Ssh,
        }
    }
}

fn parse_status(s: &str) -> Result<RunStatus, String> {
    RunStatus::parse(s).ok_or_else(|| format!("unknown run status: {}", s))
}

/// Logs go to stderr so stdout carries only rendered pages.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "qatron_board=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn open_storage(config: &BoardConfig) -> anyhow::Result<LocalStorage> {
    let storage = match &config.storage_path {
        Some(path) => LocalStorage::open(path.clone())?,
        None => LocalStorage::open_default()?,
    };
    storage.migrate()?;
    Ok(storage)
}

/// Storage problems degrade to a session that is not persisted.
fn open_session(config: &BoardConfig) -> SessionStore {
    match open_storage(config) {
        Ok(storage) => SessionStore::open(Some(Arc::new(storage) as Arc<dyn Storage>)),
        Err(e) => {
            tracing::warn!("Local storage unavailable, session will not persist: {:#}", e);
            SessionStore::in_memory()
        }
    }
}

/// Protected commands go through the same guard as page navigation.
fn require_session(board: &Board, route: &Route) -> anyhow::Result<()> {
    match router::guard(board.session().is_authenticated(), &route.path()) {
        Decision::Redirect(_) => bail!("Not signed in. Run `qboard login` first."),
        _ => Ok(()),
    }
}

fn client_failure(board: &Board, err: &ClientError, fallback: &str) -> anyhow::Error {
    let message = err.message(fallback);
    if err.is_unauthorized() && !board.session().is_authenticated() {
        anyhow::anyhow!("{} (signed out; run `qboard login`)", message)
    } else {
        anyhow::anyhow!(message)
    }
}

async fn show(board: &Board, path: &str) {
    let screen = board.open_with(path, |msg| eprintln!("{}", msg)).await;
    print!("{}", screen.body);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = BoardConfig::load();
    if let Some(url) = cli.api_url {
        config = config.with_api_url(url);
    }

    if let Some(Commands::Config { command }) = &cli.command {
        return match command {
            ConfigCommands::Show => {
                println!("{}", serde_json::to_string_pretty(&config)?);
                Ok(())
            }
            ConfigCommands::SetApiUrl { url } => {
                let path = config.clone().with_api_url(url.as_str()).save()?;
                println!("Saved API URL to {}", path.display());
                Ok(())
            }
        };
    }

    let session = open_session(&config);
    let board = Board::from_config(&config, session);

    match cli.command {
        Some(Commands::Login { username, password }) => {
            let credentials = LoginForm::new(username, password).validate()?;
            board
                .login(&credentials)
                .await
                .map_err(|e| client_failure(&board, &e, LOGIN_FAILED))?;
            show(&board, router::HOME_PATH).await;
        }
        Some(Commands::Register {
            email,
            username,
            password,
            organization_id,
        }) => {
            let input = RegisterInput {
                email,
                username,
                password,
                organization_id,
            };
            board
                .register(&input)
                .await
                .map_err(|e| client_failure(&board, &e, "Registration failed"))?;
            println!("Registered {}. Sign in with `qboard login`.", input.username);
        }
        Some(Commands::Logout) => {
            board.logout();
            println!("Logged out");
        }
        Some(Commands::Status) => {
            println!("API URL: {}", config.api_url);
            if !board.session().is_authenticated() {
                println!("Token: not set");
            } else {
                println!("Token: set");
                match board.current_user().await {
                    Ok(user) => println!("Authentication valid ({})", user.username),
                    Err(e) => println!("Authentication failed: {}", e.message("no response")),
                }
            }
        }
        Some(Commands::Whoami) => {
            require_session(&board, &Route::Dashboard)?;
            let user = board
                .current_user()
                .await
                .map_err(|e| client_failure(&board, &e, "Failed to load user"))?;
            println!(
                "{} <{}> (id {}, organization {})",
                user.username, user.email, user.id, user.organization_id
            );
        }
        Some(Commands::Open { path }) => show(&board, &path).await,
        Some(Commands::Projects { command }) => project_command(&board, command).await?,
        Some(Commands::Runs { command }) => run_command(&board, command).await?,
        Some(Commands::Features { command }) => feature_command(&board, command).await?,
        Some(Commands::Defaults {
            command: DefaultsCommands::Ensure { project },
        }) => {
            require_session(&board, &Route::NewRun)?;
            let mut form = NewRunForm::default();
            form.choose_project(&board, project)
                .await
                .map_err(|e| client_failure(&board, &e, "Failed to load suites and environments"))?;
            let response = form.ensure_defaults(&board).await?;
            if response.created.is_empty() {
                println!("{}", response.message);
            } else {
                println!("{} (created: {})", response.message, response.created.join(", "));
            }
        }
        Some(Commands::Config { .. }) => {}
        None => show(&board, router::HOME_PATH).await,
    }

    Ok(())
}

async fn project_command(board: &Board, command: ProjectCommands) -> anyhow::Result<()> {
    require_session(board, &Route::Projects)?;
    match command {
        ProjectCommands::List => show(board, "/projects").await,
        ProjectCommands::Create {
            name,
            repo_url,
            description,
            auth,
        } => {
            let form = ProjectForm {
                name,
                description: description.unwrap_or_default(),
                repo_url,
                repo_auth_method: auth.into(),
            };
            let project = form.create(board).await?;
            println!("Created project #{} {}", project.id, project.name);
        }
        ProjectCommands::Update {
            id,
            name,
            repo_url,
            description,
            auth,
        } => {
            let existing = board
                .project(id)
                .await
                .map_err(|e| client_failure(board, &e, "Failed to load project"))?;
            let mut form = ProjectForm::from_project(&existing);
            if let Some(name) = name {
                form.name = name;
            }
            if let Some(repo_url) = repo_url {
                form.repo_url = repo_url;
            }
            if let Some(description) = description {
                form.description = description;
            }
            if let Some(auth) = auth {
                form.repo_auth_method = auth.into();
            }
            let project = form.update(board, id).await?;
            println!("Updated project #{} {}", project.id, project.name);
        }
        ProjectCommands::Delete { id } => {
            board
                .delete_project(id)
                .await
                .map_err(|e| client_failure(board, &e, "Failed to delete project"))?;
            println!("Deleted project #{}", id);
        }
    }
    Ok(())
}

async fn run_command(board: &Board, command: RunCommands) -> anyhow::Result<()> {
    match command {
        RunCommands::List {
            project,
            status,
            branch,
            skip,
            limit,
        } => {
            let route = Route::Runs {
                project_id: project,
            };
            require_session(board, &route)?;
            let filters = RunFilters {
                project_id: project,
                status,
                skip,
                limit,
                ..RunFilters::default()
            }
            .with_branch(branch.as_deref());
            eprintln!("{}", route.loading_message());
            let body = runs::render(board, &filters, None)
                .await
                .map_err(|e| client_failure(board, &e, "Failed to load runs"))?;
            print!("{}", layout::frame(&route, &body));
        }
        RunCommands::Show { id } => show(board, &format!("/runs/{}", id)).await,
        RunCommands::Create {
            project,
            suite,
            environment,
            branch,
        } => {
            require_session(board, &Route::NewRun)?;
            let mut form = NewRunForm::default();
            form.branch = branch.unwrap_or_default();
            form.choose_project(board, project)
                .await
                .map_err(|e| client_failure(board, &e, "Failed to load suites and environments"))?;
            if form.needs_defaults() {
                bail!(
                    "Project {} has no suites or environments. Run `qboard defaults ensure {}` first.",
                    project,
                    project
                );
            }
            form.select_suite(suite)?;
            form.select_environment(environment)?;
            let run = form.submit(board).await?;
            show(board, &format!("/runs/{}", run.id)).await;
        }
        RunCommands::Trigger { id, list: true } => {
            let route = Route::Runs { project_id: None };
            require_session(board, &route)?;
            let trigger_error = runs::trigger(board, id)
                .await
                .map_err(|e| client_failure(board, &e, run_detail::TRIGGER_FAILED))?;
            let body = runs::render(board, &RunFilters::default(), trigger_error.as_deref())
                .await
                .map_err(|e| client_failure(board, &e, "Failed to load runs"))?;
            print!("{}", layout::frame(&route, &body));
            if let Some(message) = trigger_error {
                bail!("Trigger failed: {}", message);
            }
        }
        RunCommands::Trigger { id, list: false } => {
            let route = Route::RunDetail { run_id: Some(id) };
            require_session(board, &route)?;
            let outcome = run_detail::trigger(board, id)
                .await
                .map_err(|e| client_failure(board, &e, "Run not found"))?;
            let body = run_detail::render(board, Some(id), &outcome)
                .await
                .map_err(|e| client_failure(board, &e, "Failed to load run"))?;
            print!("{}", layout::frame(&route, &body));
            match outcome {
                TriggerOutcome::Failed(message) => bail!("Trigger failed: {}", message),
                TriggerOutcome::NotQueued(status) => {
                    bail!("Run #{} is {}; only queued runs can be triggered", id, status)
                }
                _ => {}
            }
        }
    }
    Ok(())
}

async fn feature_command(board: &Board, command: FeatureCommands) -> anyhow::Result<()> {
    match command {
        FeatureCommands::List { project } => {
            show(board, &format!("/projects/{}/features", project)).await
        }
        FeatureCommands::Ingest {
            project,
            file,
            file_path,
        } => {
            require_session(
                board,
                &Route::ProjectFeatures {
                    project_id: Some(project),
                },
            )?;
            let content = match &file {
                Some(path) => std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?,
                None => {
                    let mut buf = String::new();
                    std::io::stdin()
                        .read_to_string(&mut buf)
                        .context("Failed to read feature content from stdin")?;
                    buf
                }
            };
            let recorded_path = file_path
                .or_else(|| file.as_ref().map(|p| p.display().to_string()))
                .unwrap_or_default();

            let mut form = IngestForm::new(recorded_path, content);
            let response = form.submit(board, project).await?;
            println!(
                "{} ({} feature{} ingested)",
                response.message,
                response.features_count,
                if response.features_count == 1 { "" } else { "s" }
            );
        }
    }
    Ok(())
}
