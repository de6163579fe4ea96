use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use ageline_core::session::{Age, BackgroundMode, GenderHint, RegenerateTarget};
use ageline_infrastructure::ConfigService;

mod app;
mod commands;

use app::Provider;

#[derive(Parser)]
#[command(name = "ageline")]
#[command(about = "Ageline - age progression media pipeline", long_about = None)]
struct Cli {
    /// Config file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a session from a reference photo
    Create {
        /// Reference photo of the subject
        #[arg(long)]
        image: PathBuf,
        /// Comma-separated target ages, e.g. 0,7,12,30
        #[arg(long, value_delimiter = ',', required = true)]
        ages: Vec<Age>,
        #[arg(long, value_enum, default_value_t = Backdrop::Flat)]
        backdrop: Backdrop,
        #[arg(long, value_enum, default_value_t = Gender::Auto)]
        gender: Gender,
    },
    /// Generate every missing frame of a session
    Frames { session_id: String },
    /// Regenerate one frame and drop everything that depended on it
    Regenerate {
        session_id: String,
        /// Age of the frame to regenerate
        #[arg(long, required_unless_present = "source", conflicts_with = "source")]
        age: Option<Age>,
        /// Regenerate the background-normalized source frame instead
        #[arg(long)]
        source: bool,
    },
    /// Assemble the final video from the session's transitions
    Video {
        session_id: String,
        /// Target duration in seconds
        #[arg(long)]
        duration: Option<f64>,
    },
    /// Show a session's manifest and job state
    Status {
        session_id: String,
        /// Print JSON instead of a summary
        #[arg(long)]
        json: bool,
    },
    /// List sessions
    List,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backdrop {
    Flat,
    Narrative,
}

impl From<Backdrop> for BackgroundMode {
    fn from(value: Backdrop) -> Self {
        match value {
            Backdrop::Flat => BackgroundMode::Flat,
            Backdrop::Narrative => BackgroundMode::Narrative,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Gender {
    Auto,
    Male,
    Female,
}

impl From<Gender> for GenderHint {
    fn from(value: Gender) -> Self {
        match value {
            Gender::Auto => GenderHint::Auto,
            Gender::Male => GenderHint::Male,
            Gender::Female => GenderHint::Female,
        }
    }
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_service = match &cli.config {
        Some(path) => ConfigService::with_path(path.clone()),
        None => ConfigService::new(),
    };
    let config = config_service
        .load()
        .context("Failed to load configuration")?;
    init_tracing(&config.logging.log_level);

    let paths = config_service
        .paths()
        .context("Failed to resolve data directory")?;
    let usecase = app::build_usecase(&config, paths);

    match cli.command {
        Commands::Create {
            image,
            ages,
            backdrop,
            gender,
        } => {
            commands::session::create(&usecase, image, ages, backdrop.into(), gender.into())
                .await?
        }
        Commands::Frames { session_id } => {
            app::require_providers(&config, &[Provider::Image, Provider::Video])?;
            commands::frames::run(&usecase, &session_id).await?
        }
        Commands::Regenerate {
            session_id,
            age,
            source,
        } => {
            app::require_providers(&config, &[Provider::Image])?;
            let target = match (age, source) {
                (_, true) => RegenerateTarget::Source,
                (Some(age), false) => RegenerateTarget::Age(age),
                (None, false) => anyhow::bail!("either --age or --source is required"),
            };
            commands::regenerate::run(&usecase, &session_id, target).await?
        }
        Commands::Video {
            session_id,
            duration,
        } => {
            app::require_providers(&config, &[Provider::Video])?;
            commands::video::run(&usecase, &session_id, duration).await?
        }
        Commands::Status { session_id, json } => {
            commands::session::status(&usecase, &session_id, json).await?
        }
        Commands::List => commands::session::list(&usecase).await?,
    }

    Ok(())
}
