use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use client_core::{
    Controller, ControllerError, HtmlView, HttpBackend, ImageUpload, TreatmentBackend, View,
};
use shared::domain::{DiseaseId, DiseaseInfo, TreatmentKind};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

mod config;
mod terminal;

use config::{config_path, load_config, resolve_server_url, ClientConfig};
use terminal::TerminalView;

const FALLBACK_MIME_TYPE: &str = "application/octet-stream";

#[derive(Parser, Debug)]
#[command(name = "plantdoc", version, about = "Diagnose plant diseases and plan treatments")]
struct Cli {
    /// Treatment service base URL.
    #[arg(long, global = true, env = "PLANTDOC_SERVER_URL")]
    server_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Classify a leaf photo and optionally fetch a treatment for it.
    Diagnose(DiagnoseArgs),
    /// Show the catalog entry for a disease.
    Disease { id: String },
}

#[derive(Args, Debug)]
struct DiagnoseArgs {
    image: PathBuf,
    #[arg(long, value_enum)]
    treatment: Option<TreatmentArg>,
    /// Chemical to size a dose for; implies `--treatment inorganic`.
    #[arg(long)]
    chemical: Option<String>,
    /// Spray motor capacity in liters.
    #[arg(long)]
    motor_capacity: Option<f64>,
    /// Water to mix in liters; defaults to the motor capacity.
    #[arg(long)]
    water: Option<f64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

impl DiagnoseArgs {
    fn requested_treatment(&self) -> Option<TreatmentKind> {
        match (self.treatment, &self.chemical) {
            (Some(TreatmentArg::Organic), _) => Some(TreatmentKind::Organic),
            (Some(TreatmentArg::Inorganic), _) | (None, Some(_)) => Some(TreatmentKind::Inorganic),
            (None, None) => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum TreatmentArg {
    Organic,
    Inorganic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Html,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = match config_path() {
        Some(path) => load_config(&path)?,
        None => ClientConfig::default(),
    };
    let server_url = resolve_server_url(cli.server_url.as_deref(), &config);
    let backend = HttpBackend::new(&server_url)
        .with_context(|| format!("invalid server url '{server_url}'"))?;
    debug!(server_url = %backend.server_url(), "treatment service");

    match cli.command {
        Command::Diagnose(args) => {
            let upload = read_image(&args.image).await?;
            let succeeded = match args.format {
                OutputFormat::Text => {
                    let controller = Controller::new(backend, TerminalView::new(io::stdout()));
                    let outcome = diagnose(&controller, &args, upload).await;
                    controller
                        .into_view()
                        .into_inner()
                        .flush()
                        .context("failed to flush output")?;
                    outcome.is_ok()
                }
                OutputFormat::Html => {
                    let controller = Controller::new(backend, HtmlView::new());
                    let outcome = diagnose(&controller, &args, upload).await;
                    print!("{}", controller.into_view().document(Instant::now()));
                    outcome.is_ok()
                }
            };
            Ok(if succeeded {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Disease { id } => {
            let info = backend
                .disease_info(&DiseaseId::from(id.as_str()))
                .await
                .with_context(|| format!("failed to look up disease '{id}'"))?;
            print!("{}", format_disease(&info));
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read '{}'", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image")
        .to_string();
    let mime_type = mime_guess::from_path(path)
        .first_raw()
        .unwrap_or(FALLBACK_MIME_TYPE);
    info!(%file_name, %mime_type, size_bytes = bytes.len(), "read image");
    Ok(ImageUpload::new(file_name, mime_type, bytes))
}

/// Runs the session the arguments describe. Failures have already been
/// reported through the view by the time this returns.
async fn diagnose<B, V>(
    controller: &Controller<B, V>,
    args: &DiagnoseArgs,
    upload: ImageUpload,
) -> Result<(), ControllerError>
where
    B: TreatmentBackend,
    V: View,
{
    controller.submit_image(upload).await?;
    let Some(kind) = args.requested_treatment() else {
        return Ok(());
    };
    controller.select_treatment(kind).await?;
    if kind == TreatmentKind::Inorganic {
        if let Some(chemical) = args.chemical.as_deref() {
            controller
                .calculate_dosage(chemical, args.motor_capacity, args.water)
                .await?;
        }
    }
    Ok(())
}

fn format_disease(info: &DiseaseInfo) -> String {
    let mut out = format!("{} ({})\n", info.name, info.id);
    if !info.description.is_empty() {
        out.push_str(&info.description);
        out.push('\n');
    }
    if !info.symptoms.is_empty() {
        out.push_str("\nSymptoms:\n");
        for symptom in &info.symptoms {
            out.push_str("  - ");
            out.push_str(symptom);
            out.push('\n');
        }
    }
    out
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
