use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use vaimm::config::Config;
use vaimm::error::{Result, VaimmError};
use vaimm::fetch::{
    format_bytes, DownloadOutcome, DownloadTask, FetchEngine, FetchReport, HttpTransport,
    ProgressEvent, RunStatus,
};
use vaimm::metadata::{default_metadata_dir, load_metadata_dir, MetadataRecord};
use vaimm::models::capability::GPU_FAMILIES;
use vaimm::models::{
    backend_files, disk, missing, CapabilityProfile, IncludeFilter, ModelResolver, ResolvedModel,
};

#[derive(Parser)]
#[command(name = "vaimm", version)]
#[command(about = "VAI Models Manager: download missing models for Topaz Video AI", long_about = None)]
struct Cli {
    /// Directory where the VAI model json files reside (env: TVAI_MODEL_DIR)
    #[arg(long, value_name = "path", global = true)]
    json_dir: Option<PathBuf>,

    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available backends that VAI supports
    ListBackends,
    /// List available models for a given backend
    ListModels(Target),
    /// List model files for a backend
    ListFiles(Target),
    /// Download VAI models missing from your model data directory
    Download(DownloadArgs),
}

#[derive(Args)]
struct Target {
    /// Name of the backend (env: TVAI_BACKEND)
    #[arg(long, value_name = "name")]
    backend: Option<String>,

    /// Comma separated list of specific model(s) to include, e.g. prob-4,alq-13
    #[arg(long, value_name = "ids")]
    include: Option<String>,

    /// GPU family for TensorRT models (RTX20, RTX30, RTX40)
    #[arg(long, value_name = "family")]
    gpu_family: Option<String>,
}

#[derive(Args)]
struct DownloadArgs {
    #[command(flatten)]
    target: Target,

    /// Path to your model data directory (env: TVAI_MODEL_DATA_DIR)
    #[arg(short, long, value_name = "path")]
    dir: Option<PathBuf>,

    /// Value of the cf_clearance cookie for the Topaz CDN (env: TVAI_COOKIE)
    #[arg(short, long, value_name = "str")]
    cookie: Option<String>,

    /// Number of concurrent downloads
    #[arg(short, long, value_name = "n")]
    threads: Option<usize>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli).await {
        Ok(code) => code,
        Err(VaimmError::Interrupted(e)) => {
            eprintln!("\n{e}");
            ExitCode::from(130)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = Config::load()?;
    if let Some(dir) = cli.json_dir {
        config.paths.json_dir = Some(dir);
    }
    let records = load_records(&config)?;

    match cli.command {
        Commands::ListBackends => {
            list_backends(&records);
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListModels(target) => {
            apply_target(&mut config, &target);
            list_models(&config, &records, &target)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::ListFiles(target) => {
            apply_target(&mut config, &target);
            list_files(&config, &records, &target)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Download(args) => {
            apply_target(&mut config, &args.target);
            if let Some(dir) = args.dir {
                config.paths.data_dir = Some(dir);
            }
            if let Some(cookie) = args.cookie {
                config.download.cookie = Some(cookie);
            }
            if let Some(threads) = args.threads {
                config.download.threads = threads;
            }
            download(&config, &records, &args.target).await
        }
    }
}

fn apply_target(config: &mut Config, target: &Target) {
    if let Some(backend) = &target.backend {
        config.download.backend = Some(backend.clone());
    }
    if let Some(family) = &target.gpu_family {
        config.hardware.gpu_family = Some(family.clone());
    }
}

fn load_records(config: &Config) -> Result<Vec<MetadataRecord>> {
    let json_dir = config
        .paths
        .json_dir
        .clone()
        .or_else(default_metadata_dir)
        .ok_or_else(|| {
            VaimmError::Config(
                "Cannot find the VAI model json files, specify --json-dir or TVAI_MODEL_DIR"
                    .to_string(),
            )
        })?;

    load_metadata_dir(&json_dir)
}

fn resolver_for(config: &Config) -> Result<ModelResolver> {
    let backend = config.download.backend.clone().ok_or_else(|| {
        VaimmError::Config("No backend given, use --backend or TVAI_BACKEND".to_string())
    })?;

    let capability = match &config.hardware.gpu_family {
        Some(family) => Some(CapabilityProfile::for_current_os(family).ok_or_else(|| {
            let known: Vec<&str> = GPU_FAMILIES.iter().map(|(name, _)| *name).collect();
            VaimmError::Config(format!(
                "Unsupported GPU family '{family}' on {}. Known families: {}",
                std::env::consts::OS,
                known.join(", ")
            ))
        })?),
        None => None,
    };

    Ok(ModelResolver::new(backend, capability))
}

fn resolve_models(config: &Config, records: &[MetadataRecord]) -> Result<Vec<ResolvedModel>> {
    let resolver = resolver_for(config)?;
    let models: Vec<ResolvedModel> = resolver.resolve_all(records).collect();

    if models.is_empty() {
        return Err(VaimmError::Config(format!(
            "No models found for backend '{}'. Run 'vaimm list-backends' to see the options",
            resolver.backend()
        )));
    }
    Ok(models)
}

fn list_backends(records: &[MetadataRecord]) {
    let backends: BTreeSet<&str> = records
        .iter()
        .flat_map(|record| record.backends.keys().map(String::as_str))
        .collect();

    println!(
        "Supported backends: {}",
        backends.into_iter().collect::<Vec<_>>().join(", ")
    );
}

fn list_models(config: &Config, records: &[MetadataRecord], target: &Target) -> Result<()> {
    let models = resolve_models(config, records)?;
    let models = included_models(models, &include_filter(target));

    println!("Available models:");
    for model in &models {
        println!("\n* {:<8} {}", model.key(), model.name);
        for line in wrap(&model.description, 78) {
            println!("{:11}{line}", "");
        }
    }
    Ok(())
}

fn include_filter(target: &Target) -> IncludeFilter {
    IncludeFilter::parse(target.include.as_deref().unwrap_or_default())
}

/// Models admitted by `filter`, sorted by id and version
fn included_models(models: Vec<ResolvedModel>, filter: &IncludeFilter) -> Vec<ResolvedModel> {
    let mut models: Vec<ResolvedModel> = models
        .into_iter()
        .filter(|model| filter.admits(model))
        .collect();
    models.sort_by_key(|model| format!("{}{}", model.id, model.version));
    models
}

fn list_files(config: &Config, records: &[MetadataRecord], target: &Target) -> Result<()> {
    let models = resolve_models(config, records)?;
    let filter = include_filter(target);

    let mut files = backend_files(&models, &filter);
    files.sort();

    eprintln!("Model files:\n");
    for file in &files {
        println!("{file}");
    }
    eprintln!(
        "\nEstimated total size: {}",
        format_bytes(disk::estimated_size(files.len()))
    );
    Ok(())
}

async fn download(config: &Config, records: &[MetadataRecord], target: &Target) -> Result<ExitCode> {
    let data_dir = config.paths.data_dir.clone().ok_or_else(|| {
        VaimmError::Config(
            "No model data directory given, use --dir or TVAI_MODEL_DATA_DIR".to_string(),
        )
    })?;

    let models = resolve_models(config, records)?;
    let filter = include_filter(target);
    let files = backend_files(&models, &filter);
    let missing_files = missing(&files, &data_dir);

    if missing_files.is_empty() {
        println!("No missing model files to download");
        return Ok(ExitCode::SUCCESS);
    }

    std::fs::create_dir_all(&data_dir)?;
    if !disk::has_room_for(&data_dir, missing_files.len()) {
        tracing::warn!(
            "{} missing files may need around {}, which is more than the free space in {}",
            missing_files.len(),
            format_bytes(disk::estimated_size(missing_files.len())),
            data_dir.display()
        );
    }

    let settings = config.fetch_settings()?;
    let transport = Arc::new(HttpTransport::new(&settings)?);
    let engine = FetchEngine::new(transport, config.retry_policy());

    let tasks: Vec<DownloadTask> = missing_files
        .into_iter()
        .map(|path| DownloadTask::new(&settings.url_prefix, path))
        .collect();

    let progress = ProgressBar::new(tasks.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("Downloading [{elapsed_precise}] {bar:40} {pos}/{len} files {msg}")
            .map_err(|e| VaimmError::Other(format!("Invalid progress template: {e}")))?,
    );

    let mut observer = |event: &ProgressEvent<'_>| {
        progress.inc(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let speed = event.throughput() as u64;
        progress.set_message(format!("{}/s", format_bytes(speed)));

        if let DownloadOutcome::Failed(reason) = event.outcome {
            progress.println(format!("Download failed: {}: {reason}", event.task.file_name()));
        }
    };

    let cancel = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };

    let result = engine
        .run_until(tasks, config.download.threads, &mut observer, cancel)
        .await;
    progress.finish();

    let report = result?;
    Ok(print_summary(&report))
}

fn print_summary(report: &FetchReport) -> ExitCode {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let speed = format_bytes(report.throughput() as u64);

    match report.status() {
        RunStatus::NothingToDo => {
            println!("No missing model files to download");
            ExitCode::SUCCESS
        }
        RunStatus::Complete => {
            println!(
                "Download completed successfully with {} of data fetched ({speed}/s).",
                format_bytes(report.total_bytes)
            );
            ExitCode::SUCCESS
        }
        RunStatus::Partial | RunStatus::Failed => {
            println!(
                "Downloaded {} of {} files ({}), {} failed:",
                report.completed.len(),
                report.task_count,
                format_bytes(report.total_bytes),
                report.failures.len()
            );
            for failure in &report.failures {
                println!("  {}: {}", failure.task.file_name(), failure.reason);
            }
            ExitCode::FAILURE
        }
    }
}

/// Greedy word wrap for model descriptions
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        if !line.is_empty() && line.len() + 1 + word.len() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}
