//! gwpush CLI entrypoint.
//!
//! This is the main entrypoint for the gwpush command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use gateway_push::cli::{
    Cli, Commands, OutputFormatter, TargetArgs, TargetStatus, connect, connect_all,
    fingerprint_store,
};
use gateway_push::config::{
    ConfigParser, ConfigValidator, DesiredConfiguration, Fingerprint, FingerprintEngine,
    MirrorSettings, find_config_file,
};
use gateway_push::delivery::reconciled::{self, ReconcileOptions};
use gateway_push::delivery::{RuntimeTarget, TargetMode};
use gateway_push::error::{PushError, Result};
use gateway_push::metrics::PushMetrics;
use gateway_push::mirror::SecondaryMirror;
use gateway_push::orchestrator::{Orchestrator, PushOptions, PushOutcome};
use gateway_push::state::{FingerprintRecord, FingerprintStore, LocalFingerprintStore};

use clap::Parser;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose, cli.log_json);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool, json: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Writes command output to stdout.
fn emit(output: &str) {
    let mut stdout = std::io::stdout().lock();
    let _ = writeln!(stdout, "{}", output.trim_end());
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<()> {
    let formatter = OutputFormatter::new(cli.output);
    let Cli {
        config,
        overlay,
        command,
        ..
    } = cli;
    let sources = || ConfigSources::resolve(config.as_deref(), overlay.clone());

    match command {
        Commands::Push {
            target,
            force,
            state_dir,
            print_metrics,
        } => {
            cmd_push(
                &sources()?,
                &target,
                PushOptions { force_full: force },
                state_dir.as_deref(),
                print_metrics,
                formatter,
            )
            .await
        }
        Commands::Sync {
            target,
            interval_secs,
            state_dir,
            print_metrics,
        } => {
            cmd_sync(
                sources()?,
                target,
                Duration::from_secs(interval_secs.max(1)),
                state_dir.as_deref(),
                print_metrics,
                formatter,
            )
            .await
        }
        Commands::Fingerprint => cmd_fingerprint(&sources()?, formatter),
        Commands::Status { target } => cmd_status(&target, formatter).await,
        Commands::Validate { warnings } => cmd_validate(&sources()?, warnings, formatter),
        Commands::Plan { target } => cmd_plan(&sources()?, &target, formatter).await,
    }
}

/// Where the desired configuration comes from.
struct ConfigSources {
    parser: ConfigParser,
    config: PathBuf,
    overlay: Option<PathBuf>,
}

impl ConfigSources {
    fn resolve(config: Option<&Path>, overlay: Option<PathBuf>) -> Result<Self> {
        let config = match config {
            Some(path) => path.to_path_buf(),
            None => find_config_file(std::env::current_dir()?)?,
        };
        let base = config
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let parser = ConfigParser::new().with_base_path(base);
        parser.load_dotenv()?;

        Ok(Self {
            parser,
            config,
            overlay,
        })
    }

    fn load(&self) -> Result<DesiredConfiguration> {
        debug!("Loading desired configuration: {}", self.config.display());
        self.parser
            .load_desired(&self.config, self.overlay.as_deref())
    }
}

/// One target with its push state. The mutex serializes pushes to it.
struct TargetSlot {
    url: String,
    target: RuntimeTarget,
    store: LocalFingerprintStore,
    last: Arc<Mutex<Fingerprint>>,
}

impl TargetSlot {
    async fn open(
        url: &str,
        target: RuntimeTarget,
        state_dir: Option<&Path>,
        multiple_targets: bool,
    ) -> Result<Self> {
        let store = fingerprint_store(state_dir, url, multiple_targets)?;
        let last = match store.load().await {
            Ok(record) => record
                .and_then(|r| r.fingerprint_for(url))
                .unwrap_or(Fingerprint::UNSET),
            Err(e) => {
                warn!("Ignoring unreadable fingerprint state for {url}: {e}");
                Fingerprint::UNSET
            }
        };
        debug!("Last applied fingerprint for {url}: {}", last.short());

        Ok(Self {
            url: url.to_string(),
            target,
            store,
            last: Arc::new(Mutex::new(last)),
        })
    }
}

async fn open_slots(args: &TargetArgs, state_dir: Option<&Path>) -> Result<Vec<Arc<TargetSlot>>> {
    let targets = connect_all(args).await?;
    let multiple = args.admin_urls.len() > 1;

    let mut slots = Vec::with_capacity(targets.len());
    for (url, target) in args.admin_urls.iter().zip(targets) {
        slots.push(Arc::new(TargetSlot::open(url, target, state_dir, multiple).await?));
    }
    Ok(slots)
}

fn build_orchestrator(args: &TargetArgs) -> Result<Orchestrator> {
    let mirror = SecondaryMirror::from_settings(MirrorSettings::from_env()?)
        .map(|mirror| mirror.with_timeout(args.timeout_secs));
    if mirror.is_some() {
        info!("Secondary mirroring enabled");
    }
    Ok(Orchestrator::new(PushMetrics::unregistered()?).with_mirror(mirror))
}

/// Pushes once to one target, bounded by `timeout`, and persists the
/// fingerprint on success.
async fn push_slot(
    orchestrator: &Orchestrator,
    slot: &TargetSlot,
    last: &mut Fingerprint,
    desired: &DesiredConfiguration,
    options: PushOptions,
    timeout: Duration,
    shutdown: &CancellationToken,
) -> PushOutcome {
    let token = shutdown.child_token();
    let timer = {
        let token = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            token.cancel();
        })
    };

    let outcome = orchestrator
        .push(&slot.target, desired, *last, options, &token)
        .await;
    timer.abort();

    if outcome.is_applied() {
        *last = outcome.fingerprint;
        let record = FingerprintRecord::new(outcome.fingerprint, &slot.url);
        if let Err(e) = slot.store.save(&record).await {
            error!("Failed to persist fingerprint for {}: {e}", slot.url);
        }
    }
    outcome
}

fn shutdown_on_ctrl_c() -> CancellationToken {
    let shutdown = CancellationToken::new();
    let token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, stopping");
        }
        token.cancel();
    });
    shutdown
}

/// Push the desired configuration to every target once.
async fn cmd_push(
    sources: &ConfigSources,
    args: &TargetArgs,
    options: PushOptions,
    state_dir: Option<&Path>,
    print_metrics: bool,
    formatter: OutputFormatter,
) -> Result<()> {
    let desired = sources.load()?;
    let orchestrator = build_orchestrator(args)?;
    let slots = open_slots(args, state_dir).await?;
    let shutdown = shutdown_on_ctrl_c();
    let timeout = Duration::from_secs(args.timeout_secs);

    let mut failures = Vec::new();
    for slot in &slots {
        let mut last = slot.last.lock().await;
        let outcome = push_slot(
            &orchestrator,
            slot,
            &mut last,
            &desired,
            options,
            timeout,
            &shutdown,
        )
        .await;
        emit(&formatter.format_outcome(&slot.url, &outcome));
        if let Some(e) = outcome.error {
            failures.push(e);
        }
    }

    if print_metrics {
        emit(&orchestrator.metrics().render_text()?);
    }

    match failures.len() {
        0 => Ok(()),
        1 => Err(failures.remove(0)),
        _ => Err(PushError::Multi(failures)),
    }
}

/// Push periodically until interrupted.
async fn cmd_sync(
    sources: ConfigSources,
    args: TargetArgs,
    interval: Duration,
    state_dir: Option<&Path>,
    print_metrics: bool,
    formatter: OutputFormatter,
) -> Result<()> {
    let orchestrator = Arc::new(build_orchestrator(&args)?);
    let slots = open_slots(&args, state_dir).await?;
    let shutdown = shutdown_on_ctrl_c();
    let timeout = Duration::from_secs(args.timeout_secs);

    info!(
        "Syncing {} to {} target(s) every {}s",
        sources.config.display(),
        slots.len(),
        interval.as_secs()
    );

    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut in_flight = JoinSet::new();

    loop {
        tokio::select! {
            () = shutdown.cancelled() => break,
            _ = ticker.tick() => {}
        }
        while in_flight.try_join_next().is_some() {}

        let desired = match sources.load() {
            Ok(desired) => Arc::new(desired),
            Err(e) => {
                error!("Skipping sync cycle, configuration could not be loaded: {e}");
                continue;
            }
        };

        for slot in &slots {
            let Ok(mut last) = Arc::clone(&slot.last).try_lock_owned() else {
                debug!("Previous push to {} still running", slot.url);
                continue;
            };
            let slot = Arc::clone(slot);
            let orchestrator = Arc::clone(&orchestrator);
            let desired = Arc::clone(&desired);
            let shutdown = shutdown.clone();

            in_flight.spawn(async move {
                let outcome = push_slot(
                    &orchestrator,
                    &slot,
                    &mut last,
                    &desired,
                    PushOptions::default(),
                    timeout,
                    &shutdown,
                )
                .await;
                if !outcome.is_skipped() {
                    emit(&formatter.format_outcome(&slot.url, &outcome));
                }
            });
        }
    }

    while in_flight.join_next().await.is_some() {}

    if print_metrics {
        emit(&orchestrator.metrics().render_text()?);
    }
    Ok(())
}

/// Print the content fingerprint.
fn cmd_fingerprint(sources: &ConfigSources, formatter: OutputFormatter) -> Result<()> {
    let desired = sources.load()?;
    let fingerprint = FingerprintEngine::new().fingerprint(&desired)?;
    emit(&formatter.format_fingerprint(&fingerprint));
    Ok(())
}

/// Show what each target reports.
async fn cmd_status(args: &TargetArgs, formatter: OutputFormatter) -> Result<()> {
    let multiple = args.admin_urls.len() > 1;
    let mut statuses = Vec::with_capacity(args.admin_urls.len());

    for url in &args.admin_urls {
        let target = connect(args, url).await?;
        let status = target.client.status().await?;
        let last_applied = fingerprint_store(None, url, multiple)?
            .load()
            .await
            .ok()
            .flatten()
            .and_then(|record| record.fingerprint_for(url));

        statuses.push(TargetStatus {
            target: url.clone(),
            protocol: target.protocol().to_string(),
            version: target.version.to_string(),
            configuration_hash: status
                .has_configuration()
                .then(|| status.configuration_hash.clone())
                .flatten(),
            last_applied,
        });
    }

    emit(&formatter.format_status(&statuses));
    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    sources: &ConfigSources,
    show_warnings: bool,
    formatter: OutputFormatter,
) -> Result<()> {
    info!("Validating configuration: {}", sources.config.display());
    let config = sources.parser.load_file(&sources.config)?;

    let validator = ConfigValidator::new();
    let result = validator.check(&config);
    emit(&formatter.format_validation(&config, &result, show_warnings));

    validator.validate(&config).map(|_| ())
}

/// Show the reconciled sync plan for each target.
async fn cmd_plan(
    sources: &ConfigSources,
    args: &TargetArgs,
    formatter: OutputFormatter,
) -> Result<()> {
    let desired = sources.load()?;

    for url in &args.admin_urls {
        let target = connect(args, url).await?;
        if target.mode == TargetMode::DirectApply {
            info!("{url} accepts whole documents; there is no entity plan");
            continue;
        }

        let plan = reconciled::build_plan(
            &target.client,
            &desired.core,
            &ReconcileOptions::from(&target),
        )
        .await?;
        emit(&formatter.format_plan(url, &plan));
    }
    Ok(())
}
