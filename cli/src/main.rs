//! CLI entrypoint for conductor
//!
//! This is the main binary that wires together all layers using
//! dependency injection.

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use conductor_application::{
    AuditLogger, DiscoverToolsUseCase, EngineParams, EnginePorts, ExecutePlanUseCase,
    ExecutionProgressNotifier, NoAuditLogger, NoExecutionProgress, PlanOracle, RunGoalInput,
    RunGoalUseCase, TenantLimiter, TieredOracles, ToolInvokerPort, ToolRegistryPort,
    ValidatePlanUseCase, ValidationOutcome,
};
use conductor_domain::{ConfigIssue, Goal, PlanStatus, PlanValidator, parse_plan};
use conductor_infrastructure::{
    CatalogFile, ConfigLoader, FileConfig, HashingEmbedder, InMemoryCredentialEscrow,
    InMemoryToolRegistry, JsonPlanOracle, JsonlAuditLogger, OracleSource, StaticToolInvoker,
    load_context, replay_invocations,
};
use conductor_presentation::{
    Cli, Command, ConsoleFormatter, OutputConfig, ProgressReporter, ToolsCommand,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let mut config = if cli.no_config {
        ConfigLoader::load_defaults()
    } else {
        ConfigLoader::load(cli.config.as_deref())
            .map_err(|e| anyhow!("Invalid configuration: {}", e))?
    };
    if let Some(weight) = cli.tenant_boost_weight {
        config.discovery.tenant_boost.weight = weight;
    }

    let _log_guard = init_tracing(cli.verbose, config.logging.dir.as_deref());
    info!("Starting conductor");

    let output = OutputConfig::resolve(cli.output, config.output.format, config.output.color, cli.quiet);
    output.apply_color();

    let issues = config.validate();
    if !matches!(cli.command, Command::Config) {
        for issue in &issues {
            warn!("{}", issue);
        }
        if let Some(error) = issues.iter().find(|i| i.is_error()) {
            bail!("Configuration error: {}", error.message);
        }
    }

    let app = App {
        catalog: cli.catalog.clone(),
        params: config.to_engine_params(),
        config,
        output,
    };

    match cli.command {
        Command::Run {
            goal,
            context,
            plan,
            fixtures,
        } => app.run(goal, &context, plan, fixtures).await,
        Command::Validate {
            plan,
            context,
            allow_unsealed,
            execute,
            fixtures,
        } => app.validate(&plan, &context, allow_unsealed, execute, fixtures).await,
        Command::Search {
            goal,
            context,
            top_k,
        } => app.search(goal, &context, top_k).await,
        Command::Tools(ToolsCommand::List { all }) => app.list_tools(all).await,
        Command::Tools(ToolsCommand::Sweep {
            min_invocations,
            audit_log,
        }) => app.sweep(min_invocations, audit_log).await,
        Command::Config => {
            app.show_config(cli.config.as_deref(), &issues);
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Initialize logging based on verbosity level, optionally mirrored to a
/// daily rolling file.
fn init_tracing(verbose: u8, dir: Option<&Path>) -> Option<WorkerGuard> {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace", // -vvv or more
    };
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let stderr = fmt::layer().with_target(false).with_writer(std::io::stderr);

    match dir {
        Some(dir) => {
            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, "conductor.log"));
            tracing_subscriber::registry()
                .with(filter())
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter())
                .with(stderr)
                .init();
            None
        }
    }
}

struct App {
    config: FileConfig,
    params: EngineParams,
    catalog: Option<PathBuf>,
    output: OutputConfig,
}

impl App {
    async fn run(
        &self,
        goal: String,
        context: &Path,
        plan: Option<PathBuf>,
        fixtures: Option<PathBuf>,
    ) -> Result<ExitCode> {
        let context = Arc::new(load_context(context)?);
        let embedder = Arc::new(HashingEmbedder::new(self.config.discovery.embedding_dimension));
        let registry = self.registry(&embedder).await?;

        let ports = EnginePorts {
            registry,
            embedder,
            oracles: self.oracles(plan)?,
            invoker: self.invoker(fixtures)?,
            escrow: self.escrow(),
            limiter: Arc::new(TenantLimiter::new(self.params.tenant_concurrency)),
        };

        let use_case = RunGoalUseCase::new(ports, self.params.clone())
            .with_audit_logger(self.audit())
            .with_cancellation(cancel_on_ctrl_c());

        let input = RunGoalInput::new(goal.clone(), context);
        let progress = self.progress();
        let result = use_case.execute_with_progress(input, progress.as_ref()).await?;

        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&result));
        } else {
            println!("{}", ConsoleFormatter::format_run(&goal, &result));
        }
        Ok(exit_code(result.status))
    }

    async fn validate(
        &self,
        plan_path: &Path,
        context: &Path,
        allow_unsealed: bool,
        execute: bool,
        fixtures: Option<PathBuf>,
    ) -> Result<ExitCode> {
        let context = Arc::new(load_context(context)?);
        let text = std::fs::read_to_string(plan_path)
            .with_context(|| format!("Could not read plan {}", plan_path.display()))?;
        let plan = parse_plan(&text)?;

        let embedder = HashingEmbedder::new(self.config.discovery.embedding_dimension);
        let registry = self.registry(&embedder).await?;
        let validator = if allow_unsealed || self.params.allow_unsealed_plans {
            PlanValidator::new().allow_unsealed()
        } else {
            PlanValidator::new()
        };
        let audit = self.audit();
        let use_case = ValidatePlanUseCase::new(Arc::clone(&registry), validator)
            .with_audit_logger(Arc::clone(&audit));

        let validated = match use_case.execute(plan, &context) {
            ValidationOutcome::Rejected { report, .. } => {
                if self.output.is_json() {
                    println!("{}", ConsoleFormatter::format_json(&report));
                } else {
                    println!("{}", ConsoleFormatter::format_validation(&report));
                }
                return Ok(exit_code(PlanStatus::Rejected));
            }
            ValidationOutcome::Accepted(validated) => validated,
        };

        if !execute {
            if self.output.is_json() {
                println!("{}", ConsoleFormatter::format_json(validated.report()));
            } else {
                println!("{}", ConsoleFormatter::format_validation(validated.report()));
            }
            return Ok(ExitCode::SUCCESS);
        }

        let engine = ExecutePlanUseCase::new(
            registry,
            self.invoker(fixtures)?,
            self.escrow(),
            Arc::new(TenantLimiter::new(self.params.tenant_concurrency)),
            self.params.clone(),
        )
        .with_audit_logger(audit)
        .with_cancellation(cancel_on_ctrl_c());

        let progress = self.progress();
        progress.on_validation(validated.report());
        let report = engine
            .execute_with_progress(&validated, context, progress.as_ref())
            .await;

        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&report));
        } else {
            println!("{}", ConsoleFormatter::format_report(&report));
        }
        Ok(exit_code(report.status))
    }

    async fn search(&self, goal: String, context: &Path, top_k: Option<usize>) -> Result<ExitCode> {
        let context = load_context(context)?;
        let goal = Goal::parse(goal)?;
        let embedder = Arc::new(HashingEmbedder::new(self.config.discovery.embedding_dimension));
        let registry = self.registry(&embedder).await?;

        let matches = DiscoverToolsUseCase::new(embedder, registry)
            .execute(&goal, &context, top_k.unwrap_or(self.params.top_k))
            .await?;

        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&matches));
        } else {
            print!("{}", ConsoleFormatter::format_matches(&matches));
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn list_tools(&self, all: bool) -> Result<ExitCode> {
        let embedder = HashingEmbedder::new(self.config.discovery.embedding_dimension);
        let catalog = self.registry(&embedder).await?.snapshot();
        let tools: Vec<_> = catalog.iter().filter(|t| all || !t.is_deprecated()).collect();

        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&tools));
        } else {
            print!("{}", ConsoleFormatter::format_tools(tools));
        }
        Ok(ExitCode::SUCCESS)
    }

    async fn sweep(&self, min_invocations: Option<u64>, audit_log: Option<PathBuf>) -> Result<ExitCode> {
        let embedder = HashingEmbedder::new(self.config.discovery.embedding_dimension);
        let registry = self.registry(&embedder).await?;

        match audit_log.or_else(|| self.config.logging.audit_log.clone()) {
            Some(path) if path.exists() => {
                let replayed = replay_invocations(&path, registry.as_ref())
                    .with_context(|| format!("Could not replay {}", path.display()))?;
                info!(invocations = replayed, "Replayed audit log");
            }
            Some(path) => warn!("Audit log {} does not exist; every tool counts as unused", path.display()),
            None => warn!("No audit log configured; every tool counts as unused"),
        }

        let min = min_invocations.unwrap_or(self.config.registry.deprecation_usage_threshold);
        let swept: Vec<String> = registry
            .sweep_underused(min)
            .iter()
            .map(ToString::to_string)
            .collect();

        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&swept));
        } else if swept.is_empty() {
            println!("No tools below {} invocations.", min);
        } else {
            println!("Deprecated {} tool(s) below {} invocations:", swept.len(), min);
            for key in &swept {
                println!("  {}", key);
            }
        }
        Ok(ExitCode::SUCCESS)
    }

    fn show_config(&self, explicit: Option<&Path>, issues: &[ConfigIssue]) {
        if self.output.is_json() {
            println!("{}", ConsoleFormatter::format_json(&self.config));
            return;
        }

        println!("Configuration sources (in priority order):");
        println!("  [  env] {}*", conductor_infrastructure::config::ENV_PREFIX);
        for (label, path, found) in ConfigLoader::config_sources(explicit) {
            let mark = if found { "FOUND" } else { "     " };
            match path {
                Some(path) => println!("  [{}] {}: {}", mark, label, path.display()),
                None => println!("  [{}] {}: ./conductor.toml or ./.conductor.toml", mark, label),
            }
        }
        println!("  [     ] Default: built-in defaults");
        println!();
        print!("{}", ConsoleFormatter::format_issues(issues));
    }

    async fn registry(&self, embedder: &HashingEmbedder) -> Result<Arc<dyn ToolRegistryPort>> {
        let Some(path) = self.catalog.clone().or_else(|| self.config.registry.catalog.clone()) else {
            bail!("No tool catalog configured. Use --catalog or set [registry] catalog.");
        };

        let tools = CatalogFile::load(&path)?.into_tools(embedder).await?;
        let mut registry = InMemoryToolRegistry::new(self.config.discovery.embedding_dimension)
            .with_threshold(self.params.similarity_threshold);
        if let Some(boost) = self.config.discovery.tenant_boost.build(embedder).await? {
            info!(
                weight = self.config.discovery.tenant_boost.weight,
                tenants = self.config.discovery.tenant_boost.preferences.len(),
                "Tenant preference boost enabled"
            );
            registry = registry.with_boost(boost);
        }
        let count = registry.register_all(tools)?;
        info!(catalog = %path.display(), tools = count, "Loaded tool catalog");
        Ok(Arc::new(registry))
    }

    fn oracles(&self, plan: Option<PathBuf>) -> Result<TieredOracles> {
        if let Some(plan) = plan {
            return Ok(TieredOracles::single(Arc::new(JsonPlanOracle::new(plan))));
        }
        let Some(low) = &self.config.oracle.low else {
            bail!("No plan oracle configured. Use --plan or set [oracle] low.");
        };
        let low = build_oracle(low, self.params.oracle_timeout)?;
        Ok(match &self.config.oracle.high {
            Some(high) => TieredOracles::new(low, build_oracle(high, self.params.oracle_timeout)?),
            None => TieredOracles::single(low),
        })
    }

    fn invoker(&self, fixtures: Option<PathBuf>) -> Result<Arc<dyn ToolInvokerPort>> {
        match fixtures.or_else(|| self.config.invoker.fixtures.clone()) {
            Some(path) => Ok(Arc::new(StaticToolInvoker::load(path)?)),
            #[cfg(feature = "http")]
            None => Ok(Arc::new(conductor_infrastructure::HttpToolInvoker::new())),
            #[cfg(not(feature = "http"))]
            None => bail!("No tool fixtures configured and this build has no `http` feature."),
        }
    }

    fn escrow(&self) -> Arc<InMemoryCredentialEscrow> {
        let escrow = self
            .config
            .invoker
            .deny_credentials
            .iter()
            .fold(InMemoryCredentialEscrow::new(), |escrow, tool| escrow.with_denied(tool.clone()));
        Arc::new(escrow)
    }

    fn audit(&self) -> Arc<dyn AuditLogger> {
        match self.config.logging.audit_log.as_ref().and_then(JsonlAuditLogger::new) {
            Some(logger) => Arc::new(logger),
            None => Arc::new(NoAuditLogger),
        }
    }

    fn progress(&self) -> Box<dyn ExecutionProgressNotifier> {
        if self.output.show_progress {
            Box::new(ProgressReporter::new())
        } else {
            Box::new(NoExecutionProgress)
        }
    }
}

fn build_oracle(source: &OracleSource, timeout: Duration) -> Result<Arc<dyn PlanOracle>> {
    match source {
        OracleSource::File(path) => Ok(Arc::new(JsonPlanOracle::new(path.clone()))),
        #[cfg(feature = "http")]
        OracleSource::Endpoint(url) => Ok(Arc::new(conductor_infrastructure::HttpPlanOracle::new(
            url.clone(),
            timeout,
        )?)),
        #[cfg(not(feature = "http"))]
        OracleSource::Endpoint(url) => {
            let _ = timeout;
            bail!("Oracle endpoint {} requires the `http` feature", url)
        }
    }
}

fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            trigger.cancel();
        }
    });
    token
}

fn exit_code(status: PlanStatus) -> ExitCode {
    match status {
        PlanStatus::Completed => ExitCode::SUCCESS,
        PlanStatus::PartiallyCompleted => ExitCode::from(2),
        PlanStatus::Rejected => ExitCode::from(3),
        _ => ExitCode::FAILURE,
    }
}
