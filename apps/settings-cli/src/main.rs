//! `settings-cli` - inspect and edit registry-managed settings from a shell

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use settings_registry::domain::migration::{is_migrated, LegacyAdapter};
use settings_registry::features::{BuildModule, TerminalModule};
use settings_registry::{
    ExportDocument, Registry, RegistryConfig, RegistryEnv, SettingType, SettingValue,
    SettingsModule,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_LEVEL: &str = "info";
const DATA_DIR_NAME: &str = "settings-registry";
const MASK: &str = "********";

#[derive(Parser)]
#[command(name = "settings-cli", about = "Inspect and edit feature-module settings")]
struct Cli {
    /// YAML configuration file layered under SETTINGS_REGISTRY_* variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Directory for settings files; defaults to the user config directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Directory holding legacy flat files to migrate
    #[arg(long, global = true)]
    legacy_dir: Option<PathBuf>,
    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered modules
    List,
    /// Print one setting, or every setting of a module
    Get(GetArgs),
    /// Validate and store one setting
    Set(SetArgs),
    /// Restore defaults for one module, or for all with --all
    Reset(ResetArgs),
    /// Write an export document to stdout or a file
    Export(ExportArgs),
    /// Apply an export document
    Import(ImportArgs),
    /// Modules that refresh when the given module changes
    Dependents { module: String },
    /// Report legacy migration state; migration itself runs on load
    Migrate,
    /// Render a module's settings in its legacy flat-file format
    Legacy { module: String },
}

#[derive(Args)]
struct GetArgs {
    module: String,
    key: Option<String>,
    /// Print sensitive values instead of masking them
    #[arg(long)]
    show_sensitive: bool,
}

#[derive(Args)]
struct SetArgs {
    module: String,
    key: String,
    value: String,
}

#[derive(Args)]
struct ResetArgs {
    module: Option<String>,
    #[arg(long, conflicts_with = "module")]
    all: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum DocFormat {
    Json,
    Yaml,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long)]
    include_sensitive: bool,
    #[arg(long, value_enum, default_value_t = DocFormat::Json)]
    format: DocFormat,
    #[arg(long, short)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ImportArgs {
    file: PathBuf,
    /// Document format; inferred from the file extension when omitted
    #[arg(long, value_enum)]
    format: Option<DocFormat>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(cli.log_json) {
        eprintln!("warning: {err}");
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(json: bool) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL));
    let installed = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}

fn load_config(cli: &Cli) -> Result<RegistryConfig> {
    let mut config = RegistryConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.data_dir {
        config.data_dir = Some(dir.clone());
    }
    if let Some(dir) = &cli.legacy_dir {
        config.legacy_dir = Some(dir.clone());
    }
    if config.data_dir.is_none() {
        let base = dirs::config_dir().context("no user config directory; pass --data-dir")?;
        config.data_dir = Some(base.join(DATA_DIR_NAME));
    }
    if let Some(dir) = &config.data_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create data directory {}", dir.display()))?;
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    tracing::debug!(data_dir = ?config.data_dir, legacy_dir = ?config.legacy_dir, "Opening settings registry");

    let registry = Registry::new(RegistryEnv::from_config(config)?)?;
    if !registry.initialize() {
        tracing::warn!("Some settings modules failed to load");
    }

    let outcome = dispatch(&registry, cli.command);
    // Shutdown saves whatever the command left dirty
    registry.shutdown();
    outcome
}

fn dispatch(registry: &Arc<Registry>, command: Command) -> Result<()> {
    match command {
        Command::List => list(registry),
        Command::Get(args) => get(registry, args),
        Command::Set(args) => set(registry, args),
        Command::Reset(args) => reset(registry, args),
        Command::Export(args) => export(registry, args),
        Command::Import(args) => import(registry, args),
        Command::Dependents { module } => dependents(registry, &module),
        Command::Migrate => migrate(registry),
        Command::Legacy { module } => legacy(registry, &module),
    }
}

fn module(registry: &Registry, id: &str) -> Result<Arc<dyn SettingsModule>> {
    registry
        .get_module(id)
        .ok_or_else(|| anyhow!("unknown module '{id}'"))
}

fn list(registry: &Registry) -> Result<()> {
    for id in registry.module_ids() {
        let module = module(registry, &id)?;
        let descriptor = module.descriptor();
        println!(
            "{:<14} {:<18} {:<16} {} keys",
            id,
            descriptor.name,
            descriptor.category.as_str(),
            descriptor.defaults().len()
        );
    }
    Ok(())
}

fn display_value(module: &dyn SettingsModule, key: &str, value: &SettingValue, show: bool) -> String {
    if !show && module.descriptor().is_sensitive(key) {
        MASK.to_string()
    } else {
        value.to_string()
    }
}

fn get(registry: &Registry, args: GetArgs) -> Result<()> {
    let module = module(registry, &args.module)?;
    match &args.key {
        Some(key) => {
            let value = registry
                .get_setting(&args.module, key)
                .ok_or_else(|| anyhow!("'{}' has no setting '{key}'", args.module))?;
            println!("{}", display_value(module.as_ref(), key, &value, args.show_sensitive));
        }
        None => {
            for (key, value) in module.current_settings()?.iter() {
                println!(
                    "{key} = {}",
                    display_value(module.as_ref(), key, value, args.show_sensitive)
                );
            }
        }
    }
    Ok(())
}

/// Interpret command-line text as the type the module declares for `key`;
/// undeclared dynamic keys are strings
fn parse_value(kind: Option<SettingType>, raw: &str) -> Result<SettingValue> {
    let kind = kind.unwrap_or(SettingType::String);
    SettingValue::parse(kind, raw).ok_or_else(|| anyhow!("'{raw}' is not a valid {kind}"))
}

fn set(registry: &Registry, args: SetArgs) -> Result<()> {
    let module = module(registry, &args.module)?;
    let descriptor = module.descriptor();
    if !descriptor.owns_key(&args.key) {
        bail!("'{}' has no setting '{}'", args.module, args.key);
    }
    let value = parse_value(descriptor.expected_type(&args.key), &args.value)?;
    let stored = module
        .set_validated(&args.key, value)
        .with_context(|| format!("failed to set {}.{}", args.module, args.key))?;
    if !registry.save_all_now() {
        bail!("failed to save settings");
    }
    println!(
        "{}.{} = {}",
        args.module,
        args.key,
        display_value(module.as_ref(), &args.key, &stored, false)
    );
    Ok(())
}

fn reset(registry: &Registry, args: ResetArgs) -> Result<()> {
    match (args.all, args.module) {
        (true, _) => {
            if !registry.reset_all_now() {
                bail!("some modules failed to reset");
            }
            println!("All modules reset to defaults");
        }
        (false, Some(id)) => {
            module(registry, &id)?
                .reset_to_defaults()
                .with_context(|| format!("failed to reset '{id}'"))?;
            println!("'{id}' reset to defaults");
        }
        (false, None) => bail!("name a module or pass --all"),
    }
    Ok(())
}

fn render(document: &ExportDocument, format: DocFormat) -> Result<String> {
    Ok(match format {
        DocFormat::Json => document.to_json_pretty()?,
        DocFormat::Yaml => serde_yaml::to_string(document)?,
    })
}

fn export(registry: &Registry, args: ExportArgs) -> Result<()> {
    let document = registry.export_all_settings(args.include_sensitive)?;
    let text = render(&document, args.format)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, text)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!(
                "Exported {} modules to {}",
                document.modules.len(),
                path.display()
            );
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn infer_format(path: &Path) -> DocFormat {
    match path.extension().and_then(|e| e.to_str()) {
        Some("yaml" | "yml") => DocFormat::Yaml,
        _ => DocFormat::Json,
    }
}

/// Normalize either format to JSON text so both go through the same shape check
fn document_json(text: &str, format: DocFormat) -> Result<String> {
    match format {
        DocFormat::Json => Ok(text.to_string()),
        DocFormat::Yaml => {
            let value: serde_json::Value =
                serde_yaml::from_str(text).context("invalid YAML document")?;
            Ok(serde_json::to_string(&value)?)
        }
    }
}

fn import(registry: &Registry, args: ImportArgs) -> Result<()> {
    let text = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let format = args.format.unwrap_or_else(|| infer_format(&args.file));
    let report = registry.import_settings_json(&document_json(&text, format)?)?;

    println!("Imported: {}", report.imported.join(", "));
    if !report.skipped.is_empty() {
        println!("Skipped (unknown modules): {}", report.skipped.join(", "));
    }
    for (id, reason) in &report.failed {
        println!("Failed: {id}: {reason}");
    }
    if !registry.save_all_now() {
        bail!("failed to save imported settings");
    }
    if !report.failed.is_empty() {
        bail!("{} module(s) failed to import", report.failed.len());
    }
    Ok(())
}

fn dependents(registry: &Registry, id: &str) -> Result<()> {
    module(registry, id)?;
    for dependent in registry.get_dependent_modules(id) {
        println!("{dependent}");
    }
    Ok(())
}

fn migration_state<A: LegacyAdapter>(module: Option<Arc<A>>) -> Result<Option<(String, bool)>> {
    let Some(module) = module else {
        return Ok(None);
    };
    let migrated = is_migrated(module.as_ref())?;
    Ok(Some((module.id().to_string(), migrated)))
}

fn migrate(registry: &Registry) -> Result<()> {
    let states = [
        migration_state(registry.module::<TerminalModule>())?,
        migration_state(registry.module::<BuildModule>())?,
    ];
    for (id, migrated) in states.into_iter().flatten() {
        let state = if migrated { "migrated" } else { "no legacy data imported" };
        println!("{id:<14} {state}");
    }
    Ok(())
}

fn legacy(registry: &Registry, id: &str) -> Result<()> {
    let rendered = if let Some(terminal) = registry.module::<TerminalModule>().filter(|m| m.id() == id) {
        terminal.to_legacy_format()?
    } else if let Some(build) = registry.module::<BuildModule>().filter(|m| m.id() == id) {
        build.to_legacy_format()?
    } else {
        bail!("'{id}' has no legacy format");
    };
    print!("{rendered}");
    Ok(())
}
