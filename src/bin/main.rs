//! Roslyn signing CLI
//!
//! Generates the MicroBuild signing project for a set of binaries and runs
//! MSBuild against it.

use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use sign_roslyn::{
    infra::config::{ConfigManager, ExportFormat},
    infra::progress::ProgressFactory,
    EngineInvocation, ManifestDocument, ProgressStyle, SignConfiguration, SignLayout,
    SignOrchestrator, SigningRequest,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "sign-roslyn")]
#[command(about = "Sign binaries through MSBuild and the MicroBuild signing targets")]
#[command(long_about = "
sign-roslyn - drives MSBuild to sign a batch of binaries

EXAMPLES:
    # Sign two binaries
    sign-roslyn sign --run-dir obj --binaries-dir Binaries/Release --source-dir . csc.exe vbc.exe

    # Sign everything listed in a file
    sign-roslyn sign --run-dir obj --binaries-dir Binaries/Release --source-dir . --file-list files.txt

    # Show the generated project without running MSBuild
    sign-roslyn manifest --binaries-dir Binaries/Release --source-dir . csc.exe

ENVIRONMENT VARIABLES:
    RUST_LOG        Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user configuration directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign files with one MSBuild run
    Sign {
        /// Files to sign, in manifest order
        #[arg(value_name = "FILE")]
        files: Vec<String>,

        /// Read additional files to sign from a list (one path per line)
        #[arg(long, value_name = "LIST")]
        file_list: Option<PathBuf>,

        /// Directory the project is written to and MSBuild runs in
        #[arg(long, value_name = "DIR")]
        run_dir: PathBuf,

        /// Output root for signed binaries
        #[arg(long, value_name = "DIR")]
        binaries_dir: PathBuf,

        /// Source-tree root holding build\Targets\VSL.Settings.targets
        #[arg(long, value_name = "DIR")]
        source_dir: PathBuf,

        /// MSBuild executable (overrides config and platform default)
        #[arg(long, value_name = "PATH")]
        engine: Option<PathBuf>,

        /// Kill MSBuild after this many seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,

        /// Output style
        #[arg(long, value_enum, default_value = "full")]
        progress: ProgressStyleArg,

        /// Write the project and show the command line without running MSBuild
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the signing project for the given files
    Manifest {
        /// Files to sign, in manifest order
        #[arg(value_name = "FILE")]
        files: Vec<String>,

        /// Read additional files from a list (one path per line)
        #[arg(long, value_name = "LIST")]
        file_list: Option<PathBuf>,

        /// Output root for signed binaries
        #[arg(long, value_name = "DIR")]
        binaries_dir: PathBuf,

        /// Source-tree root
        #[arg(long, value_name = "DIR")]
        source_dir: PathBuf,

        /// Intermediates directory (defaults to the system temporary directory)
        #[arg(long, value_name = "DIR")]
        intermediates_dir: Option<PathBuf>,
    },

    /// Show where MSBuild was found
    Locate {
        /// Check this path instead of the configured candidates
        #[arg(long, value_name = "PATH")]
        engine: Option<PathBuf>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone)]
enum ProgressStyleArg {
    Full,
    Compact,
    Silent,
}

impl From<ProgressStyleArg> for ProgressStyle {
    fn from(arg: ProgressStyleArg) -> Self {
        match arg {
            ProgressStyleArg::Full => ProgressStyle::Full,
            ProgressStyleArg::Compact => ProgressStyle::Compact,
            ProgressStyleArg::Silent => ProgressStyle::Silent,
        }
    }
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the sign command
struct SignCommandArgs {
    files: Vec<String>,
    file_list: Option<PathBuf>,
    layout: SignLayout,
    engine: Option<PathBuf>,
    timeout: Option<u64>,
    progress: ProgressStyleArg,
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config_manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Sign {
            files,
            file_list,
            run_dir,
            binaries_dir,
            source_dir,
            engine,
            timeout,
            progress,
            dry_run,
        } => {
            let args = SignCommandArgs {
                files,
                file_list,
                layout: SignLayout::new(run_dir, binaries_dir, source_dir),
                engine,
                timeout,
                progress,
                dry_run,
            };
            handle_sign_command(&config_manager, args)?;
        }

        Commands::Manifest {
            files,
            file_list,
            binaries_dir,
            source_dir,
            intermediates_dir,
        } => {
            let config = config_manager.load_or_default().into_diagnostic()?;
            let request = build_request(files, file_list.as_deref())?;
            // The run directory does not appear in the document.
            let layout = SignLayout::new(".", binaries_dir, source_dir);
            let intermediates = intermediates_dir.unwrap_or_else(std::env::temp_dir);
            let manifest =
                ManifestDocument::generate(&config.manifest, &layout, &intermediates, &request)
                    .into_diagnostic()?;
            print!("{manifest}");
        }

        Commands::Locate { engine } => {
            let mut config = config_manager.load_or_default().into_diagnostic()?;
            apply_engine_override(&mut config, engine.as_deref());
            let path = config
                .engine
                .locator()
                .locate()
                .into_diagnostic()
                .context("MSBuild lookup failed")?;
            println!("{}", path.display());
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

fn handle_sign_command(config_manager: &ConfigManager, args: SignCommandArgs) -> Result<()> {
    let mut config = config_manager.load_or_default().into_diagnostic()?;
    apply_engine_override(&mut config, args.engine.as_deref());
    if let Some(timeout) = args.timeout {
        config.engine.timeout_seconds = timeout;
    }
    config.validate().into_diagnostic()?;

    let request = build_request(args.files, args.file_list.as_deref())?;
    if request.is_empty() {
        log::warn!("No files to sign; the project will have an empty item list");
    }

    if args.dry_run {
        return dry_run(&config, &args.layout, &request);
    }

    let reporter = ProgressFactory::create_reporter(args.progress.into());
    let orchestrator = SignOrchestrator::from_config(args.layout, &config)
        .into_diagnostic()
        .context("Cannot start signing")?
        .with_reporter(reporter);

    let report = orchestrator.sign(&request).into_diagnostic()?;
    println!("✅ Signed {} file(s) in {:.2}s", report.files, report.duration.as_secs_f64());
    println!("  Project: {}", report.manifest_path.display());
    Ok(())
}

fn dry_run(config: &SignConfiguration, layout: &SignLayout, request: &SigningRequest) -> Result<()> {
    println!("🔍 Dry run mode - MSBuild will not be started");

    let manifest_path = layout.manifest_path();
    let manifest =
        ManifestDocument::generate(&config.manifest, layout, &std::env::temp_dir(), request)
            .into_diagnostic()?;
    manifest.write_to(&manifest_path).into_diagnostic()?;

    let invocation = EngineInvocation::new(&manifest_path, &layout.run_path)
        .with_target(config.manifest.target_name.clone())
        .with_verbosity(config.engine.verbosity.clone());
    let candidates = config.engine.locator();
    let program = candidates
        .candidates()
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from("MSBuild.exe"));

    println!("  Command: {}", invocation.command_line(&program));
    println!("  Working directory: {}", layout.run_path.display());
    println!("  Project: {} ({} file(s))", manifest_path.display(), manifest.file_count());
    println!("{manifest}");
    Ok(())
}

fn build_request(files: Vec<String>, file_list: Option<&Path>) -> Result<SigningRequest> {
    let mut request = SigningRequest::new(files);
    if let Some(list) = file_list {
        let content = std::fs::read_to_string(list)
            .into_diagnostic()
            .with_context(|| format!("Failed to read file list {}", list.display()))?;
        request.extend(SigningRequest::parse_file_list(&content).files().iter().cloned());
    }
    Ok(request)
}

fn apply_engine_override(config: &mut SignConfiguration, engine: Option<&Path>) {
    if let Some(engine) = engine {
        config.engine.engine_path = Some(engine.display().to_string());
    }
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load_existing().into_diagnostic()? {
            Some(config) => {
                println!("📋 Current Configuration:");
                match &config.engine.engine_path {
                    Some(path) => println!("  MSBuild override: {path}"),
                    None => println!(
                        "  MSBuild candidates: {}",
                        config
                            .engine
                            .locator()
                            .candidates()
                            .iter()
                            .map(|p| p.display().to_string())
                            .collect::<Vec<_>>()
                            .join(", ")
                    ),
                }
                println!("  Timeout: {}s (0 = none)", config.engine.timeout_seconds);
                println!("  Capture stderr: {}", config.engine.capture_stderr);
                println!("  Verbosity: {}", config.engine.verbosity);
                println!("  Target: {}", config.manifest.target_name);
                println!(
                    "  Backend: {} {}",
                    config.manifest.backend_package, config.manifest.backend_version
                );
                println!("  Strong name: {}", config.manifest.strong_name);
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            None => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key} = {value}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}
