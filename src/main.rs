use clap::{ArgAction, Args, Parser, Subcommand};
use sitepipe::config::{self, CONFIG_FILENAME, ConfigError, PipelineConfig};
use sitepipe::context::Context;
use sitepipe::dev::DevServer;
use sitepipe::runner::{self, Step};
use sitepipe::tasks::{StyleMode, TaskKind};
use sitepipe::{logging, output};
use std::path::PathBuf;
use std::sync::Arc;

fn version_string() -> &'static str {
    let version = env!("CARGO_PKG_VERSION");
    let describe = env!("SITEPIPE_GIT_DESCRIBE");
    if describe.is_empty() || describe.trim_start_matches('v') == version {
        version
    } else {
        // Leaked once at startup, called exactly once
        Box::leak(format!("{version} ({describe})").into_boxed_str())
    }
}

#[derive(Parser)]
#[command(name = "sitepipe")]
#[command(about = "Static-site asset pipeline with a live-reload preview server")]
#[command(long_about = "\
Static-site asset pipeline with a live-reload preview server

Compiles templates, Sass and scripts from the source tree into the output
tree, optimizes images, and serves the output while you edit.

Project layout (defaults, override in sitepipe.toml):

  project/
  ├── sitepipe.toml                # optional
  ├── source/
  │   ├── index.ejs                # → public/index.html
  │   ├── _layout.ejs              # partial, no output of its own
  │   └── assets/
  │       ├── sass/main.scss       # → public/assets/css/main.css (+ maps/)
  │       ├── js/app.js            # → public/assets/js/app.js
  │       └── images/logo.svg      # → public/assets/images/logo.svg
  └── public/                      # output root, removed by `clean`

Without a subcommand, runs `dev`.

Run 'sitepipe gen-config' to generate a documented sitepipe.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Project directory
    #[arg(long, default_value = ".", global = true)]
    project: PathBuf,

    /// Config file [default: <project>/sitepipe.toml]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Preview server port (overrides server.port)
    #[arg(long, global = true)]
    port: Option<u16>,

    /// More logging (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Args, Clone, Default)]
struct DevArgs {
    /// Run a full build before serving
    #[arg(long)]
    build: bool,
}

#[derive(Args, Clone)]
struct StyleArgs {
    /// Minify and skip source maps
    #[arg(long)]
    compressed: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the output root, rebuild on change, and live-reload browsers
    Dev(DevArgs),
    /// Remove the output root
    Clean,
    /// Clean, then build everything (expanded CSS with source maps)
    Build,
    /// Clean, then build everything (compressed CSS)
    Release,
    /// Render templates to HTML
    Html,
    /// Compile Sass to CSS
    Styles(StyleArgs),
    /// Minify scripts
    Scripts,
    /// Optimize images
    Images,
    /// Print a stock sitepipe.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Dev(DevArgs::default()));

    if let Command::GenConfig = command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    logging::init(cli.verbose, cli.quiet);
    let config = load_config(&cli.project, cli.config.as_ref(), cli.port)?;
    init_thread_pool(&config.processing);
    let ctx = Context::new(&cli.project, config)?;

    match command {
        Command::Dev(args) => {
            if args.build {
                run_step(&ctx, &Step::build())?;
            }
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?;
            runtime.block_on(DevServer::new(Arc::new(ctx)).run())?;
        }
        Command::Clean => run_step(&ctx, &Step::Task(TaskKind::Clean))?,
        Command::Build => run_step(&ctx, &Step::build())?,
        Command::Release => run_step(&ctx, &Step::release())?,
        Command::Html => run_step(&ctx, &Step::Task(TaskKind::Html))?,
        Command::Styles(args) => {
            let mode = if args.compressed {
                StyleMode::Compressed
            } else {
                StyleMode::Expanded
            };
            run_step(&ctx, &Step::Task(TaskKind::Styles(mode)))?
        }
        Command::Scripts => run_step(&ctx, &Step::Task(TaskKind::Scripts))?,
        Command::Images => run_step(&ctx, &Step::Task(TaskKind::Images))?,
        Command::GenConfig => {}
    }

    Ok(())
}

/// Load `--config` (must exist) or `<project>/sitepipe.toml` (optional),
/// then apply CLI overrides.
fn load_config(
    project: &std::path::Path,
    explicit: Option<&PathBuf>,
    port: Option<u16>,
) -> Result<PipelineConfig, ConfigError> {
    let mut config = match explicit {
        Some(path) => config::load_config(path, true)?,
        None => config::load_config(&project.join(CONFIG_FILENAME), false)?,
    };
    if let Some(port) = port {
        config.server.port = port;
    }
    Ok(config)
}

fn run_step(ctx: &Context, step: &Step) -> Result<(), Box<dyn std::error::Error>> {
    let reports = runner::run(ctx, step)?;
    output::print_reports(&reports);
    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Capped at the number of available CPU cores.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
