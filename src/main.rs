use assetline::context::{BuildContext, Environment};
use assetline::engine::NativeEngine;
use assetline::orchestrator::Orchestrator;
use assetline::stage::StagePlan;
use assetline::{annotations, cache, config, images, output, watch};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Shared flags for commands that compress images.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Ignore the compression cache and recompress every image
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "assetline")]
#[command(version)]
#[command(about = "Front-end asset build orchestrator")]
#[command(long_about = "\
Front-end asset build orchestrator

Runs an ordered set of build stages around the core asset compile:

  development   annotations → compile
  production    cleanup → compile → copy-images → compress-images → banners

Project layout (all paths configurable in assetline.toml):

  assetline.toml                   # Project config (optional)
  local.toml                       # Local dev proxy URL (optional, untracked)
  src/
  ├── stylesheets/                 # app.scss → public/assets/stylesheets/app.css
  │   └── _partial.scss            # Partials are never entry points
  ├── javascripts/                 # Bundled per [javascripts.entries]
  ├── images/                      # Compressed in production
  └── fonts/                       # Copied verbatim
  templates/                       # Scanned for annotations and used selectors

Run 'assetline gen-config' to generate a documented assetline.toml.")]
struct Cli {
    /// Project root
    #[arg(long, default_value = ".", global = true)]
    root: PathBuf,

    /// Enable debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the full stage sequence for an environment
    Build {
        #[arg(long, value_enum, default_value_t = Environment::Development)]
        env: Environment,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Development build, then rebuild styles on change
    Watch {
        /// Quiet period before a burst of changes triggers a rebuild
        #[arg(long, default_value_t = 300)]
        debounce_ms: u64,
    },
    /// Compress source images into the image destination
    Images(CacheArgs),
    /// Write annotation reports (todo-*.md) at the project root
    Todo,
    /// Delete the image compression cache
    ClearCache,
    /// Print a stock assetline.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        output::report_error(e.as_ref());
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    match cli.command {
        Command::Build { env, cache } => {
            let ctx = load_context(&cli.root, env)?;
            build(&ctx, !cache.no_cache)?;
        }
        Command::Watch { debounce_ms } => {
            let ctx = load_context(&cli.root, Environment::Development)?;
            build(&ctx, true)?;
            let options = watch::WatchOptions {
                debounce: Duration::from_millis(debounce_ms),
                dev_url: config::load_dev_url(&cli.root),
            };
            watch::watch_styles(&ctx, &options)?;
        }
        Command::Images(cache_args) => {
            let ctx = load_context(&cli.root, Environment::Production)?;
            let paths = ctx.paths();
            let codecs = images::CodecSet::from_config(&ctx.config().images);
            let mut image_cache = images::open_cache(&ctx, !cache_args.no_cache);
            if image_cache.is_empty() {
                println!("Cache is empty: every image will be compressed, this may take a while");
            }
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_image_event(&event) {
                        println!("{}", line);
                    }
                }
            });
            let report = images::compress_tree(
                &paths.images_src,
                &paths.images_dest,
                &codecs,
                &mut image_cache,
                Some(tx),
            )?;
            printer.join().map_err(|_| "output thread panicked")?;
            output::print_image_report(&report);
        }
        Command::Todo => {
            let ctx = load_context(&cli.root, Environment::Development)?;
            let reports = annotations::write_reports(&ctx)?;
            output::print_annotation_reports(&reports, &ctx.paths().root);
        }
        Command::ClearCache => {
            let project = config::load_config(&cli.root)?;
            let dir = cli.root.join(&project.cache.dir);
            if cache::clear(&dir)? {
                println!("Cleared {}", dir.display());
            } else {
                println!("Nothing to clear at {}", dir.display());
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }
    Ok(())
}

fn load_context(root: &Path, env: Environment) -> Result<BuildContext, Box<dyn Error>> {
    let project = config::load_config(root)?;
    Ok(BuildContext::new(env, root, project))
}

/// Run the orchestrated build, printing progress as it goes.
fn build(ctx: &BuildContext, use_cache: bool) -> Result<(), Box<dyn Error>> {
    let plan = StagePlan::for_environment(ctx.env(), use_cache);
    let engine = NativeEngine::from_context(ctx);

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            for line in output::format_build_event(&event) {
                println!("{}", line);
            }
        }
    });
    let result = Orchestrator::new(plan, &engine).with_events(tx).run(ctx);
    printer.join().map_err(|_| "output thread panicked")?;

    let summary = result?;
    output::print_summary(&summary);
    Ok(())
}
