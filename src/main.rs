use clap::{Parser, Subcommand};
use inflapy_components::cache::{FragmentCache, PersistentCache};
use inflapy_components::clock::SystemClock;
use inflapy_components::components::{ComponentLoader, LoaderEvent};
use inflapy_components::config::{self, SiteConfig};
use inflapy_components::source::{DirSource, FragmentSource, HttpSource};
use inflapy_components::storage::{self, FileStorage};
use inflapy_components::{output, site};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc;
use std::thread::JoinHandle;
use tracing::Level;

/// Shared flags for commands that load components.
#[derive(clap::Args, Clone)]
struct CacheArgs {
    /// Disable the component cache and fetch every fragment
    #[arg(long)]
    no_cache: bool,
}

#[derive(Parser)]
#[command(name = "inflapy-components")]
#[command(about = "Assemble site pages from reusable HTML components")]
#[command(long_about = "\
Assemble site pages from reusable HTML components

Any element with a data-component attribute is a container. Its content is
replaced by the matching fragment from the components directory.

Site structure:

  site/
  ├── config.toml                  # Loader config (optional)
  ├── components/                  # Fragments, not copied to the output
  │   ├── header.html              # <div data-component=\"header\"></div>
  │   └── footer.html
  ├── index.html                   # Page → assembled into dist/index.html
  ├── blog/
  │   └── fiestas-infantiles.html  # Page → dist/blog/fiestas-infantiles.html
  └── css/styles.css               # Asset → copied as is

Fragments are cached in memory and in <cache-dir>/.component-cache.json for
one hour. Elements marked data-current-year get the current year.

Run 'inflapy-components gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Site directory
    #[arg(long, default_value = "site", global = true)]
    source: PathBuf,

    /// Output directory
    #[arg(long, default_value = "dist", global = true)]
    output: PathBuf,

    /// Directory for the persistent component cache
    #[arg(long, default_value = ".inflapy-cache", global = true)]
    cache_dir: PathBuf,

    /// Log cache and fetch activity
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Assemble every page of the site into the output directory
    Build(CacheArgs),
    /// Assemble a single page and print it to stdout
    Load {
        /// Page to assemble
        page: PathBuf,
        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Remove cached fragments from the persistent cache
    ClearCache,
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match &cli.command {
        Command::Build(cache_args) => {
            let site_config = config::load_config(&cli.source)?;
            init_tracing(cli.verbose || site_config.debug);
            init_thread_pool(&site_config.processing);

            let pages = site::discover_pages(&cli.source, &site_config)?;
            println!(
                "==> Assembling {} pages from {}",
                pages.len(),
                cli.source.display()
            );
            let (tx, printer) = spawn_printer(true);
            let loader = build_loader(&cli, &site_config, cache_args.no_cache)?.with_events(tx);
            let report = site::build(&loader, &cli.source, &cli.output)?;
            drop(loader);
            join_printer(printer);

            output::print_build_output(&report, &cli.output);
            println!("==> Build complete: {}", cli.output.display());
        }
        Command::Load { page, cache } => {
            let site_config = config::load_config(&cli.source)?;
            init_tracing(cli.verbose || site_config.debug);
            init_thread_pool(&site_config.processing);

            // stdout carries the page; progress goes through tracing only.
            let (tx, printer) = spawn_printer(false);
            let loader = build_loader(&cli, &site_config, cache.no_cache)?.with_events(tx);
            let (html, _) = site::assemble_file(&loader, page)?;
            drop(loader);
            join_printer(printer);

            print!("{}", html);
        }
        Command::ClearCache => {
            let site_config = config::load_config(&cli.source)?;
            init_tracing(cli.verbose || site_config.debug);

            let store = storage::store_path(&cli.cache_dir);
            let existed = store.exists();
            if existed {
                PersistentCache::new(
                    Arc::new(FileStorage::open(&cli.cache_dir)),
                    site_config.cache.prefix.clone(),
                    site_config.cache.duration(),
                    Arc::new(SystemClock),
                )
                .clear();
            }
            output::print_clear_cache_output(&store, existed);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Install the fmt subscriber on stderr. `DEBUG` when verbose, `INFO` otherwise.
fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// `max_processes` can lower the thread count below the core count, never raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

fn fragment_source(
    site_root: &Path,
    site_config: &SiteConfig,
) -> Result<Arc<dyn FragmentSource>, Box<dyn std::error::Error>> {
    let source: Arc<dyn FragmentSource> = match &site_config.components.base_url {
        Some(url) => Arc::new(HttpSource::new(url.as_str())?),
        None => Arc::new(DirSource::new(site_root)),
    };
    Ok(source)
}

fn build_loader(
    cli: &Cli,
    site_config: &SiteConfig,
    no_cache: bool,
) -> Result<ComponentLoader, Box<dyn std::error::Error>> {
    let loader = ComponentLoader::new(fragment_source(&cli.source, site_config)?, site_config);
    if no_cache {
        return Ok(loader);
    }
    Ok(loader.with_storage(Arc::new(FileStorage::open(&cli.cache_dir))))
}

/// Drain loader events on a separate thread, printing them when `show` is set.
fn spawn_printer(show: bool) -> (mpsc::Sender<LoaderEvent>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel::<LoaderEvent>();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if show {
                output::print_loader_event(&event);
            }
        }
    });
    (tx, printer)
}

fn join_printer(printer: JoinHandle<()>) {
    if printer.join().is_err() {
        tracing::warn!("event printer thread panicked");
    }
}
