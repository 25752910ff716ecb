use std::io::BufRead;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod config;
mod convert;
mod error;
mod history;
mod loader;
mod models;
mod normalize;
mod query;
mod report;
mod stats;

use config::Config;
use error::{LoadError, SearchError};
use history::RecentSearches;
use loader::{DataSource, Dataset, DatasetCache, WilayaNames};
use models::Lang;
use query::{SearchCriteria, SearchOutcome, SearchRequest};

#[derive(Parser)]
#[command(name = "bac-results")]
#[command(about = "Baccalaureate results lookup and statistics", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to .bac-results.toml when present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Results file path or http(s) URL
    #[arg(long, global = true, value_name = "LOCATION")]
    results: Option<String>,

    /// Display language
    #[arg(long, global = true, value_enum)]
    lang: Option<Lang>,

    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a spreadsheet or CSV export into the results file
    Convert {
        #[arg(long)]
        input: PathBuf,
        #[arg(long, default_value = "public/results.json")]
        out: PathBuf,
        /// Field separator for CSV input
        #[arg(long)]
        delimiter: Option<char>,
    },
    /// Compute the statistics file from the results file
    Stats {
        #[arg(long, default_value = "public/stats.json")]
        out: PathBuf,
    },
    /// Look up a candidate by registration number
    Lookup {
        number: String,
        /// Show only the first record with this number
        #[arg(long)]
        first: bool,
    },
    /// Search candidates by one or more criteria
    Search {
        #[arg(long)]
        number: Option<String>,
        /// Part of the Latin-script full name, any case
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        center: Option<String>,
        #[arg(long)]
        wilaya: Option<String>,
        #[arg(long)]
        birth_year: Option<String>,
        #[arg(long)]
        school: Option<String>,
        /// Series code, e.g. SN
        #[arg(long)]
        series: Option<String>,
    },
    /// Read candidate numbers from stdin and look each one up
    Interactive,
    /// List the values offered for a search field
    Values {
        #[arg(value_enum)]
        field: ValueField,
    },
    /// Render the statistics file as a Markdown report
    Report {
        /// Statistics file path or http(s) URL
        #[arg(long)]
        stats: Option<String>,
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Show recent candidate-number searches
    History,
    /// Write a default configuration file
    InitConfig,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ValueField {
    Wilayas,
    Centers,
    Series,
    Schools,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    let config = load_config(cli.config.as_deref())?;
    let lang = cli.lang.unwrap_or(config.display.lang);

    if let Err(err) = run(cli, config, lang).await {
        error!("{err:#}");
        if err.downcast_ref::<LoadError>().is_some() {
            eprintln!("{}", lang.load_failed());
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.quiet {
        tracing::Level::ERROR
    } else if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.to_string()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")
}

fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    if let Some(path) = path {
        info!("Loading config from {}", path.display());
        return Config::load(path);
    }

    match Config::load_default()? {
        Some(config) => {
            debug!("Loaded {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => Ok(Config::default()),
    }
}

async fn run(cli: Cli, config: Config, lang: Lang) -> anyhow::Result<()> {
    let results = DataSource::parse(cli.results.as_deref().unwrap_or(&config.data.results));

    match cli.command {
        Commands::Convert {
            input,
            out,
            delimiter,
        } => {
            let mut options = config.convert.options()?;
            if let Some(delimiter) = delimiter {
                options.delimiter =
                    u8::try_from(delimiter).context("--delimiter must be a single-byte character")?;
            }
            let count = convert::convert_file(&input, &out, &options)?;
            println!("Converted {count} records into {}.", out.display());
        }
        Commands::Stats { out } => {
            let records = loader::load_records(&results).await?;
            let summary = stats::compute_summary(&records);
            let json = serde_json::to_string_pretty(&summary)?;
            std::fs::write(&out, json)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!(
                "Statistics for {} candidates written to {}.",
                summary.global.total,
                out.display()
            );
        }
        Commands::Lookup { number, first } => {
            let cache = DatasetCache::new(results);
            let dataset = cache.get().await?;

            if first {
                match dataset.find_by_identifier(&number) {
                    Some(record) => print!("{}", report::render_card(record, lang)),
                    None => println!("{}", lang.no_results()),
                }
            } else {
                let mut recent = RecentSearches::load(&config.data.history);
                lookup_number(&dataset, &number, &mut recent, &config.data.history, lang);
            }
        }
        Commands::Search {
            number,
            name,
            center,
            wilaya,
            birth_year,
            school,
            series,
        } => {
            let request = SearchRequest {
                candidate_number: None,
                criteria: SearchCriteria {
                    identifier: number,
                    full_name: name,
                    exam_center: center,
                    wilaya,
                    birth_year,
                    school,
                    series,
                },
            };

            // Refuse a blank query before paying for the load.
            if request.criteria.is_blank() {
                println!("{}", lang.empty_query());
                return Ok(());
            }

            let dataset = DatasetCache::new(results).get().await?;
            print_outcome(query::search(dataset.records(), &request), lang);
        }
        Commands::Interactive => {
            let cache = DatasetCache::new(results);
            let mut recent = RecentSearches::load(&config.data.history);
            info!("Reading candidate numbers from {} (one per line)", cache.source());

            for line in std::io::stdin().lock().lines() {
                let line = line.context("failed to read stdin")?;
                lookup_with_cache(&cache, &line, &mut recent, &config.data.history, lang).await;
                println!();
            }
        }
        Commands::Values { field } => {
            let dataset = DatasetCache::new(results).get().await?;
            let values = match field {
                ValueField::Wilayas => dataset.distinct_wilayas(),
                ValueField::Centers => dataset.distinct_centers(),
                ValueField::Series => dataset.distinct_series(),
                ValueField::Schools => dataset.distinct_schools(),
            };
            for value in values {
                println!("{value}");
            }
        }
        Commands::Report { stats, out } => {
            let stats_source = DataSource::parse(stats.as_deref().unwrap_or(&config.data.stats));
            let summary = loader::load_summary(&stats_source).await?;

            let names = match loader::load_dataset(&results).await {
                Ok(dataset) => WilayaNames::from_dataset(&dataset),
                Err(err) => {
                    warn!("Wilaya names unavailable, showing raw keys: {err}");
                    WilayaNames::default()
                }
            };

            let markdown = report::build_stats_report(&summary, &names, lang);
            match out {
                Some(path) => {
                    std::fs::write(&path, markdown)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    println!("Report written to {}.", path.display());
                }
                None => print!("{markdown}"),
            }
        }
        Commands::History => {
            let recent = RecentSearches::load(&config.data.history);
            if recent.entries().is_empty() {
                println!("No recent searches.");
            }
            for number in recent.entries() {
                println!("{number}");
            }
        }
        Commands::InitConfig => {
            let path = Path::new(config::DEFAULT_CONFIG_FILE);
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            std::fs::write(path, Config::default_toml())
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("Created {}.", path.display());
        }
    }

    Ok(())
}

/// One interactive lookup. A failed load is reported and left for the
/// next line to retry.
async fn lookup_with_cache(
    cache: &DatasetCache,
    number: &str,
    recent: &mut RecentSearches,
    history_path: &Path,
    lang: Lang,
) -> bool {
    match cache.get().await {
        Ok(dataset) => {
            lookup_number(&dataset, number, recent, history_path, lang);
            true
        }
        Err(err) => {
            error!("{err}");
            println!("{}", lang.load_failed());
            false
        }
    }
}

/// The simple search path: gate, search, remember the number.
fn lookup_number(
    dataset: &Dataset,
    number: &str,
    recent: &mut RecentSearches,
    history_path: &Path,
    lang: Lang,
) {
    let request = SearchRequest {
        candidate_number: Some(number.to_string()),
        criteria: SearchCriteria::default(),
    };
    print_outcome(query::search(dataset.records(), &request), lang);

    if let Some(number) = request.simple_number() {
        recent.record(number);
        if let Err(err) = recent.save(history_path) {
            warn!("{err:#}");
        }
    }
}

fn print_outcome(outcome: Result<SearchOutcome<'_>, SearchError>, lang: Lang) {
    match outcome {
        Ok(SearchOutcome::Single(record)) => print!("{}", report::render_card(record, lang)),
        Ok(SearchOutcome::Multiple(records)) => {
            print!("{}", report::render_matches(&records, lang))
        }
        Err(SearchError::NoMatch) => println!("{}", lang.no_results()),
        Err(SearchError::EmptyQuery) => println!("{}", lang.empty_query()),
    }
}
