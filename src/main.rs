use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grimoire::bundle::{BundleReader, DirectoryBundle, EmbeddedBundle};
use grimoire::cache::CacheGateway;
use grimoire::config::EngineConfig;
use grimoire::db::Database;
use grimoire::filter::FilterCriteria;
use grimoire::loader::CollectionLoader;
use grimoire::models::*;
use grimoire::store::{FilteredStore, StoreOptions};

#[derive(Parser)]
#[command(name = "grim")]
#[command(about = "Search spells, feats and backgrounds. Filters persist between runs.")]
struct Cli {
    /// Cache database file (overrides config and GRIMOIRE_CACHE_PATH; saved by `config set`)
    #[arg(long, global = true)]
    cache: Option<PathBuf>,

    /// Directory of <dataset>.json files to use instead of the embedded data
    /// (saved by `config set`)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Browse spells. Selection flags toggle values in the saved filter.
    Spells {
        #[command(flatten)]
        common: CommonArgs,

        /// Toggle a spell level (0 for cantrips)
        #[arg(long)]
        level: Vec<i32>,

        /// Toggle a school of magic
        #[arg(long)]
        school: Vec<String>,

        /// Toggle a class
        #[arg(long = "class")]
        class: Vec<String>,

        /// Toggle "rituals only"
        #[arg(long)]
        ritual: bool,

        /// Toggle "concentration only"
        #[arg(long)]
        concentration: bool,
    },
    /// Browse feats. Selection flags toggle values in the saved filter.
    Feats {
        #[command(flatten)]
        common: CommonArgs,

        /// Toggle a feat category
        #[arg(long)]
        category: Vec<String>,

        /// Toggle "repeatable only"
        #[arg(long)]
        repeatable: bool,
    },
    /// Browse backgrounds. Selection flags toggle values in the saved filter.
    Backgrounds {
        #[command(flatten)]
        common: CommonArgs,

        /// Toggle a skill proficiency
        #[arg(long)]
        skill: Vec<String>,

        /// Toggle a source book
        #[arg(long)]
        source: Vec<String>,
    },
    /// List the values available for filtering a domain
    Facets {
        #[arg(value_enum)]
        domain: DomainArg,
    },
    /// Inspect or reset the cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
    /// Show or change the saved configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Set the search text (an empty string clears it)
    #[arg(short, long)]
    search: Option<String>,

    /// Reset the saved filter before applying other flags
    #[arg(long)]
    clear: bool,

    /// Re-read the dataset instead of using the cached copy
    #[arg(long)]
    reload: bool,
}

#[derive(Subcommand)]
enum CacheAction {
    /// List cached collections and filters
    Status,
    /// Remove everything from the cache
    Clear,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (file plus environment)
    Show,
    /// Update the config file. `--cache` and `--data-dir` are saved as the
    /// new defaults when given.
    Set {
        /// Collection size at which filtering moves to a worker thread
        #[arg(long)]
        offload_threshold: Option<usize>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DomainArg {
    Spells,
    Feats,
    Backgrounds,
}

/// Initialize tracing on stderr so stdout only carries results
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "grimoire=info".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

struct Engine {
    cache: CacheGateway,
    loader: CollectionLoader,
    options: StoreOptions,
}

impl Engine {
    /// Open the engine. Browsing tolerates a broken cache and falls back to
    /// an in-memory one; `require_cache` makes cache failures fatal instead.
    fn open(cli: &Cli, require_cache: bool) -> anyhow::Result<Self> {
        let config = EngineConfig::load();

        let cache_path = match cli.cache.clone().or(config.cache_path.clone()) {
            Some(path) => Some(path),
            None => match Database::default_path() {
                Ok(path) => Some(path),
                Err(e) if !require_cache => {
                    tracing::warn!("No cache location, using an in-memory cache: {:#}", e);
                    None
                }
                Err(e) => return Err(e),
            },
        };
        let cache = match cache_path {
            Some(path) if require_cache => {
                CacheGateway::new(Arc::new(Database::open_migrated(path)?))
            }
            Some(path) => grimoire::db::open_cache(path),
            None => CacheGateway::memory(),
        };

        let bundle: Arc<dyn BundleReader> = match cli.data_dir.clone().or(config.data_dir.clone()) {
            Some(dir) => Arc::new(DirectoryBundle::new(dir)),
            None => Arc::new(EmbeddedBundle),
        };

        Ok(Self {
            loader: CollectionLoader::new(cache.clone(), bundle),
            cache,
            options: config.store_options(),
        })
    }

    async fn store<E: Entity>(&self, reload: bool) -> FilteredStore<E> {
        let mut store = FilteredStore::new(self.cache.clone(), self.options);
        if reload {
            store.reload(&self.loader).await;
        } else {
            store.load(&self.loader).await;
        }
        store
    }
}

fn apply_common<E: Entity>(store: &mut FilteredStore<E>, common: &CommonArgs) {
    if common.clear {
        store.clear();
    }
    if let Some(text) = &common.search {
        store.update_search_text(text.clone());
    }
}

fn print_summary<E: Entity>(store: &FilteredStore<E>) {
    let mut summary = format!(
        "{} of {} {}",
        store.filtered().len(),
        store.collection().len(),
        E::DOMAIN
    );
    if store.is_filtering() {
        summary.push_str(" (filtered");
        if !store.criteria().search_text().is_empty() {
            summary.push_str(&format!(", search \"{}\"", store.criteria().search_text()));
        }
        summary.push(')');
    }
    println!("{}", summary);
}

fn spell_line(spell: &Spell) -> String {
    let level = match spell.level {
        0 => "cantrip".to_string(),
        n => format!("level {}", n),
    };
    let mut tags = Vec::new();
    if spell.ritual {
        tags.push("ritual");
    }
    if spell.concentration {
        tags.push("concentration");
    }
    let tags = if tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", tags.join(", "))
    };
    format!(
        "{:<28} {:<8} {:<13} {}{}",
        spell.name,
        level,
        spell.school.label(),
        spell.classes.join(", "),
        tags
    )
}

fn feat_line(feat: &Feat) -> String {
    let prerequisite = feat
        .prerequisite
        .as_deref()
        .map(|p| format!(" (requires {})", p))
        .unwrap_or_default();
    let repeatable = if feat.repeatable { " [repeatable]" } else { "" };
    format!(
        "{:<24} {:<15}{}{}",
        feat.name, feat.category, prerequisite, repeatable
    )
}

fn background_line(background: &Background) -> String {
    format!(
        "{:<16} {:<6} {}",
        background.name,
        background.source,
        background.skill_proficiencies.join(", ")
    )
}

fn run_config(cli: &Cli, action: &ConfigAction) -> anyhow::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("{}", serde_json::to_string_pretty(&EngineConfig::load())?);
        }
        ConfigAction::Set { offload_threshold } => {
            let mut config = EngineConfig::load_file()?;
            if let Some(threshold) = offload_threshold {
                config.offload_threshold = *threshold;
            }
            if let Some(path) = &cli.cache {
                config.cache_path = Some(path.clone());
            }
            if let Some(dir) = &cli.data_dir {
                config.data_dir = Some(dir.clone());
            }
            config.save()?;
            tracing::info!("Configuration saved");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    // Config must stay usable when the configured cache path is broken.
    if let Commands::Config { action } = &cli.command {
        return run_config(&cli, action);
    }

    let require_cache = matches!(cli.command, Commands::Cache { .. });
    let engine = Engine::open(&cli, require_cache)?;

    match &cli.command {
        Commands::Spells {
            common,
            level,
            school,
            class,
            ritual,
            concentration,
        } => {
            let schools = school
                .iter()
                .map(|s| {
                    SpellSchool::from_str(s).ok_or_else(|| anyhow::anyhow!("Unknown school: {}", s))
                })
                .collect::<anyhow::Result<Vec<_>>>()?;

            let mut store = engine.store::<Spell>(common.reload).await;
            apply_common(&mut store, common);
            for level in level {
                store.toggle_level(*level);
            }
            for school in schools {
                store.toggle_school(school);
            }
            for class in class {
                store.toggle_class(class.clone());
            }
            if *ritual {
                store.toggle_ritual_only();
            }
            if *concentration {
                store.toggle_concentration_only();
            }
            store.settle().await;

            for spell in store.filtered() {
                println!("{}", spell_line(spell));
            }
            print_summary(&store);
        }
        Commands::Feats {
            common,
            category,
            repeatable,
        } => {
            let mut store = engine.store::<Feat>(common.reload).await;
            apply_common(&mut store, common);
            for category in category {
                store.toggle_category(category.clone());
            }
            if *repeatable {
                store.toggle_repeatable_only();
            }
            store.settle().await;

            for feat in store.filtered() {
                println!("{}", feat_line(feat));
            }
            print_summary(&store);
        }
        Commands::Backgrounds {
            common,
            skill,
            source,
        } => {
            let mut store = engine.store::<Background>(common.reload).await;
            apply_common(&mut store, common);
            for skill in skill {
                store.toggle_skill(skill.clone());
            }
            for source in source {
                store.toggle_source(source.clone());
            }
            store.settle().await;

            for background in store.filtered() {
                println!("{}", background_line(background));
            }
            print_summary(&store);
        }
        Commands::Facets { domain } => match domain {
            DomainArg::Spells => {
                let store = engine.store::<Spell>(false).await;
                let facets = store.facets();
                let levels: Vec<String> = facets.levels.iter().map(|l| l.to_string()).collect();
                let schools: Vec<&str> = facets.schools.iter().map(|s| s.label()).collect();
                println!("levels:  {}", levels.join(", "));
                println!("schools: {}", schools.join(", "));
                println!("classes: {}", facets.classes.join(", "));
            }
            DomainArg::Feats => {
                let store = engine.store::<Feat>(false).await;
                println!("categories: {}", store.facets().categories.join(", "));
            }
            DomainArg::Backgrounds => {
                let store = engine.store::<Background>(false).await;
                println!("skills:  {}", store.facets().skills.join(", "));
                println!("sources: {}", store.facets().sources.join(", "));
            }
        },
        Commands::Cache { action } => match action {
            CacheAction::Status => {
                let entries = engine.cache.entries()?;
                if entries.is_empty() {
                    println!("Cache is empty");
                }
                for entry in entries {
                    let count = entry
                        .count
                        .map(|n| format!("{} entries", n))
                        .unwrap_or_default();
                    println!(
                        "{:<10} {:<12} {:>8} bytes  {:<12} {}",
                        entry.kind.as_str(),
                        entry.key,
                        entry.bytes,
                        count,
                        entry.stored_at.format("%Y-%m-%d %H:%M:%S")
                    );
                }
            }
            CacheAction::Clear => {
                engine.cache.clear()?;
                println!("Cache cleared");
            }
        },
        Commands::Config { action } => run_config(&cli, action)?,
    }

    Ok(())
}
