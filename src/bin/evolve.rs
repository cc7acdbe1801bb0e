use clap::Parser;
use melodyevolver::evolution::INITIAL_GENERATION;
use melodyevolver::{Evolution, GenerationStore, Key, MelodyId, MemoryStore, Settings};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::path::PathBuf;

/// Evolves a population of melodies and prints the final generation as JSON.
#[derive(Parser, Debug)]
#[command(name = "evolve")]
#[command(about = "Melody evolution from the command line")]
struct Args {
    /// Settings file with key, sweet spots and mutation probabilities
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Overrides the key from the settings, e.g. "CSharpMinor" or "D Major"
    #[arg(long)]
    key: Option<Key>,

    /// Random seed, for repeatable runs
    #[arg(long)]
    seed: Option<u64>,

    /// Size of the first generation
    #[arg(long, default_value = "10")]
    population: usize,

    /// Melody ids of the first generation to breed from by hand
    #[arg(long, value_delimiter = ',')]
    select: Vec<MelodyId>,

    /// Generations to fast-forward by rating alone
    #[arg(long, default_value = "0")]
    skip: usize,

    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };
    if let Some(key) = args.key {
        settings.key = key;
    }
    log::info!("evolving in {}", settings.key);

    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut evolution = Evolution::from_settings(MemoryStore::new(), rng, &settings);

    let mut generation = evolution.seed(args.population)?;
    if !args.select.is_empty() {
        for id in args.select.iter() {
            evolution.store_mut().select(INITIAL_GENERATION, *id)?;
        }
        generation = evolution.step_selected(generation)?;
    }
    generation = evolution.fast_forward(generation, args.skip)?;

    let store = evolution.store();
    let report = serde_json::json!({
        "generation": generation,
        "melodies": store.melodies(generation),
        "ratings": store.ratings(generation),
    });
    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
