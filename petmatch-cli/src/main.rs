use clap::{Parser, Subcommand};
use petmatch_core::attributes::{PetRecord, PetStatus, Size};
use petmatch_core::{config::Config, PetMatcher};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "petmatch")]
#[command(about = "Lost and found pet matching", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of the default search chain
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a pet report
    Add {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        color: Option<String>,
        /// small, medium or large
        #[arg(long)]
        size: Option<Size>,
        #[arg(long)]
        age: Option<f64>,
        #[arg(long)]
        gender: Option<String>,
        /// lost, found or reunited
        #[arg(long, default_value = "lost")]
        status: PetStatus,
        #[arg(long)]
        description: Option<String>,
        /// Photo of the pet
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Attach or replace the photo of a registered pet
    Attach {
        pet_id: String,
        image: PathBuf,
    },
    /// Remove a pet report
    Remove {
        pet_id: String,
    },
    /// List registered pets
    List,
    /// Print the descriptor computed for an image
    Describe {
        image: PathBuf,
    },
    /// Find pets whose photo is similar to an image
    Search {
        image: PathBuf,
        /// Minimum similarity (0.0 - 1.0)
        #[arg(short, long)]
        threshold: Option<f64>,
        /// Maximum number of results
        #[arg(short, long)]
        limit: Option<usize>,
        /// Print the response as JSON
        #[arg(long)]
        json: bool,
    },
    /// Find pets with similar attributes to a registered pet
    Similar {
        pet_id: String,
        #[arg(short, long)]
        threshold: Option<f64>,
        #[arg(short, long)]
        limit: Option<usize>,
        #[arg(long)]
        json: bool,
    },
    /// Compare two registered pets factor by factor
    Compare {
        first: String,
        second: String,
    },
    /// Show configuration
    Config {
        /// Validate configuration
        #[arg(long)]
        validate: bool,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logger
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .init();

    let config = match &cli.config {
        Some(path) => Config::load_file(path)?,
        None => Config::load()?,
    };
    log::debug!("Using database at {}", config.storage.database_path.display());

    match cli.command {
        Commands::Add {
            name,
            species,
            breed,
            color,
            size,
            age,
            gender,
            status,
            description,
            image,
        } => {
            let record = PetRecord {
                name,
                species,
                breed,
                color,
                size,
                age,
                gender,
                status,
                description,
                ..PetRecord::new("")
            };
            cmd_add(config, record, image)
        }
        Commands::Attach { pet_id, image } => cmd_attach(config, pet_id, image),
        Commands::Remove { pet_id } => cmd_remove(config, pet_id),
        Commands::List => cmd_list(config),
        Commands::Describe { image } => cmd_describe(config, image),
        Commands::Search { image, threshold, limit, json } => {
            cmd_search(config, image, threshold, limit, json)
        }
        Commands::Similar { pet_id, threshold, limit, json } => {
            cmd_similar(config, pet_id, threshold, limit, json)
        }
        Commands::Compare { first, second } => cmd_compare(config, first, second),
        Commands::Config { validate } => cmd_config(config, validate),
    }
}

fn cmd_add(config: Config, record: PetRecord, image: Option<PathBuf>) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;

    let bytes = image.as_ref().map(std::fs::read).transpose()?;
    let saved = matcher.add_pet(record, bytes.as_deref())?;

    println!("✓ Pet registered: {}", saved.id);
    if saved.image_features.is_some() {
        println!("Photo descriptor stored");
    }

    Ok(())
}

fn cmd_attach(config: Config, pet_id: String, image: PathBuf) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let bytes = std::fs::read(&image)?;

    matcher.attach_image(&pet_id, &bytes)?;

    println!("✓ Photo attached to {}", pet_id);
    Ok(())
}

fn cmd_remove(config: Config, pet_id: String) -> anyhow::Result<()> {
    println!("Removing pet {}", pet_id);

    let matcher = PetMatcher::new(config)?;
    matcher.store().remove_pet(&pet_id)?;

    println!("✓ Pet removed successfully");
    Ok(())
}

fn cmd_list(config: Config) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let pets = matcher.store().list_pets()?;

    if pets.is_empty() {
        println!("No pets registered");
        return Ok(());
    }

    println!(
        "{:<10} {:<10} {:<15} {:<18} {:<12} {:<6} {}",
        "Pet ID", "Status", "Name", "Breed", "Color", "Photo", "Reported At"
    );
    println!("{}", "-".repeat(95));

    for pet in pets {
        let dash = || "—".to_string();
        println!(
            "{:<10} {:<10} {:<15} {:<18} {:<12} {:<6} {}",
            pet.id,
            pet.status,
            pet.name.unwrap_or_else(dash),
            pet.breed.unwrap_or_else(dash),
            pet.color.unwrap_or_else(dash),
            if pet.image_features.is_some() { "yes" } else { "no" },
            pet.created_at.format("%Y-%m-%d %H:%M:%S")
        );
    }

    Ok(())
}

fn cmd_describe(config: Config, image: PathBuf) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let bytes = std::fs::read(&image)?;
    let descriptor = matcher.describe_image(&bytes)?;

    println!("texture_features = {:?}", descriptor.texture_features.to_vec());
    println!("shape_features = {:?}", descriptor.shape_features.to_vec());
    println!("dominant_colors = {:?}", descriptor.dominant_colors);
    println!(
        "color_histogram = {} bins, sum {:.6}",
        descriptor.color_histogram.len(),
        descriptor.color_histogram.sum()
    );

    Ok(())
}

fn print_results(response: &petmatch_core::response::SearchResponse, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", response.to_json_pretty()?);
        return Ok(());
    }

    if response.is_empty() {
        println!("No similar pets found (threshold {})", response.threshold);
        return Ok(());
    }

    println!("{:<10} {}", "Pet ID", "Score");
    println!("{}", "-".repeat(20));
    for result in &response.results {
        println!("{:<10} {:.2}", result.id, result.score);
    }
    if response.skipped > 0 {
        println!("\n{} candidate(s) could not be scored", response.skipped);
    }

    Ok(())
}

fn cmd_search(
    config: Config,
    image: PathBuf,
    threshold: Option<f64>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let params = matcher.search_params(threshold, limit)?;
    let bytes = std::fs::read(&image)?;

    let response = matcher.search_by_image(&bytes, params)?;
    print_results(&response, json)
}

fn cmd_similar(
    config: Config,
    pet_id: String,
    threshold: Option<f64>,
    limit: Option<usize>,
    json: bool,
) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let params = matcher.search_params(threshold, limit)?;

    let response = matcher.find_similar_pets(&pet_id, params)?;
    print_results(&response, json)
}

fn cmd_compare(config: Config, first: String, second: String) -> anyhow::Result<()> {
    let matcher = PetMatcher::new(config)?;
    let breakdown = matcher.compare_pets(&first, &second)?;

    println!("Comparing {} and {}:", first, second);
    println!();
    for (factor, contribution) in breakdown.factors() {
        match contribution {
            Some(value) => println!("  {:<8} +{:.2}", factor, value),
            None => println!("  {:<8} not comparable", factor),
        }
    }
    println!();
    println!("Total: {:.2}", breakdown.total());

    Ok(())
}

fn cmd_config(config: Config, validate: bool) -> anyhow::Result<()> {
    if validate {
        config.validate()?;
        println!("✓ Configuration is valid");
        return Ok(());
    }

    println!("Configuration:");
    println!();

    println!("[search]");
    println!("  threshold = {}", config.search.threshold);
    println!("  limit = {}", config.search.limit);
    println!("  max_limit = {}", config.search.max_limit);
    println!("  candidate_cap = {}", config.search.candidate_cap);
    println!();

    println!("[extraction]");
    println!("  default_width = {}", config.extraction.default_width);
    println!("  default_height = {}", config.extraction.default_height);
    println!("  default_channels = {}", config.extraction.default_channels);
    println!();

    println!("[storage]");
    println!("  database_path = {:?}", config.storage.database_path);

    Ok(())
}
