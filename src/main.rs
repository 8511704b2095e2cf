//! Shape Evolve CLI - Approximate a target image with evolved shapes.

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use shape_evolve::{
    compute::{
        Canvas,
        evolution::{EvolutionEngine, PngSnapshotWriter},
    },
    schema::{EvolutionConfig, EvolutionPhase},
};

fn main() {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() > 1 && args[1] == "--example" {
        print_example_config();
        return;
    }

    if args.len() < 2 {
        eprintln!("Usage: {} <target-image> [config.json]", args[0]);
        eprintln!();
        eprintln!("Evolve a population of shape genomes toward a target image.");
        eprintln!();
        eprintln!("Arguments:");
        eprintln!("  target-image  Image to approximate (PNG or JPEG)");
        eprintln!("  config.json   Evolution configuration (default settings if omitted)");
        eprintln!();
        eprintln!("Example configuration is generated with --example flag.");
        std::process::exit(1);
    }

    let target_path = PathBuf::from(&args[1]);

    // Load configuration
    let config: EvolutionConfig = match args.get(2) {
        Some(path) => {
            let config_str = fs::read_to_string(path).unwrap_or_else(|e| {
                eprintln!("Error reading config file: {}", e);
                std::process::exit(1);
            });
            serde_json::from_str(&config_str).unwrap_or_else(|e| {
                eprintln!("Error parsing config: {}", e);
                std::process::exit(1);
            })
        }
        None => EvolutionConfig::default(),
    };

    let target = Canvas::load(&target_path).unwrap_or_else(|e| {
        eprintln!("Error loading target image: {}", e);
        std::process::exit(1);
    });

    let mut sink = PngSnapshotWriter::from_config(&config.snapshot).unwrap_or_else(|e| {
        eprintln!("Error preparing output directory: {}", e);
        std::process::exit(1);
    });

    println!("Shape Evolve");
    println!("============");
    println!(
        "Target: {} ({}x{})",
        target_path.display(),
        target.width(),
        target.height()
    );
    println!(
        "Population: {} genomes x {} {:?} genes",
        config.population.size, config.genome.gene_count, config.genome.primitive
    );
    println!("Generations: {}", config.population.max_generations);
    println!("Mutation rate: {}", config.reproduction.mutation_rate);
    println!("Snapshots: {:?} -> {}", config.snapshot.policy, config.snapshot.output_dir);
    println!();

    let total = config.population.max_generations;
    let mut engine = EvolutionEngine::new(config, target).unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    println!("Running evolution...");
    let start = Instant::now();

    let result = engine.run_with_callback(
        |progress| {
            // Print progress every 10%
            let g = progress.generation;
            if g > 0
                && progress.phase != EvolutionPhase::Done
                && g % (total / 10).max(1) == 0
            {
                let elapsed = start.elapsed().as_secs_f64();
                println!(
                    "  Generation {}/{}: best={:.6}, gen_best={:.6}, avg={:.6}, {:.1} gen/s",
                    g,
                    total,
                    progress.best_fitness,
                    progress.generation_best,
                    progress.avg_fitness,
                    g as f64 / elapsed
                );
            }
        },
        &mut sink,
    );

    let result = result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    let stats = &result.stats;
    println!();
    println!("Finished: {:?}", stats.stop_reason);
    println!("  Generations: {}", stats.generations);
    println!("  Best fitness: {:.6}", stats.best_fitness);
    println!("  Final average: {:.6}", stats.final_avg_fitness);
    println!("  Snapshots written: {}", stats.snapshots_written);
    println!(
        "Time: {:.2}s ({:.1} evaluations/s)",
        stats.elapsed_seconds, stats.evaluations_per_second
    );
}

fn print_example_config() {
    let config = EvolutionConfig::default();

    println!("Example configuration (config.json):");
    match serde_json::to_string_pretty(&config) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing config: {}", e);
            std::process::exit(1);
        }
    }
}
