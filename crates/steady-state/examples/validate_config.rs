use std::env;
use std::path::PathBuf;
use steady_state::config::Config;

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let config_path = if args.len() > 1 {
        PathBuf::from(&args[1])
    } else {
        PathBuf::from("crates/steady-state/configs/warmup.toml")
    };

    println!("Validating config file: {}", config_path.display());

    let config = Config::from_file(&config_path)?;

    println!("\n✓ Successfully parsed configuration!");

    println!("\nOutliers:");
    println!("  Window size: {}", config.outliers.window_size);
    println!("  Common threshold: {}", config.outliers.threshold);

    println!("\nChangepoints:");
    println!("  Penalty: {} log n", config.changepoints.penalty_multiplier);

    println!("\nClassification:");
    println!("  Delta: {}", config.classification.delta);
    println!("  Steady-state window: {}", config.classification.steady_state_window);

    println!("\nBootstrap:");
    println!("  Confidence: {}", config.bootstrap.confidence);
    println!("  Quality: {}", config.bootstrap.quality);
    match config.bootstrap.seed {
        Some(seed) => println!("  Seed: {}", seed),
        None => println!("  Seed: (entropy)"),
    }

    println!("\n✓ All validations passed!");

    Ok(())
}
