use anyhow::{Context, Result};
use chexpert_prep::init_logging;
use chexpert_prep::stats::{compute_stats, list_images};
use clap::{command, value_parser, Arg, ArgAction};
use std::fs;
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging();

    let matches = command!()
        .about("Grayscale mean/std of a directory of preprocessed images")
        .args([
            Arg::new("dir")
                .long("dir")
                .value_parser(value_parser!(PathBuf))
                .required(true)
                .help("Flat directory produced by chexpert-prep"),
            Arg::new("output")
                .long("output")
                .value_parser(value_parser!(PathBuf))
                .default_value("normalization_stats.json")
                .help("Where to write the statistics"),
            Arg::new("ext")
                .long("ext")
                .action(ArgAction::Append)
                .help("Image extension to include, repeatable (default: png)"),
        ])
        .get_matches();

    let dir = matches.get_one::<PathBuf>("dir").context("--dir is required")?;
    let output = matches
        .get_one::<PathBuf>("output")
        .context("--output is required")?;
    let extensions: Vec<String> = match matches.get_many::<String>("ext") {
        Some(exts) => exts.map(|e| e.trim_start_matches('.').to_string()).collect(),
        None => vec!["png".to_string()],
    };

    println!("Loading images from {:?}...", dir);
    let paths = list_images(dir, &extensions)?;
    let stats = compute_stats(&paths)?;

    let json = serde_json::to_string_pretty(&stats)?;
    fs::write(output, json).with_context(|| format!("failed to write {}", output.display()))?;

    println!("Statistics saved to {}", output.display());
    println!("Mean: {:?}", stats.mean);
    println!("Std: {:?}", stats.std);
    Ok(())
}
