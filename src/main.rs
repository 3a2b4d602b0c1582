use anyhow::{Context, Result};
use burn::config::Config;
use chexpert_prep::{
    init_logging, plan, run, ExecutionTarget, OutputFormat, PreprocessConfig, ResizeFilter,
    TargetSize,
};
use clap::parser::ValueSource;
use clap::{command, value_parser, Arg, ArgAction, ArgMatches, Command};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

fn main() -> Result<()> {
    init_logging();

    let matches = cli().get_matches();
    let config = build_config(&matches)?;

    if let Some(path) = matches.get_one::<PathBuf>("save_config") {
        config
            .save(path)
            .with_context(|| format!("failed to save config to {}", path.display()))?;
        println!("Saved config to {}", path.display());
    }

    if matches.get_flag("dry_run") {
        config.validate()?;
        let plan = plan(&config)?;
        for item in &plan.items {
            println!("{} -> {}", item.source.display(), item.output.display());
        }
        println!(
            "\n{} images planned, {} name collision(s)",
            plan.items.len(),
            plan.collisions
        );
        return Ok(());
    }

    let progress = if matches.get_flag("quiet") {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})",
            )?
            .progress_chars("#>-"),
        );
        pb
    };

    let report = run(&config, &progress)?;
    println!(
        "\nDone: {report} images written to {}",
        config.output_dir.display()
    );
    Ok(())
}

fn cli() -> Command {
    command!()
        .about("Resize a CheXpert-style image tree into a flat directory of grayscale images")
        .next_help_heading("PREPROCESS OPTIONS")
        .args([
            Arg::new("in_dir")
                .long("in-dir")
                .visible_alias("in_dir")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("config")
                .help("Root of the raw image tree, e.g. chexpert_raw/train"),
            Arg::new("out_dir")
                .long("out-dir")
                .visible_alias("out_dir")
                .value_parser(value_parser!(PathBuf))
                .required_unless_present("config")
                .help("Flat output directory for resized images"),
            Arg::new("size")
                .long("size")
                .value_parser(parse_size)
                .default_value("224x224")
                .help("Target resolution, WxH or a single side"),
            Arg::new("workers")
                .long("workers")
                .short('j')
                .value_parser(value_parser!(usize))
                .default_value("1")
                .help("Worker threads, 1 runs sequentially"),
            Arg::new("gpu")
                .long("gpu")
                .action(ArgAction::SetTrue)
                .help("Resize on the GPU (fails if no adapter is present)"),
            Arg::new("filter")
                .long("filter")
                .value_parser(["nearest", "bilinear", "bicubic", "lanczos3"])
                .default_value("bilinear")
                .help("Interpolation filter"),
            Arg::new("ext")
                .long("ext")
                .action(ArgAction::Append)
                .help("Image extension to pick up, repeatable (default: jpg)"),
            Arg::new("keep_format")
                .long("keep-format")
                .action(ArgAction::SetTrue)
                .help("Keep the source file extension instead of writing PNG"),
            Arg::new("limit")
                .long("limit")
                .value_parser(value_parser!(usize))
                .help("Limit number of images to process"),
        ])
        .next_help_heading("RUN OPTIONS")
        .args([
            Arg::new("config")
                .long("config")
                .value_parser(value_parser!(PathBuf))
                .help("Load settings from a JSON config; flags override it"),
            Arg::new("save_config")
                .long("save-config")
                .value_parser(value_parser!(PathBuf))
                .help("Write the effective config as JSON"),
            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the planned outputs without processing"),
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .action(ArgAction::SetTrue)
                .help("Hide the progress bar"),
        ])
}

fn parse_size(s: &str) -> std::result::Result<TargetSize, String> {
    s.parse()
}

/// Starts from `--config` when given, then applies every flag that was set on
/// the command line. Without a config file clap defaults apply too.
fn build_config(matches: &ArgMatches) -> Result<PreprocessConfig> {
    let from_file = matches.get_one::<PathBuf>("config");
    let applies = |id: &str| {
        from_file.is_none() || matches.value_source(id) == Some(ValueSource::CommandLine)
    };

    let mut config = match from_file {
        Some(path) => PreprocessConfig::load_json(path)?,
        None => PreprocessConfig::new(
            matches
                .get_one::<PathBuf>("in_dir")
                .cloned()
                .context("--in-dir is required")?,
            matches
                .get_one::<PathBuf>("out_dir")
                .cloned()
                .context("--out-dir is required")?,
        ),
    };

    if let Some(dir) = matches.get_one::<PathBuf>("in_dir") {
        config.input_dir = dir.clone();
    }
    if let Some(dir) = matches.get_one::<PathBuf>("out_dir") {
        config.output_dir = dir.clone();
    }
    if applies("size") {
        if let Some(size) = matches.get_one::<TargetSize>("size") {
            config = config.with_target_size(*size);
        }
    }
    if applies("workers") {
        if let Some(workers) = matches.get_one::<usize>("workers") {
            config.workers = *workers;
        }
    }
    if applies("filter") {
        if let Some(filter) = matches.get_one::<String>("filter") {
            config.filter = filter.parse::<ResizeFilter>().map_err(anyhow::Error::msg)?;
        }
    }
    if matches.get_flag("gpu") {
        config.target = ExecutionTarget::Accelerator;
    }
    if matches.get_flag("keep_format") {
        config.format = OutputFormat::Source;
    }
    if let Some(exts) = matches.get_many::<String>("ext") {
        config.extensions = exts
            .map(|e| e.trim_start_matches('.').to_string())
            .collect();
    }
    if let Some(limit) = matches.get_one::<usize>("limit") {
        config.limit = Some(*limit);
    }

    Ok(config)
}
