use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use ro_engine::config::{DEFAULT_EVENT_WEIGHT, DEFAULT_TREE};
use ro_engine::{
    run_cut, run_generate, run_hash, run_optimize, run_summary, CutConfig, GenerateConfig,
    HashConfig, OptimizeConfig, SummaryConfig,
};
use ro_optimizer::SignificanceConfig;
use ro_types::CountKind;

#[derive(Parser)]
#[command(name = "root-optimize")]
#[command(about = "Cut-grid optimization: apply every cut combination, rank by significance")]
#[command(version)]
struct Cli {
    /// More log output (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Replace existing outputs instead of refusing to run
    #[arg(long, global = true)]
    overwrite: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a supercuts template from the columns of one event file
    Generate {
        /// Event file whose columns seed the template
        file: PathBuf,

        /// Name of the event table inside the file
        #[arg(long = "tree", default_value = DEFAULT_TREE)]
        tree_name: String,

        /// Event weight expression; its columns are left out
        #[arg(long, alias = "eventWeight", default_value = DEFAULT_EVENT_WEIGHT)]
        event_weight: String,

        /// Columns (glob patterns) that get a fixed cut
        #[arg(long, alias = "fixedBranches", num_args = 1..)]
        fixed: Vec<String>,

        /// Columns (glob patterns) to leave out
        #[arg(long, alias = "skipBranches", num_args = 1..)]
        skip: Vec<String>,

        /// Output supercuts file
        #[arg(short, long, default_value = "supercuts.json")]
        output: PathBuf,
    },

    /// Apply every cut combination to every sample
    Cut {
        /// Event files or glob patterns; files are grouped by the id before the first '.'
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long, default_value = "supercuts.json")]
        supercuts: PathBuf,

        #[arg(long = "tree", default_value = DEFAULT_TREE)]
        tree_name: String,

        #[arg(long, alias = "eventWeight", default_value = DEFAULT_EVENT_WEIGHT)]
        event_weight: String,

        /// Sample metadata (cross sections etc.); without it nothing is scaled
        #[arg(long = "weights", alias = "weightsFile")]
        metadata: Option<PathBuf>,

        /// Worker count; defaults to the number of cores
        #[arg(long = "ncores")]
        num_workers: Option<usize>,

        /// Output directory for the <sample>.json count tables
        #[arg(short, long, default_value = "cuts")]
        output: PathBuf,
    },

    /// Rank every cut of each signal against the merged backgrounds
    Optimize {
        /// Signal sample ids, <id>.json, or glob patterns inside the search directory
        #[arg(long, required = true, num_args = 1..)]
        signal: Vec<String>,

        /// Background sample ids, <id>.json, or glob patterns inside the search directory
        #[arg(long, required = true, num_args = 1..)]
        bkgd: Vec<String>,

        /// Directory holding the count tables
        #[arg(long, alias = "searchDirectory", default_value = "cuts")]
        search_dir: PathBuf,

        /// Relative background uncertainty
        #[arg(long, alias = "bkgdUncertainty", default_value_t = 0.3)]
        bkgd_uncertainty: f64,

        /// Relative background statistical uncertainty
        #[arg(long, alias = "bkgdStatUncertainty", default_value_t = 0.3)]
        bkgd_stat_uncertainty: f64,

        /// Minimum signal yield for a significance
        #[arg(long, default_value_t = 0.5)]
        insignificance: f64,

        /// Integrated luminosity in fb^-1; defaults to the metadata value, else 1
        #[arg(long)]
        lumi: Option<f64>,

        /// Metadata table to take the luminosity from
        #[arg(long = "weights", alias = "weightsFile")]
        metadata: Option<PathBuf>,

        /// Count kind to rank by: raw, weighted or scaled
        #[arg(long, default_value = "scaled")]
        rank_by: CountKind,

        /// JSON map of sample id or group to a rescale factor
        #[arg(long)]
        rescale: Option<PathBuf>,

        /// JSON map of sample id to group
        #[arg(long)]
        did_to_group: Option<PathBuf>,

        /// Hashes kept per signal
        #[arg(short = 'n', long, default_value_t = 25)]
        max_num_hashes: usize,

        #[arg(short, long, default_value = "significances")]
        output: PathBuf,
    },

    /// Write out the cuts behind one or more hashes
    Hash {
        /// Hashes, or ranked/summary files with --use-summary
        #[arg(required = true)]
        hash_values: Vec<String>,

        #[arg(long, default_value = "supercuts.json")]
        supercuts: PathBuf,

        /// Read the hashes from the given JSON files
        #[arg(long)]
        use_summary: bool,

        #[arg(short, long, default_value = "outputHash")]
        output: PathBuf,
    },

    /// Best cut of every signal from an optimize output directory
    Summary {
        #[arg(long, alias = "searchDirectory")]
        search_dir: PathBuf,

        #[arg(short, long, default_value = "summary.json")]
        output: PathBuf,
    },
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let overwrite = cli.overwrite;

    match cli.command {
        Commands::Generate {
            file,
            tree_name,
            event_weight,
            fixed,
            skip,
            output,
        } => {
            let config = GenerateConfig {
                tree_name,
                event_weight,
                ..GenerateConfig::new(&file)
            }
            .with_fixed(fixed)
            .with_skip(skip)
            .with_output(&output, overwrite);
            let supercuts = run_generate(&config)
                .with_context(|| format!("generating supercuts from {}", file.display()))?;
            println!("wrote {} dimensions to {}", supercuts.len(), output.display());
        }

        Commands::Cut {
            files,
            supercuts,
            tree_name,
            event_weight,
            metadata,
            num_workers,
            output,
        } => {
            let mut config = CutConfig::new(files, supercuts)
                .with_tree_name(&tree_name)
                .with_event_weight(&event_weight)
                .with_output(output, overwrite);
            if let Some(n) = num_workers {
                config = config.with_workers(n);
            }
            if let Some(path) = metadata {
                config = config.with_metadata(path);
            }
            let run = run_cut(&config).context("cut run failed")?;
            for failure in run.report.failures() {
                eprintln!(
                    "skipped {}: {}",
                    failure.sample,
                    failure.error.as_deref().unwrap_or("unknown error")
                );
            }
            println!(
                "{} of {} samples cut over {} combinations into {}",
                run.report.succeeded(),
                run.report.outcomes.len(),
                run.grid_size,
                run.output_dir.display()
            );
            if run.report.succeeded() == 0 {
                bail!("every sample failed");
            }
        }

        Commands::Optimize {
            signal,
            bkgd,
            search_dir,
            bkgd_uncertainty,
            bkgd_stat_uncertainty,
            insignificance,
            lumi,
            metadata,
            rank_by,
            rescale,
            did_to_group,
            max_num_hashes,
            output,
        } => {
            let significance = SignificanceConfig::default()
                .with_insignificance_threshold(insignificance)
                .with_uncertainties(bkgd_uncertainty, bkgd_stat_uncertainty)
                .with_rank_by(rank_by)
                .with_max_hashes(max_num_hashes);
            let mut config = OptimizeConfig::new(signal, bkgd)
                .with_search_dir(search_dir)
                .with_significance(significance)
                .with_output(output, overwrite);
            config.metadata = metadata;
            if let Some(lumi) = lumi {
                config = config.with_luminosity(lumi);
            }
            if let Some(path) = rescale {
                config = config.with_rescale(path, did_to_group);
            } else if did_to_group.is_some() {
                bail!("--did-to-group needs --rescale");
            }
            let run = run_optimize(&config).context("optimize run failed")?;
            for signal in &run.ranked {
                match signal.best() {
                    Some(best) => println!(
                        "{}\t{}\t{:.4}",
                        signal.sample,
                        best.hash,
                        best.significance(rank_by)
                    ),
                    None => println!("{}\t(no cuts)", signal.sample),
                }
            }
            println!(
                "background set {} written to {}",
                run.background_hash,
                run.output_dir.display()
            );
        }

        Commands::Hash {
            hash_values,
            supercuts,
            use_summary,
            output,
        } => {
            let mut config = HashConfig::new(hash_values, supercuts).with_output(output, overwrite);
            if use_summary {
                config = config.reading_files();
            }
            let run = run_hash(&config).context("hash lookup failed")?;
            for hash in &run.lookup.unresolved {
                eprintln!("unresolved: {hash}");
            }
            println!(
                "resolved {} hashes into {}",
                run.lookup.resolved.len(),
                run.output_dir.display()
            );
        }

        Commands::Summary { search_dir, output } => {
            let config = SummaryConfig {
                search_dir,
                output,
                overwrite,
            };
            let entries = run_summary(&config).context("summary failed")?;
            println!("summarized {} samples into {}", entries.len(), config.output.display());
        }
    }

    Ok(())
}
