use std::path::PathBuf;

use clap::Parser;
use log::info;

use hibf::source::{file_source, read_dataset_list};
use hibf::{Config, Layout, Options};

/// Build a Hierarchical Interleaved Bloom Filter from a layout.
#[derive(Debug, Parser)]
#[command(name = "hibf-build", version, about)]
struct Args {
    /// Layout file produced by the partitioning stage
    #[arg(long)]
    layout: PathBuf,

    /// File listing one fingerprint file per line; line i is user bin i
    #[arg(long)]
    datasets: PathBuf,

    /// Where to write the index
    #[arg(long)]
    output: PathBuf,

    /// TOML file with build options
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured thread count
    #[arg(long)]
    threads: Option<usize>,
}

fn main() -> hibf::Result<()> {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));
    let args = Args::parse();

    let mut options = match &args.config {
        Some(path) => Options::load(path)?,
        None => Options::default(),
    };
    if let Some(threads) = args.threads {
        options.threads = threads;
    }

    let layout = Layout::read_from(&args.layout)?;
    let datasets = read_dataset_list(&args.datasets)?;
    info!(
        "layout has {} user bins, {} fingerprint files listed",
        layout.user_bins.len(),
        datasets.len()
    );

    let config = Config::with_source(options, file_source(datasets))?;
    let hibf = hibf::build(&layout, &config)?;
    hibf.write_to(&args.output)?;
    info!("wrote {} filters to {}", hibf.len(), args.output.display());

    Ok(())
}
