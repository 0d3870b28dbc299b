use crate::{
    env::Env,
    tasks::figures::{self, scale::Scale, summary, Figure, PlotContext},
};
use clap::{Parser, Subcommand};
use env_logger::Builder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};

pub mod env;
pub mod tasks;

#[derive(Parser)]
struct Cli {
    // The name of the task to execute
    #[clap(subcommand)]
    task: Command,

    /// Directory with the experiment logs, figures are written there too
    /// [default: $DITTO_RESULTS_DIR or ../results]
    #[arg(long, global = true)]
    results_dir: Option<String>,
    /// File whose first line selects the data scale (10 or 1000)
    /// [default: ./scale.txt]
    #[arg(long, global = true)]
    scale_file: Option<String>,
    /// Override the data scale (10 or 1000)
    #[arg(long, global = true)]
    scale: Option<Scale>,
    /// Seed for the cold-start jitter of the task timeline
    #[arg(long, global = true)]
    seed: Option<u64>,
    /// Also write the plotted values to a CSV next to every figure
    #[arg(long, global = true, default_value_t = false)]
    export_csv: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// End-to-end JCT of NIMBLE and Ditto on S3
    Fig8,
    /// Normalised cost of NIMBLE and Ditto on S3
    Fig9,
    /// JCT and normalised cost on Redis
    Fig10,
    /// Stage execution time against degree of parallelism, with the fitted
    /// model
    Fig11,
    /// Ablation of Ditto's grouping and parallelism techniques
    Fig12,
    /// Time breakdown of the stages of Q95
    Fig14,
    /// Per-task timeline of Q95, NIMBLE against Ditto
    Fig15,
    /// Render every figure
    All,
    /// Print the numbers behind the figures
    Summary {
        /// Print a JSON document instead of log lines
        #[arg(long)]
        json: bool,
    },
}

impl Command {
    fn figure(&self) -> Option<Figure> {
        match self {
            Command::Fig8 => Some(Figure::Fig8),
            Command::Fig9 => Some(Figure::Fig9),
            Command::Fig10 => Some(Figure::Fig10),
            Command::Fig11 => Some(Figure::Fig11),
            Command::Fig12 => Some(Figure::Fig12),
            Command::Fig14 => Some(Figure::Fig14),
            Command::Fig15 => Some(Figure::Fig15),
            Command::All | Command::Summary { .. } => None,
        }
    }
}

fn plot_all(ctx: &PlotContext) -> anyhow::Result<()> {
    let pb = ProgressBar::new(Figure::iter_variants().len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")?
            .progress_chars("#>-"),
    );

    let mut failed = Vec::new();
    for figure in Figure::iter_variants() {
        pb.set_message(format!("{figure}"));
        if let Err(e) = figures::plot(figure, ctx) {
            pb.suspend(|| error!("{}: error plotting {figure}: {e:#}", Env::SYS_NAME));
            failed.push(format!("{figure}"));
        }
        pb.inc(1);
    }
    pb.finish_with_message("done");

    if !failed.is_empty() {
        let reason = format!("failed to plot: {}", failed.join(", "));
        error!("{}: {reason}", Env::SYS_NAME);
        anyhow::bail!(reason);
    }

    Ok(())
}

fn main() -> anyhow::Result<()> {
    // Initialize the logger.
    let env = env_logger::Env::default().filter_or("RUST_LOG", "info");
    let mut builder = Builder::from_env(env);
    builder.init();

    let cli = Cli::parse();

    let scale = match cli.scale {
        Some(scale) => scale,
        None => {
            let scale_file = match &cli.scale_file {
                Some(path) => Env::expand_path(path),
                None => Env::scale_file(),
            };
            Scale::from_file(&scale_file)?
        }
    };
    let results_dir = match &cli.results_dir {
        Some(path) => Env::expand_path(path),
        None => Env::results_root(),
    };
    info!(
        "{}: plotting at scale {scale} (selector={}, results={})",
        Env::SYS_NAME,
        scale.selector(),
        results_dir.display()
    );

    let ctx = PlotContext {
        results_dir,
        scale,
        seed: cli.seed,
        export_csv: cli.export_csv,
    };

    match &cli.task {
        Command::All => plot_all(&ctx)?,
        Command::Summary { json } => summary::run(&ctx, *json)?,
        command => {
            if let Some(figure) = command.figure() {
                figures::plot(&figure, &ctx)?;
            }
        }
    }

    Ok(())
}
