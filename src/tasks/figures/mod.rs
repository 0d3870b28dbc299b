use crate::tasks::figures::{export::DataRow, scale::Scale};
use anyhow::Result;
use std::{fmt, path::PathBuf};

pub mod baselines;
pub mod breakdown;
pub mod color;
pub mod comparison;
pub mod dop;
pub mod export;
pub mod logs;
pub mod plot;
pub mod scale;
pub mod summary;
pub mod timeline;

/// Figures of the evaluation. Numbering follows the paper, fig13 is a
/// diagram and has no data behind it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Figure {
    /// End-to-end JCT of NIMBLE and Ditto on S3
    Fig8,
    /// Cost of NIMBLE and Ditto on S3, normalised to Ditto
    Fig9,
    /// JCT and normalised cost on Redis
    Fig10,
    /// Stage execution time against degree of parallelism
    Fig11,
    /// Ablation of Ditto's scheduling techniques
    Fig12,
    /// Time breakdown of every stage of Q95
    Fig14,
    /// Per-task timeline of Q95
    Fig15,
}

impl fmt::Display for Figure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Figure::Fig8 => write!(f, "fig8"),
            Figure::Fig9 => write!(f, "fig9"),
            Figure::Fig10 => write!(f, "fig10"),
            Figure::Fig11 => write!(f, "fig11"),
            Figure::Fig12 => write!(f, "fig12"),
            Figure::Fig14 => write!(f, "fig14"),
            Figure::Fig15 => write!(f, "fig15"),
        }
    }
}

impl Figure {
    pub fn iter_variants() -> std::slice::Iter<'static, Figure> {
        static VARIANTS: [Figure; 7] = [
            Figure::Fig8,
            Figure::Fig9,
            Figure::Fig10,
            Figure::Fig11,
            Figure::Fig12,
            Figure::Fig14,
            Figure::Fig15,
        ];
        VARIANTS.iter()
    }
}

/// Everything a figure needs to find its inputs and place its outputs.
#[derive(Clone, Debug)]
pub struct PlotContext {
    pub results_dir: PathBuf,
    pub scale: Scale,
    pub seed: Option<u64>,
    pub export_csv: bool,
}

impl PlotContext {
    pub fn output_path(&self, figure: &Figure) -> PathBuf {
        self.results_dir.join(format!("{figure}.png"))
    }

    pub fn export(&self, figure: &Figure, rows: &[DataRow]) -> Result<()> {
        export::write_rows(&self.results_dir.join(format!("{figure}.csv")), rows)
    }
}

pub fn plot(figure: &Figure, ctx: &PlotContext) -> Result<PathBuf> {
    match figure {
        Figure::Fig8 | Figure::Fig9 | Figure::Fig10 | Figure::Fig12 => {
            comparison::plot(figure, ctx)
        }
        Figure::Fig11 => dop::plot(figure, ctx),
        Figure::Fig14 => breakdown::plot(figure, ctx),
        Figure::Fig15 => timeline::plot(figure, ctx),
    }
}
