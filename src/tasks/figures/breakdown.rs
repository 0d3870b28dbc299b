//! Per-stage time breakdown of Q95 (fig14).
//!
//! `time_breakdown.log` holds the fitted `a` and `b` coefficients of every
//! stage, for its five components: setup, first read, second read, compute
//! and write. The figure merges both reads into a single phase.

use crate::tasks::figures::{
    color::get_color_from_label,
    export::DataRow,
    plot::{self, Axis, LegendItem, LegendMarker, Span, SpanPanel},
    scale::Scale,
    Figure, PlotContext,
};
use anyhow::{Context, Result};
use log::{debug, error};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

pub const TIME_BREAKDOWN_LOG: &str = "time_breakdown.log";
pub const NUM_STAGES: usize = 9;
const NUM_COMPONENTS: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Setup,
    Read,
    Compute,
    Write,
}

impl Phase {
    pub fn iter_variants() -> std::slice::Iter<'static, Phase> {
        static VARIANTS: [Phase; 4] = [Phase::Setup, Phase::Read, Phase::Compute, Phase::Write];
        VARIANTS.iter()
    }

    pub fn label(&self) -> &'static str {
        match self {
            Phase::Setup => "setup",
            Phase::Read => "read",
            Phase::Compute => "compute",
            Phase::Write => "write",
        }
    }

    fn color_label(&self) -> &'static str {
        match self {
            Phase::Setup => "gray",
            Phase::Read => "darkorange",
            Phase::Compute => "royalblue",
            Phase::Write => "palegreen",
        }
    }

    /// Indices of the logged components that make up this phase.
    fn components(&self) -> &'static [usize] {
        match self {
            Phase::Setup => &[0],
            Phase::Read => &[1, 2],
            Phase::Compute => &[3],
            Phase::Write => &[4],
        }
    }
}

/// Model coefficients, `[stage][component]`, in milliseconds.
#[derive(Clone, Debug, PartialEq)]
pub struct TimeModel {
    pub a: Vec<[f64; NUM_COMPONENTS]>,
    pub b: Vec<[f64; NUM_COMPONENTS]>,
}

fn parse_coefficients(tokens: &[&str], line_no: usize) -> Result<Vec<[f64; NUM_COMPONENTS]>> {
    let expected = NUM_STAGES * NUM_COMPONENTS;
    if tokens.len() < expected {
        let reason = format!(
            "expected {expected} coefficients, found {} (line={line_no})",
            tokens.len()
        );
        error!("{reason}");
        anyhow::bail!(reason);
    }

    let mut stages = vec![[0.0; NUM_COMPONENTS]; NUM_STAGES];
    for (idx, token) in tokens.iter().take(expected).enumerate() {
        stages[idx / NUM_COMPONENTS][idx % NUM_COMPONENTS] = token
            .parse()
            .with_context(|| format!("bad coefficient (line={line_no}, value={token})"))?;
    }

    Ok(stages)
}

impl TimeModel {
    pub fn parse<R: BufRead>(reader: R) -> Result<TimeModel> {
        let mut a = None;
        let mut b = None;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            match tokens.first() {
                Some(&"a:") => a = Some(parse_coefficients(&tokens[1..], idx + 1)?),
                Some(&"b:") => b = Some(parse_coefficients(&tokens[1..], idx + 1)?),
                Some(_) => debug!("ignoring line {}: {line}", idx + 1),
                None => {}
            }
        }

        match (a, b) {
            (Some(a), Some(b)) => Ok(TimeModel { a, b }),
            _ => {
                let reason = "time breakdown needs both an 'a:' and a 'b:' line".to_string();
                error!("{reason}");
                anyhow::bail!(reason)
            }
        }
    }

    pub fn from_path(path: &Path) -> Result<TimeModel> {
        let file = File::open(path)
            .with_context(|| format!("error opening log (path={})", path.display()))?;
        Self::parse(BufReader::new(file))
            .with_context(|| format!("error parsing log (path={})", path.display()))
    }

    /// Duration of each phase of each stage, in seconds, when the stage runs
    /// with `dop` parallel tasks.
    pub fn phase_times(&self, dop: f64) -> Vec<[f64; 4]> {
        self.a
            .iter()
            .zip(&self.b)
            .map(|(a, b)| {
                let mut times = [0.0; 4];
                for (p_idx, phase) in Phase::iter_variants().enumerate() {
                    times[p_idx] = phase
                        .components()
                        .iter()
                        .map(|c| a[*c] / dop + b[*c])
                        .sum::<f64>()
                        / 1000.0;
                }
                times
            })
            .collect()
    }
}

/// Parallelism the breakdown is evaluated at.
pub fn breakdown_dop(scale: Scale) -> f64 {
    if scale.is_large() {
        40.0
    } else {
        4.0
    }
}

/// Stack phases one after the other: returns `(start, duration)` per phase.
pub fn stack(times: &[f64; 4]) -> [(f64, f64); 4] {
    let mut stacked = [(0.0, 0.0); 4];
    let mut start = 0.0;
    for (idx, duration) in times.iter().enumerate() {
        stacked[idx] = (start, *duration);
        start += duration;
    }
    stacked
}

pub fn build_panel(stage_times: &[[f64; 4]], scale: Scale) -> Result<SpanPanel> {
    let base_axis = if scale.is_large() {
        Axis::new(150.0, 50.0)
    } else {
        Axis::new(16.0, 5.0)
    };

    let mut spans = Vec::new();
    let mut longest: f64 = 0.0;
    for (s_idx, times) in stage_times.iter().enumerate() {
        for ((start, len), phase) in stack(times).iter().zip(Phase::iter_variants()) {
            spans.push(Span {
                row: (s_idx + 1) as f64,
                start: *start,
                len: *len,
                color: get_color_from_label(phase.color_label())?,
            });
            longest = longest.max(start + len);
        }
    }

    Ok(SpanPanel {
        spans,
        row_labels: (1..=stage_times.len())
            .map(|stage| (stage as f64, format!("{stage}")))
            .collect(),
        row_range: (0.4, stage_times.len() as f64 + 0.6),
        row_height: 0.6,
        num_row_ticks: stage_times.len(),
        x_desc: "Time (s)".to_string(),
        y_desc: "Stage Index".to_string(),
        x_axis: base_axis
            .fit(longest)
            .context("bad time breakdown coefficients")?,
    })
}

pub fn to_rows(figure: &Figure, stage_times: &[[f64; 4]]) -> Vec<DataRow> {
    stage_times
        .iter()
        .enumerate()
        .flat_map(|(s_idx, times)| {
            Phase::iter_variants()
                .zip(times.iter())
                .map(move |(phase, time)| {
                    DataRow::new(figure, 0, &format!("stage{}", s_idx + 1), phase.label(), *time)
                })
        })
        .collect()
}

pub fn plot(figure: &Figure, ctx: &PlotContext) -> Result<PathBuf> {
    let model = TimeModel::from_path(&ctx.results_dir.join(TIME_BREAKDOWN_LOG))?;
    let stage_times = model.phase_times(breakdown_dop(ctx.scale));
    let panel = build_panel(&stage_times, ctx.scale)?;

    let mut legend = Vec::new();
    for phase in Phase::iter_variants() {
        legend.push(LegendItem::new(
            phase.label(),
            get_color_from_label(phase.color_label())?,
            LegendMarker::Box,
        ));
    }

    let plot_path = ctx.output_path(figure);
    {
        let (root, legend_area, body) = plot::new_canvas(&plot_path, (1000, 560))?;
        plot::draw_legend(&legend_area, &legend)?;
        plot::draw_span_panel(&body, &panel)?;
        plot::finish_canvas(root, &plot_path)?;
    }

    if ctx.export_csv {
        ctx.export(figure, &to_rows(figure, &stage_times))?;
    }

    Ok(plot_path)
}
