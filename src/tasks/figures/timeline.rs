//! Per-task execution timeline of Q95 (fig15), NIMBLE against Ditto.
//!
//! Every task of every stage has its own log under `fixed/` (NIMBLE's fixed
//! parallelism) or `ditto/`. Each line is `<Name> <value-ms>`.

use crate::tasks::figures::{
    baselines::Algorithm,
    breakdown::NUM_STAGES,
    color::get_stage_color,
    export::DataRow,
    plot::{self, Axis, LegendItem, LegendMarker, Span, SpanPanel},
    scale::Scale,
    Figure, PlotContext,
};
use anyhow::{Context, Result};
use log::{debug, error, info};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

/// Trailing post-processing entry, not part of the task's execution.
const POST_ENTRY: &str = "EffectTime.tpost";

/// How Q95 was deployed in one run: parallelism and start time of each stage.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Deployment {
    pub algorithm: Algorithm,
    pub log_dir: &'static str,
    pub parallelism: [usize; NUM_STAGES],
    pub start_times: [f64; NUM_STAGES],
}

pub fn deployments(scale: Scale) -> [Deployment; 2] {
    match scale {
        Scale::TenGb => [
            Deployment {
                algorithm: Algorithm::Nimble,
                log_dir: "fixed",
                parallelism: [3, 3, 1, 3, 3, 3, 3, 3, 1],
                start_times: [0.0, 19.991, 22.131, 0.0, 0.0, 22.106, 0.0, 27.47, 27.986],
            },
            Deployment {
                algorithm: Algorithm::Ditto,
                log_dir: "ditto",
                parallelism: [12, 2, 1, 6, 1, 2, 1, 2, 1],
                start_times: [0.0, 1.589, 2.745, 0.0, 0.0, 8.28, 0.0, 10.476, 10.656],
            },
        ],
        Scale::OneTb => [
            Deployment {
                algorithm: Algorithm::Nimble,
                log_dir: "fixed",
                parallelism: [24, 24, 1, 24, 24, 24, 24, 24, 1],
                start_times: [
                    0.0, 225.511, 252.369, 0.0, 0.0, 270.264, 0.0, 423.248, 415.936,
                ],
            },
            Deployment {
                algorithm: Algorithm::Ditto,
                log_dir: "ditto",
                parallelism: [60, 15, 1, 48, 4, 24, 1, 12, 1],
                start_times: [
                    0.0, 89.087, 105.329, 86.419, 0.0, 119.881, 0.0, 260.373, 260.584,
                ],
            },
        ],
    }
}

impl Deployment {
    pub fn task_log_path(&self, results_dir: &Path, stage_idx: usize, task_idx: usize) -> PathBuf {
        results_dir.join(self.log_dir).join(format!(
            "q95_stage{}_parall{}_task{task_idx}.log",
            stage_idx + 1,
            self.parallelism[stage_idx]
        ))
    }

    /// Execution time of every task, in seconds, indexed `[stage][task]`.
    pub fn load_exec_times(&self, results_dir: &Path) -> Result<Vec<Vec<f64>>> {
        let mut exec_times = Vec::with_capacity(NUM_STAGES);
        for (s_idx, parallelism) in self.parallelism.iter().enumerate() {
            let mut stage_times = Vec::with_capacity(*parallelism);
            for t_idx in 0..*parallelism {
                let path = self.task_log_path(results_dir, s_idx, t_idx);
                stage_times.push(task_time_from_path(&path)?);
            }
            exec_times.push(stage_times);
        }
        Ok(exec_times)
    }
}

/// Sum of all entries of a task log except the post-processing one, in
/// seconds.
pub fn task_time<R: BufRead>(reader: R) -> Result<f64> {
    let mut total_ms = 0.0;
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            [] => continue,
            [name, ..] if *name == POST_ENTRY => continue,
            [name, value, ..] => {
                let value: f64 = value
                    .parse()
                    .with_context(|| format!("bad value for {name} (line={})", idx + 1))?;
                total_ms += value;
            }
            [name] => {
                let reason = format!("entry {name} has no value (line={})", idx + 1);
                error!("{reason}");
                anyhow::bail!(reason);
            }
        }
    }

    Ok(total_ms / 1000.0)
}

pub fn task_time_from_path(path: &Path) -> Result<f64> {
    let file = File::open(path).map_err(|e| {
        error!("error opening task log (path={}): {e}", path.display());
        anyhow::anyhow!("error opening task log (path={}): {e}", path.display())
    })?;
    task_time(BufReader::new(file))
        .with_context(|| format!("error parsing task log (path={})", path.display()))
}

/// Number of task rows a panel reserves, plus some headroom on top.
fn num_rows(scale: Scale) -> usize {
    match scale {
        Scale::TenGb => 30 + 5,
        Scale::OneTb => 170 + 40,
    }
}

fn row_tick_step(scale: Scale) -> usize {
    if scale.is_large() {
        50
    } else {
        5
    }
}

/// One row per task, stages stacked one after the other. Tasks of a stage
/// that does not start at zero pay a cold start drawn from `[1, 2)` seconds.
pub fn layout<R: Rng>(deployment: &Deployment, exec_times: &[Vec<f64>], rng: &mut R) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut row = 0;
    for (s_idx, stage_times) in exec_times.iter().enumerate() {
        let stage_start = deployment.start_times[s_idx];
        for exec_time in stage_times {
            let start = if stage_start != 0.0 {
                stage_start + rng.gen_range(1.0..2.0)
            } else {
                stage_start
            };
            spans.push(Span {
                row: row as f64,
                start,
                len: *exec_time,
                color: get_stage_color(s_idx),
            });
            row += 1;
        }
    }
    spans
}

pub fn build_panel(deployment: &Deployment, spans: Vec<Span>, scale: Scale) -> SpanPanel {
    let rows = num_rows(scale);
    if spans.len() > rows {
        debug!(
            "{} timeline has {} tasks, more than the {rows} reserved rows",
            deployment.algorithm,
            spans.len()
        );
    }

    SpanPanel {
        row_range: (-0.5, rows.max(spans.len()) as f64),
        spans,
        row_labels: Vec::new(),
        row_height: 1.0,
        num_row_ticks: rows / row_tick_step(scale) + 1,
        x_desc: "Time (s)".to_string(),
        y_desc: format!("{}: Stages & Tasks", deployment.algorithm.legend()),
        x_axis: if scale.is_large() {
            Axis::new(450.0, 100.0)
        } else {
            Axis::new(45.0, 10.0)
        },
    }
}

pub fn to_rows(figure: &Figure, panels: &[SpanPanel]) -> Vec<DataRow> {
    let mut rows = Vec::new();
    for (p_idx, panel) in panels.iter().enumerate() {
        for span in &panel.spans {
            let task = format!("task{}", span.row);
            rows.push(DataRow::new(figure, p_idx, &task, "start", span.start));
            rows.push(DataRow::new(figure, p_idx, &task, "duration", span.len));
        }
    }
    rows
}

fn build_panels<R: Rng>(ctx: &PlotContext, rng: &mut R) -> Result<Vec<SpanPanel>> {
    let mut panels = Vec::with_capacity(2);
    for deployment in deployments(ctx.scale).iter() {
        let exec_times = deployment.load_exec_times(&ctx.results_dir)?;
        info!(
            "{}: loaded {} task logs",
            deployment.algorithm,
            exec_times.iter().map(Vec::len).sum::<usize>()
        );
        let spans = layout(deployment, &exec_times, rng);
        panels.push(build_panel(deployment, spans, ctx.scale));
    }
    Ok(panels)
}

pub fn plot(figure: &Figure, ctx: &PlotContext) -> Result<PathBuf> {
    let panels = match ctx.seed {
        Some(seed) => build_panels(ctx, &mut StdRng::seed_from_u64(seed))?,
        None => build_panels(ctx, &mut rand::thread_rng())?,
    };

    let legend: Vec<LegendItem> = (0..NUM_STAGES)
        .map(|s_idx| {
            LegendItem::new(
                &format!("Stage {}", s_idx + 1),
                get_stage_color(s_idx),
                LegendMarker::Box,
            )
        })
        .collect();

    let plot_path = ctx.output_path(figure);
    {
        let (root, legend_area, body) = plot::new_canvas(&plot_path, (1800, 640))?;
        plot::draw_legend(&legend_area, &legend)?;
        for (area, panel) in body.split_evenly((1, panels.len())).iter().zip(&panels) {
            plot::draw_span_panel(area, panel)?;
        }
        plot::finish_canvas(root, &plot_path)?;
    }

    if ctx.export_csv {
        ctx.export(figure, &to_rows(figure, &panels))?;
    }

    Ok(plot_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, io::Cursor};

    #[test]
    fn test_task_time_skips_post_entry() {
        let log = "EffectTime.tsetup 100\nEffectTime.tread 1500.5\n\
                   EffectTime.tcomp 399.5\nEffectTime.tpost 9000\n";
        assert_eq!(task_time(Cursor::new(log)).unwrap(), 2.0);
    }

    #[test]
    fn test_task_time_rejects_bad_lines() {
        assert!(task_time(Cursor::new("EffectTime.tread\n")).is_err());
        assert!(task_time(Cursor::new("EffectTime.tread fast\n")).is_err());
        assert_eq!(task_time(Cursor::new("\n\n")).unwrap(), 0.0);
    }

    #[test]
    fn test_load_exec_times_reads_every_task() {
        let dir = tempfile::tempdir().unwrap();
        let deployment = deployments(Scale::TenGb)[1];
        fs::create_dir_all(dir.path().join("ditto")).unwrap();
        for (s_idx, parallelism) in deployment.parallelism.iter().enumerate() {
            for t_idx in 0..*parallelism {
                let path = deployment.task_log_path(dir.path(), s_idx, t_idx);
                fs::write(path, format!("A {}\nEffectTime.tpost 1\n", (s_idx + 1) * 1000)).unwrap();
            }
        }

        let exec_times = deployment.load_exec_times(dir.path()).unwrap();
        assert_eq!(exec_times.len(), NUM_STAGES);
        assert_eq!(exec_times[0].len(), 12);
        assert_eq!(exec_times[8], vec![9.0]);

        assert!(deployment
            .task_log_path(dir.path(), 0, 3)
            .ends_with("ditto/q95_stage1_parall12_task3.log"));
        assert!(deployments(Scale::TenGb)[0]
            .load_exec_times(dir.path())
            .is_err());
    }

    #[test]
    fn test_layout_rows_and_cold_starts() {
        let deployment = deployments(Scale::TenGb)[0];
        let exec_times: Vec<Vec<f64>> = deployment
            .parallelism
            .iter()
            .map(|p| vec![1.0; *p])
            .collect();

        let spans = layout(&deployment, &exec_times, &mut StdRng::seed_from_u64(7));
        assert_eq!(spans.len(), 23);
        assert_eq!(spans[0].start, 0.0);
        assert_eq!(spans[3].row, 3.0);
        assert_eq!(spans[3].color, get_stage_color(1));
        for span in &spans[3..6] {
            assert!(span.start >= 20.991 && span.start < 21.991);
        }
        // stage 4 starts at zero
        assert_eq!(spans[7].start, 0.0);

        let again = layout(&deployment, &exec_times, &mut StdRng::seed_from_u64(7));
        assert_eq!(spans, again);

        let panel = build_panel(&deployment, spans, Scale::TenGb);
        assert_eq!(panel.row_range, (-0.5, 35.0));
        assert_eq!(panel.x_axis, Axis::new(45.0, 10.0));

        let rows = to_rows(&Figure::Fig15, &[panel]);
        assert_eq!(rows.len(), 46);
        assert_eq!(rows[1].category, "task0");
        assert_eq!(rows[1].value, 1.0);
    }
}
