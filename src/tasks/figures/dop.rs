//! Accuracy of the per-stage execution time model (fig11).
//!
//! For every query the scheduler fits `t(d) = a / d + b` for one IO-bound
//! and one compute-bound stage, where `d` is the degree of parallelism, and
//! logs the model next to the times it actually measured.

use crate::tasks::figures::{
    baselines::Query,
    color::get_color_from_label,
    export::DataRow,
    plot::{self, Axis, CurvePanel, CurveSeries, LegendItem, LegendMarker},
    scale::Scale,
    Figure, PlotContext,
};
use anyhow::{Context, Result};
use log::{debug, error, info};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
};

pub const EFFECT_PERF_LOG: &str = "effect_perf.log";
const CURVE_POINTS: usize = 80;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum StageKind {
    Io,
    Comp,
}

impl StageKind {
    pub fn iter_variants() -> std::slice::Iter<'static, StageKind> {
        static VARIANTS: [StageKind; 2] = [StageKind::Io, StageKind::Comp];
        VARIANTS.iter()
    }

    fn color_label(&self) -> &'static str {
        match self {
            StageKind::Io => "tab-blue",
            StageKind::Comp => "tab-orange",
        }
    }

    fn name(&self) -> &'static str {
        match self {
            StageKind::Io => "IO-Stage",
            StageKind::Comp => "Comp-Stage",
        }
    }
}

/// Degrees of parallelism the profiles were sampled at.
pub fn sampled_dops(scale: Scale) -> Vec<f64> {
    if scale.is_large() {
        vec![10.0, 20.0, 30.0, 60.0, 120.0]
    } else {
        vec![2.0, 4.0, 6.0, 12.0]
    }
}

/// Fitted model and measurements for one stage, in seconds.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct StageModel {
    pub a: f64,
    pub b: f64,
    pub actuals: Vec<f64>,
}

impl StageModel {
    pub fn predict(&self, dop: f64) -> f64 {
        self.a / dop + self.b
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct QueryModels {
    pub stages: BTreeMap<StageKind, StageModel>,
    /// Time the scheduler spent fitting the models (us)
    pub fit_time_us: Option<f64>,
}

#[derive(Debug, Default, PartialEq)]
pub struct EffectPerf {
    pub queries: BTreeMap<Query, QueryModels>,
}

fn parse_floats<'a>(
    tokens: impl Iterator<Item = &'a str>,
    count: usize,
    line_no: usize,
) -> Result<Vec<f64>> {
    let values = tokens
        .take(count)
        .map(|t| {
            t.parse::<f64>()
                .with_context(|| format!("bad number (line={line_no}, value={t})"))
        })
        .collect::<Result<Vec<f64>>>()?;

    if values.len() < count {
        let reason = format!(
            "expected {count} values, found {} (line={line_no})",
            values.len()
        );
        error!("{reason}");
        anyhow::bail!(reason);
    }

    Ok(values)
}

impl EffectPerf {
    /// Parse `effect_perf.log`. `num_samples` is the number of sampled
    /// degrees of parallelism in each `actuals:` line.
    pub fn parse<R: BufRead>(reader: R, num_samples: usize) -> Result<EffectPerf> {
        let mut effect_perf = EffectPerf::default();
        let mut query: Option<Query> = None;
        let mut stage = StageKind::Io;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() {
                continue;
            }

            match tokens[0] {
                "Query" => {
                    let id: u32 = tokens
                        .get(1)
                        .ok_or_else(|| anyhow::anyhow!("missing query id (line={line_no})"))?
                        .parse()
                        .with_context(|| format!("bad query id (line={line_no})"))?;
                    let q = Query::from_id(id).ok_or_else(|| {
                        anyhow::anyhow!("unknown query (line={line_no}, query={id})")
                    })?;
                    effect_perf.queries.entry(q).or_default();
                    query = Some(q);
                    continue;
                }
                "IO" => stage = StageKind::Io,
                "Comp" => stage = StageKind::Comp,
                "Time" => {
                    let q = query.ok_or_else(|| {
                        anyhow::anyhow!("'Time' before any 'Query' line (line={line_no})")
                    })?;
                    let fit_time = parse_floats(tokens[1..].iter().copied(), 1, line_no)?[0];
                    effect_perf.queries.entry(q).or_default().fit_time_us = Some(fit_time);
                    continue;
                }
                _ => {}
            }

            let keyword = match tokens.get(1).copied() {
                Some(keyword) if keyword == "a:" || keyword == "actuals:" => keyword,
                _ => {
                    debug!("ignoring line {line_no}: {line}");
                    continue;
                }
            };
            let q = query.ok_or_else(|| {
                anyhow::anyhow!("'{keyword}' before any 'Query' line (line={line_no})")
            })?;
            let model = effect_perf
                .queries
                .entry(q)
                .or_default()
                .stages
                .entry(stage)
                .or_default();

            if keyword == "a:" {
                let values = parse_floats(
                    tokens[2..].iter().copied().filter(|t| *t != "b:"),
                    2,
                    line_no,
                )?;
                model.a = values[0] / 1000.0;
                model.b = values[1] / 1000.0;
            } else {
                model.actuals = parse_floats(tokens[2..].iter().copied(), num_samples, line_no)?
                    .into_iter()
                    .map(|v| v / 1000.0)
                    .collect();
            }
        }

        Ok(effect_perf)
    }

    pub fn from_path(path: &Path, num_samples: usize) -> Result<EffectPerf> {
        let file = File::open(path)
            .with_context(|| format!("error opening log (path={})", path.display()))?;
        Self::parse(BufReader::new(file), num_samples)
            .with_context(|| format!("error parsing log (path={})", path.display()))
    }

    pub fn get(&self, query: &Query, stage: &StageKind) -> Result<&StageModel> {
        self.queries
            .get(query)
            .and_then(|m| m.stages.get(stage))
            .ok_or_else(|| {
                let reason = format!("no {} model for {query}", stage.name());
                error!("{reason}");
                anyhow::anyhow!(reason)
            })
    }

    pub fn fit_times_us(&self) -> BTreeMap<Query, f64> {
        self.queries
            .iter()
            .filter_map(|(q, m)| m.fit_time_us.map(|t| (*q, t)))
            .collect()
    }
}

/// `num` evenly spaced points in `[start, end]`.
pub fn linspace(start: f64, end: f64, num: usize) -> Vec<f64> {
    match num {
        0 => vec![],
        1 => vec![start],
        _ => {
            let step = (end - start) / (num - 1) as f64;
            (0..num).map(|i| start + step * i as f64).collect()
        }
    }
}

struct Layout {
    x_axis: Axis,
    curve_range: (f64, f64),
    y_axes: [Axis; 4],
}

fn layout(scale: Scale) -> Layout {
    if scale.is_large() {
        Layout {
            x_axis: Axis::new(130.0, 20.0),
            curve_range: (5.0, 125.0),
            y_axes: [
                Axis::new(160.0, 40.0),
                Axis::new(1200.0, 300.0),
                Axis::new(1200.0, 300.0),
                Axis::new(1200.0, 300.0),
            ],
        }
    } else {
        Layout {
            x_axis: Axis::new(13.0, 2.0),
            curve_range: (1.0, 12.5),
            y_axes: [
                Axis::new(15.0, 3.0),
                Axis::new(100.0, 20.0),
                Axis::new(40.0, 10.0),
                Axis::new(60.0, 15.0),
            ],
        }
    }
}

pub fn build_panels(effect_perf: &EffectPerf, scale: Scale) -> Result<Vec<CurvePanel>> {
    let layout = layout(scale);
    let dops = sampled_dops(scale);
    let curve_x = linspace(layout.curve_range.0, layout.curve_range.1, CURVE_POINTS);

    let mut panels = Vec::new();
    for (q_idx, query) in Query::iter_variants().enumerate() {
        let mut series = Vec::new();
        let mut y_max: f64 = 0.0;
        for stage in StageKind::iter_variants() {
            let model = effect_perf.get(query, stage)?;
            let points: Vec<(f64, f64)> = dops
                .iter()
                .copied()
                .zip(model.actuals.iter().copied())
                .collect();
            y_max = points.iter().fold(y_max, |acc, (_, y)| acc.max(*y));
            series.push(CurveSeries {
                color: get_color_from_label(stage.color_label())?,
                points,
                curve: curve_x.iter().map(|x| (*x, model.predict(*x))).collect(),
            });
        }

        panels.push(CurvePanel {
            title: format!("{query}"),
            series,
            x_desc: "Degree of Parallelism".to_string(),
            y_desc: (q_idx == 0).then(|| "Execution Time (s)".to_string()),
            x_axis: layout.x_axis,
            y_axis: layout.y_axes[q_idx]
                .fit(y_max)
                .with_context(|| format!("bad measurements for {query}"))?,
        });
    }

    Ok(panels)
}

pub fn to_rows(figure: &Figure, effect_perf: &EffectPerf, scale: Scale) -> Vec<DataRow> {
    let dops = sampled_dops(scale);
    let mut rows = Vec::new();
    for (q_idx, (query, models)) in effect_perf.queries.iter().enumerate() {
        for (stage, model) in &models.stages {
            for (dop, actual) in dops.iter().zip(&model.actuals) {
                let category = format!("{query}@{dop}");
                rows.push(DataRow::new(
                    figure,
                    q_idx,
                    &category,
                    &format!("{}-actual", stage.name()),
                    *actual,
                ));
                rows.push(DataRow::new(
                    figure,
                    q_idx,
                    &category,
                    &format!("{}-model", stage.name()),
                    model.predict(*dop),
                ));
            }
        }
    }
    rows
}

pub fn plot(figure: &Figure, ctx: &PlotContext) -> Result<PathBuf> {
    let dops = sampled_dops(ctx.scale);
    let effect_perf = EffectPerf::from_path(&ctx.results_dir.join(EFFECT_PERF_LOG), dops.len())?;
    info!("{figure}: model building time (us): {:?}", effect_perf.fit_times_us());

    let panels = build_panels(&effect_perf, ctx.scale)?;

    let mut legend = Vec::new();
    for stage in StageKind::iter_variants() {
        let color = get_color_from_label(stage.color_label())?;
        legend.push(LegendItem::new(
            &format!("{} Actual", stage.name()),
            color,
            LegendMarker::Cross,
        ));
        legend.push(LegendItem::new(
            &format!("{} Model", stage.name()),
            color,
            LegendMarker::Line,
        ));
    }

    let plot_path = ctx.output_path(figure);
    {
        let (root, legend_area, body) = plot::new_canvas(&plot_path, (2400, 480))?;
        plot::draw_legend(&legend_area, &legend)?;
        for (area, panel) in body.split_evenly((1, panels.len())).iter().zip(&panels) {
            plot::draw_curve_panel(area, panel)?;
        }
        plot::finish_canvas(root, &plot_path)?;
    }

    if ctx.export_csv {
        ctx.export(figure, &to_rows(figure, &effect_perf, ctx.scale))?;
    }

    Ok(plot_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const EFFECT_PERF: &str = "Query 95
Time 1520
IO Stage 1
IO a: 5339.51 3.266
IO actuals: 2670 1338 894 448
Comp Stage 6
Comp a: 1361.86 101.06
Comp actuals: 782 441 328 215
Query 1
Time 880
IO Stage 2
IO a: 1466.45 b: 0.238
IO actuals: 733 367 244 122
Comp Stage 4
Comp a: 138.395 0.602
Comp actuals: 70 35 24 12
";

    #[test]
    fn test_parse_effect_perf() {
        let perf = EffectPerf::parse(Cursor::new(EFFECT_PERF), 4).unwrap();

        let io = perf.get(&Query::Q95, &StageKind::Io).unwrap();
        assert!((io.a - 5.33951).abs() < 1e-12);
        assert!((io.b - 0.003266).abs() < 1e-12);
        assert_eq!(io.actuals, vec![2.67, 1.338, 0.894, 0.448]);

        let comp = perf.get(&Query::Q95, &StageKind::Comp).unwrap();
        assert_eq!(comp.actuals.len(), 4);

        // Tolerates an explicit 'b:' marker
        let io_q1 = perf.get(&Query::Q1, &StageKind::Io).unwrap();
        assert!((io_q1.b - 0.000238).abs() < 1e-12);

        assert_eq!(
            perf.fit_times_us().into_iter().collect::<Vec<_>>(),
            vec![(Query::Q1, 880.0), (Query::Q95, 1520.0)]
        );
        assert!(perf.get(&Query::Q16, &StageKind::Io).is_err());
    }

    #[test]
    fn test_later_queries_overwrite_earlier_runs() {
        let log = "Query 16\nIO a: 1000 1000\nQuery 16\nIO a: 2000 0\n";
        let perf = EffectPerf::parse(Cursor::new(log), 4).unwrap();
        let io = perf.get(&Query::Q16, &StageKind::Io).unwrap();
        assert_eq!((io.a, io.b), (2.0, 0.0));
    }

    #[test]
    fn test_parse_errors() {
        // Too few samples for the 1T scale
        assert!(EffectPerf::parse(Cursor::new("Query 1\nIO actuals: 1 2 3 4\n"), 5).is_err());
        // Model before any query
        assert!(EffectPerf::parse(Cursor::new("IO a: 1 2\n"), 4).is_err());
        assert!(EffectPerf::parse(Cursor::new("Query 7\n"), 4).is_err());
        assert!(EffectPerf::parse(Cursor::new("Query 1\nIO a: 1\n"), 4).is_err());
    }

    #[test]
    fn test_model_prediction() {
        let model = StageModel {
            a: 12.0,
            b: 0.5,
            actuals: vec![],
        };
        assert_eq!(model.predict(4.0), 3.5);
        assert_eq!(model.predict(12.0), 1.5);
    }

    #[test]
    fn test_linspace() {
        let xs = linspace(1.0, 12.5, 80);
        assert_eq!(xs.len(), 80);
        assert_eq!(xs[0], 1.0);
        assert!((xs[79] - 12.5).abs() < 1e-12);
        assert_eq!(linspace(5.0, 125.0, 1), vec![5.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_build_panels_requires_all_queries() {
        let perf = EffectPerf::parse(Cursor::new(EFFECT_PERF), 4).unwrap();
        assert!(build_panels(&perf, Scale::TenGb).is_err());
    }

    #[test]
    fn test_build_panels_grows_axis_to_fit_measurements() {
        let mut log = String::new();
        for query in Query::iter_variants() {
            log.push_str(&format!(
                "Query {}\nIO a: 12000 0\nIO actuals: 6000 3000 2000 1000\nComp a: 0 1000\nComp actuals: 1000 1000 1000 1000\n",
                query.id()
            ));
        }
        let perf = EffectPerf::parse(Cursor::new(log), 4).unwrap();
        let panels = build_panels(&perf, Scale::TenGb).unwrap();

        assert_eq!(panels.len(), 4);
        assert_eq!(panels[0].y_axis, Axis::new(15.0, 3.0));
        assert!(panels[0].y_desc.is_some());
        assert!(panels[1].y_desc.is_none());
        assert_eq!(panels[0].series[0].points[0], (2.0, 6.0));
        assert_eq!(panels[0].series[0].curve.len(), 80);
        assert_eq!(panels[0].series[1].curve[0], (1.0, 1.0));
    }

    #[test]
    fn test_build_panels_rejects_infinite_measurements() {
        let mut log = String::new();
        for query in Query::iter_variants() {
            log.push_str(&format!(
                "Query {}\nIO a: 1 0\nIO actuals: inf 1 1 1\nComp a: 1 0\nComp actuals: 1 1 1 1\n",
                query.id()
            ));
        }
        let perf = EffectPerf::parse(Cursor::new(log), 4).unwrap();
        assert!(build_panels(&perf, Scale::TenGb).is_err());
    }
}
