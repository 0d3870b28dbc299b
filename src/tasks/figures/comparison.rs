//! Grouped bar charts comparing schedulers on JCT and cost (fig8, fig9,
//! fig10, fig12).

use crate::tasks::figures::{
    baselines::{Algorithm, Metric, Query, Storage},
    export::DataRow,
    logs::ResultSet,
    plot::{self, Axis, BarPanel, BarSeries, LegendItem, LegendMarker},
    scale::Scale,
    Figure, PlotContext,
};
use anyhow::Result;
use log::{error, info};
use std::path::PathBuf;

/// One bar group: the value of every algorithm for a query under a given
/// resource distribution.
#[derive(Clone, Debug, PartialEq)]
pub struct Cell {
    pub query: Query,
    pub resource: &'static str,
    pub label: &'static str,
}

impl Cell {
    fn new(query: Query, resource: &'static str, label: &'static str) -> Cell {
        Cell {
            query,
            resource,
            label,
        }
    }
}

#[derive(Clone, Debug)]
pub struct PanelLayout {
    pub cells: Vec<Cell>,
    pub metric: Metric,
    /// Divide every value by the baseline algorithm's value
    pub normalize: bool,
    pub y_desc: Option<&'static str>,
    pub y_axis: Axis,
}

#[derive(Clone, Debug)]
pub struct ComparisonLayout {
    pub storage: Storage,
    /// Algorithms in the order their bars are drawn
    pub algorithms: Vec<Algorithm>,
    pub baseline: Algorithm,
    pub panels: Vec<PanelLayout>,
}

const SKEWED: &str = "zipf-0.9";

fn queries_panel(metric: Metric, normalize: bool, y_desc: &'static str, y_axis: Axis) -> PanelLayout {
    PanelLayout {
        cells: vec![
            Cell::new(Query::Q1, SKEWED, "Q1"),
            Cell::new(Query::Q16, SKEWED, "Q16"),
            Cell::new(Query::Q94, SKEWED, "Q94"),
            Cell::new(Query::Q95, SKEWED, "Q95"),
        ],
        metric,
        normalize,
        y_desc: Some(y_desc),
        y_axis,
    }
}

/// Q95 under different resource distributions: the share of uniformly
/// available resources, then skewed distributions.
fn q95_distribution_panels(metric: Metric, normalize: bool, y_axis: Axis) -> [PanelLayout; 2] {
    [
        PanelLayout {
            cells: vec![
                Cell::new(Query::Q95, "uniform-1", "100%"),
                Cell::new(Query::Q95, "uniform-75", "75%"),
                Cell::new(Query::Q95, "uniform-50", "50%"),
                Cell::new(Query::Q95, "uniform-25", "25%"),
            ],
            metric,
            normalize,
            y_desc: None,
            y_axis,
        },
        PanelLayout {
            cells: vec![
                Cell::new(Query::Q95, "norm-1.0", "Norm-1.0"),
                Cell::new(Query::Q95, "norm-0.8", "Norm-0.8"),
                Cell::new(Query::Q95, "zipf-0.9", "Zipf-0.9"),
                Cell::new(Query::Q95, "zipf-0.99", "Zipf-0.99"),
            ],
            metric,
            normalize,
            y_desc: None,
            y_axis,
        },
    ]
}

const NORMALIZED_COST_AXIS: Axis = Axis::new(2.0, 0.5);

pub fn layout_for(figure: &Figure, scale: Scale) -> Option<ComparisonLayout> {
    let head_to_head = vec![Algorithm::Ditto, Algorithm::Nimble];

    match figure {
        Figure::Fig8 => {
            let y_axis = if scale.is_large() {
                Axis::new(1000.0, 200.0)
            } else {
                Axis::new(40.0, 10.0)
            };
            let [uniform, skewed] = q95_distribution_panels(Metric::Jct, false, y_axis);
            Some(ComparisonLayout {
                storage: Storage::S3,
                algorithms: head_to_head,
                baseline: Algorithm::Ditto,
                panels: vec![
                    queries_panel(Metric::Jct, false, "JCT (s)", y_axis),
                    uniform,
                    skewed,
                ],
            })
        }
        Figure::Fig9 => {
            let [uniform, skewed] =
                q95_distribution_panels(Metric::Cost, true, NORMALIZED_COST_AXIS);
            Some(ComparisonLayout {
                storage: Storage::S3,
                algorithms: head_to_head,
                baseline: Algorithm::Ditto,
                panels: vec![
                    queries_panel(Metric::Cost, true, "Normalized Cost", NORMALIZED_COST_AXIS),
                    uniform,
                    skewed,
                ],
            })
        }
        Figure::Fig10 => {
            let jct_axis = if scale.is_large() {
                Axis::new(200.0, 50.0)
            } else {
                Axis::new(40.0, 10.0)
            };
            Some(ComparisonLayout {
                storage: Storage::Redis,
                algorithms: head_to_head,
                baseline: Algorithm::Ditto,
                panels: vec![
                    queries_panel(Metric::Jct, false, "JCT (s)", jct_axis),
                    queries_panel(Metric::Cost, true, "Normalized Cost", NORMALIZED_COST_AXIS),
                ],
            })
        }
        Figure::Fig12 => {
            let jct_axis = if scale.is_large() {
                Axis::new(1000.0, 200.0)
            } else {
                Axis::new(90.0, 10.0)
            };
            Some(ComparisonLayout {
                storage: Storage::S3,
                algorithms: vec![
                    Algorithm::Nimble,
                    Algorithm::NimbleGroup,
                    Algorithm::NimbleDop,
                    Algorithm::Ditto,
                ],
                baseline: Algorithm::Ditto,
                panels: vec![
                    queries_panel(Metric::Jct, false, "JCT (s)", jct_axis),
                    queries_panel(Metric::Cost, true, "Normalized Cost", NORMALIZED_COST_AXIS),
                ],
            })
        }
        _ => None,
    }
}

/// Values of one panel, per algorithm, in cell order.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelValues {
    pub categories: Vec<String>,
    pub series: Vec<(Algorithm, Vec<f64>)>,
}

impl PanelValues {
    pub fn values(&self, algorithm: &Algorithm) -> Option<&[f64]> {
        self.series
            .iter()
            .find(|(a, _)| a == algorithm)
            .map(|(_, values)| values.as_slice())
    }

    /// Replace every value by its ratio to the baseline algorithm's value in
    /// the same cell. Baseline values become 1.
    pub fn normalize(&mut self, baseline: &Algorithm) -> Result<()> {
        let reference: Vec<f64> = match self.values(baseline) {
            Some(values) => values.to_vec(),
            None => {
                let reason = format!("baseline {baseline} missing from panel");
                error!("{reason}");
                anyhow::bail!(reason);
            }
        };

        if let Some(idx) = reference.iter().position(|v| *v == 0.0) {
            let reason = format!(
                "cannot normalize by a zero {baseline} value (category={})",
                self.categories[idx]
            );
            error!("{reason}");
            anyhow::bail!(reason);
        }

        for (_, values) in self.series.iter_mut() {
            for (value, reference) in values.iter_mut().zip(&reference) {
                *value /= reference;
            }
        }

        Ok(())
    }
}

pub fn build_table(layout: &ComparisonLayout, results: &ResultSet) -> Result<Vec<PanelValues>> {
    let mut panels = Vec::with_capacity(layout.panels.len());

    for panel_layout in &layout.panels {
        let mut series = Vec::with_capacity(layout.algorithms.len());
        for algorithm in &layout.algorithms {
            let values = panel_layout
                .cells
                .iter()
                .map(|cell| results.metric(algorithm, &cell.query, cell.resource, &panel_layout.metric))
                .collect::<Result<Vec<f64>>>()?;
            series.push((*algorithm, values));
        }

        let mut panel = PanelValues {
            categories: panel_layout.cells.iter().map(|c| c.label.to_string()).collect(),
            series,
        };
        if panel_layout.normalize {
            panel.normalize(&layout.baseline)?;
        }
        panels.push(panel);
    }

    Ok(panels)
}

pub fn to_rows(figure: &Figure, panels: &[PanelValues]) -> Vec<DataRow> {
    panels
        .iter()
        .enumerate()
        .flat_map(|(p_idx, panel)| {
            panel.series.iter().flat_map(move |(algorithm, values)| {
                panel
                    .categories
                    .iter()
                    .zip(values)
                    .map(move |(category, value)| {
                        DataRow::new(figure, p_idx, category, &format!("{algorithm}"), *value)
                    })
            })
        })
        .collect()
}

pub fn plot(figure: &Figure, ctx: &PlotContext) -> Result<PathBuf> {
    let layout = match layout_for(figure, ctx.scale) {
        Some(layout) => layout,
        None => {
            let reason = format!("{figure} is not a comparison figure");
            error!("{reason}");
            anyhow::bail!(reason);
        }
    };

    let results = ResultSet::load(&ctx.results_dir, layout.storage, &layout.algorithms)?;
    if layout.algorithms.contains(&Algorithm::Ditto) {
        info!(
            "{figure}: schedule time (us): {:?}",
            results.sched_times_us(&Algorithm::Ditto)
        );
    }

    let table = build_table(&layout, &results)?;

    let mut bar_panels = Vec::with_capacity(table.len());
    for (panel_layout, values) in layout.panels.iter().zip(&table) {
        let mut series = Vec::with_capacity(values.series.len());
        for (algorithm, values) in &values.series {
            series.push(BarSeries {
                label: algorithm.legend().to_string(),
                color: algorithm.get_color()?,
                values: values.clone(),
            });
        }
        bar_panels.push(BarPanel {
            categories: values.categories.clone(),
            series,
            y_desc: panel_layout.y_desc.map(str::to_string),
            y_axis: panel_layout.y_axis,
        });
    }

    let mut legend = Vec::with_capacity(layout.algorithms.len());
    for algorithm in &layout.algorithms {
        legend.push(LegendItem::new(
            algorithm.legend(),
            algorithm.get_color()?,
            LegendMarker::Box,
        ));
    }

    let plot_path = ctx.output_path(figure);
    {
        let (root, legend_area, body) =
            plot::new_canvas(&plot_path, (700 * bar_panels.len() as u32, 420))?;
        plot::draw_legend(&legend_area, &legend)?;
        for (area, panel) in body.split_evenly((1, bar_panels.len())).iter().zip(&bar_panels) {
            plot::draw_bar_panel(area, panel)?;
        }
        plot::finish_canvas(root, &plot_path)?;
    }

    if ctx.export_csv {
        ctx.export(figure, &to_rows(figure, &table))?;
    }

    Ok(plot_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::figures::logs::{QueryResults, RunLog};
    use std::io::Cursor;

    fn results_from(logs: &[(Algorithm, Query, &str)]) -> ResultSet {
        let mut results = ResultSet::default();
        for (algorithm, query, log) in logs {
            let run_log = RunLog::parse(Cursor::new(*log)).unwrap();
            results.insert(*algorithm, *query, QueryResults::from_single_log(run_log));
        }
        results
    }

    fn zipf_log(jct_ms: f64, cost: f64) -> String {
        format!("Resource: zipf-0.9\nJCT: {jct_ms}\nCost: {cost}\n")
    }

    const RESOURCES: [&str; 8] = [
        "zipf-0.9",
        "zipf-0.99",
        "uniform-1",
        "uniform-75",
        "uniform-50",
        "uniform-25",
        "norm-1.0",
        "norm-0.8",
    ];

    fn every_resource_log(jct_ms: f64, cost: f64) -> String {
        RESOURCES
            .iter()
            .map(|r| format!("Resource: {r}\nJCT: {jct_ms}\nCost: {cost}\n"))
            .collect()
    }

    #[test]
    fn test_fig12_ratios_against_ditto() {
        let per_algorithm = [
            (Algorithm::Nimble, 60000.0, 300.0),
            (Algorithm::NimbleGroup, 50000.0, 250.0),
            (Algorithm::NimbleDop, 40000.0, 220.0),
            (Algorithm::Ditto, 30000.0, 200.0),
        ];
        let logs: Vec<(Algorithm, Query, String)> = Query::iter_variants()
            .flat_map(|q| {
                per_algorithm
                    .iter()
                    .map(move |(a, jct, cost)| (*a, *q, zipf_log(*jct, *cost)))
            })
            .collect();
        let logs: Vec<(Algorithm, Query, &str)> =
            logs.iter().map(|(a, q, l)| (*a, *q, l.as_str())).collect();
        let results = results_from(&logs);

        let layout = layout_for(&Figure::Fig12, Scale::TenGb).unwrap();
        let table = build_table(&layout, &results).unwrap();

        assert_eq!(table.len(), 2);
        let order: Vec<Algorithm> = table[1].series.iter().map(|(a, _)| *a).collect();
        assert_eq!(
            order,
            vec![
                Algorithm::Nimble,
                Algorithm::NimbleGroup,
                Algorithm::NimbleDop,
                Algorithm::Ditto
            ]
        );
        assert_eq!(table[0].values(&Algorithm::NimbleGroup).unwrap(), &[50.0; 4]);
        assert_eq!(table[1].values(&Algorithm::Nimble).unwrap(), &[1.5; 4]);
        assert_eq!(table[1].values(&Algorithm::NimbleGroup).unwrap(), &[1.25; 4]);
        assert_eq!(table[1].values(&Algorithm::NimbleDop).unwrap(), &[1.1; 4]);
        assert_eq!(table[1].values(&Algorithm::Ditto).unwrap(), &[1.0; 4]);
    }

    #[test]
    fn test_fig8_and_fig9_values() {
        let logs: Vec<(Algorithm, Query, String)> = Query::iter_variants()
            .flat_map(|q| {
                [
                    (Algorithm::Ditto, *q, every_resource_log(20000.0, 400.0)),
                    (Algorithm::Nimble, *q, every_resource_log(35000.0, 100.0)),
                ]
            })
            .collect();
        let logs: Vec<(Algorithm, Query, &str)> =
            logs.iter().map(|(a, q, l)| (*a, *q, l.as_str())).collect();
        let results = results_from(&logs);

        let fig8 = build_table(&layout_for(&Figure::Fig8, Scale::TenGb).unwrap(), &results).unwrap();
        assert_eq!(fig8.len(), 3);
        assert_eq!(fig8[1].categories, vec!["100%", "75%", "50%", "25%"]);
        assert_eq!(fig8[2].categories, vec!["Norm-1.0", "Norm-0.8", "Zipf-0.9", "Zipf-0.99"]);
        for panel in &fig8 {
            assert_eq!(panel.values(&Algorithm::Ditto).unwrap(), &[20.0; 4]);
            assert_eq!(panel.values(&Algorithm::Nimble).unwrap(), &[35.0; 4]);
        }

        let fig9 = build_table(&layout_for(&Figure::Fig9, Scale::TenGb).unwrap(), &results).unwrap();
        for panel in &fig9 {
            assert_eq!(panel.values(&Algorithm::Ditto).unwrap(), &[1.0; 4]);
            assert_eq!(panel.values(&Algorithm::Nimble).unwrap(), &[0.25; 4]);
        }
    }

    #[test]
    fn test_normalize_divides_by_baseline() {
        let mut panel = PanelValues {
            categories: vec!["Q1".to_string(), "Q16".to_string()],
            series: vec![
                (Algorithm::Ditto, vec![2.0, 4.0]),
                (Algorithm::Nimble, vec![3.0, 2.0]),
            ],
        };

        panel.normalize(&Algorithm::Ditto).unwrap();
        assert_eq!(panel.values(&Algorithm::Ditto).unwrap(), &[1.0, 1.0]);
        assert_eq!(panel.values(&Algorithm::Nimble).unwrap(), &[1.5, 0.5]);
    }

    #[test]
    fn test_normalize_rejects_zero_or_missing_baseline() {
        let mut panel = PanelValues {
            categories: vec!["Q1".to_string()],
            series: vec![(Algorithm::Ditto, vec![0.0]), (Algorithm::Nimble, vec![3.0])],
        };
        assert!(panel.normalize(&Algorithm::Ditto).is_err());
        assert!(panel.normalize(&Algorithm::NimbleDop).is_err());
    }

    #[test]
    fn test_fig10_table_normalizes_only_cost_panel() {
        let logs: Vec<(Algorithm, Query, String)> = Query::iter_variants()
            .flat_map(|q| {
                let id = q.id() as f64;
                [
                    (Algorithm::Ditto, *q, zipf_log(id * 1000.0, 100.0)),
                    (Algorithm::Nimble, *q, zipf_log(id * 2000.0, 150.0)),
                ]
            })
            .collect();
        let logs: Vec<(Algorithm, Query, &str)> =
            logs.iter().map(|(a, q, l)| (*a, *q, l.as_str())).collect();
        let results = results_from(&logs);

        let layout = layout_for(&Figure::Fig10, Scale::TenGb).unwrap();
        assert_eq!(layout.storage, Storage::Redis);
        let table = build_table(&layout, &results).unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table[0].categories, vec!["Q1", "Q16", "Q94", "Q95"]);
        assert_eq!(
            table[0].values(&Algorithm::Ditto).unwrap(),
            &[1.0, 16.0, 94.0, 95.0]
        );
        assert_eq!(
            table[0].values(&Algorithm::Nimble).unwrap(),
            &[2.0, 32.0, 188.0, 190.0]
        );
        assert_eq!(table[1].values(&Algorithm::Ditto).unwrap(), &[1.0; 4]);
        assert_eq!(table[1].values(&Algorithm::Nimble).unwrap(), &[1.5; 4]);

        let rows = to_rows(&Figure::Fig10, &table);
        assert_eq!(rows.len(), 16);
        assert_eq!(rows[0].series, "ditto");
        assert_eq!(rows[0].category, "Q1");
    }

    #[test]
    fn test_fig8_needs_every_distribution() {
        let results = results_from(&[(Algorithm::Ditto, Query::Q95, "Resource: zipf-0.9\nJCT: 1\n")]);
        let layout = layout_for(&Figure::Fig8, Scale::TenGb).unwrap();
        assert!(build_table(&layout, &results).is_err());
    }

    #[test]
    fn test_layouts_follow_scale() {
        let small = layout_for(&Figure::Fig8, Scale::TenGb).unwrap();
        let large = layout_for(&Figure::Fig8, Scale::OneTb).unwrap();
        assert_eq!(small.panels[0].y_axis, Axis::new(40.0, 10.0));
        assert_eq!(large.panels[0].y_axis, Axis::new(1000.0, 200.0));
        assert_eq!(small.panels.len(), 3);
        assert_eq!(small.panels[1].cells[0].resource, "uniform-1");

        let fig9 = layout_for(&Figure::Fig9, Scale::OneTb).unwrap();
        assert!(fig9.panels.iter().all(|p| p.normalize));

        let fig12 = layout_for(&Figure::Fig12, Scale::TenGb).unwrap();
        assert_eq!(fig12.algorithms.len(), 4);
        assert_eq!(fig12.algorithms.last(), Some(&Algorithm::Ditto));

        assert!(layout_for(&Figure::Fig11, Scale::TenGb).is_none());
    }
}
