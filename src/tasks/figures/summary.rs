//! Numbers behind the figures, without drawing them: Ditto's scheduling
//! overhead, the model-building time, and the JCT/cost tables.

use crate::tasks::figures::{
    baselines::{Algorithm, Storage},
    comparison::{self, PanelValues},
    dop::{sampled_dops, EffectPerf, QueryModels, EFFECT_PERF_LOG},
    logs::ResultSet,
    Figure, PlotContext,
};
use anyhow::Result;
use log::{error, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, PartialEq, Serialize)]
pub struct PanelTable {
    pub categories: Vec<String>,
    /// Values per algorithm, in category order
    pub series: BTreeMap<String, Vec<f64>>,
}

impl From<&PanelValues> for PanelTable {
    fn from(values: &PanelValues) -> PanelTable {
        PanelTable {
            categories: values.categories.clone(),
            series: values
                .series
                .iter()
                .map(|(algorithm, values)| (format!("{algorithm}"), values.clone()))
                .collect(),
        }
    }
}

#[derive(Debug, PartialEq, Serialize)]
pub struct FigureTable {
    pub figure: String,
    pub panels: Vec<PanelTable>,
}

#[derive(Debug, Default, Serialize)]
pub struct Summary {
    pub scale: String,
    /// Ditto's scheduling times (us), per storage backend
    pub sched_times_us: BTreeMap<String, Vec<f64>>,
    /// Model-building time (us), per query
    pub fit_times_us: BTreeMap<String, f64>,
    pub models: BTreeMap<String, QueryModels>,
    pub tables: Vec<FigureTable>,
}

impl Summary {
    fn is_empty(&self) -> bool {
        self.sched_times_us.is_empty() && self.models.is_empty() && self.tables.is_empty()
    }
}

/// Gather whatever the results directory has. Missing inputs only skip the
/// section they feed.
pub fn collect(ctx: &PlotContext) -> Result<Summary> {
    let mut summary = Summary {
        scale: format!("{}", ctx.scale),
        ..Default::default()
    };

    for storage in [Storage::S3, Storage::Redis] {
        match ResultSet::load(&ctx.results_dir, storage, &[Algorithm::Ditto]) {
            Ok(results) => {
                summary.sched_times_us.insert(
                    format!("{storage}"),
                    results.sched_times_us(&Algorithm::Ditto),
                );
            }
            Err(e) => warn!("skipping {storage} schedule times: {e:#}"),
        }
    }

    let effect_perf_path = ctx.results_dir.join(EFFECT_PERF_LOG);
    match EffectPerf::from_path(&effect_perf_path, sampled_dops(ctx.scale).len()) {
        Ok(effect_perf) => {
            for (query, time) in effect_perf.fit_times_us() {
                summary.fit_times_us.insert(format!("{query}"), time);
            }
            for (query, models) in effect_perf.queries {
                summary.models.insert(format!("{query}"), models);
            }
        }
        Err(e) => warn!("skipping model summary: {e:#}"),
    }

    for figure in Figure::iter_variants() {
        let layout = match comparison::layout_for(figure, ctx.scale) {
            Some(layout) => layout,
            None => continue,
        };

        let table = ResultSet::load(&ctx.results_dir, layout.storage, &layout.algorithms)
            .and_then(|results| comparison::build_table(&layout, &results));
        match table {
            Ok(panels) => summary.tables.push(FigureTable {
                figure: format!("{figure}"),
                panels: panels.iter().map(PanelTable::from).collect(),
            }),
            Err(e) => warn!("skipping {figure} table: {e:#}"),
        }
    }

    if summary.is_empty() {
        let reason = format!(
            "no results found to summarise (dir={})",
            ctx.results_dir.display()
        );
        error!("{reason}");
        anyhow::bail!(reason);
    }

    Ok(summary)
}

fn log_summary(summary: &Summary) {
    info!("results at scale: {}", summary.scale);
    for (storage, times) in &summary.sched_times_us {
        info!("ditto schedule time on {storage} (us): {times:?}");
    }
    for (query, time) in &summary.fit_times_us {
        info!("{query}: model building time (us): {time}");
    }
    for (query, models) in &summary.models {
        for (stage, model) in &models.stages {
            info!("{query}/{stage:?}: a={} b={}", model.a, model.b);
        }
    }
    for table in &summary.tables {
        for (p_idx, panel) in table.panels.iter().enumerate() {
            info!("{} panel {p_idx}: {:?}", table.figure, panel.categories);
            for (algorithm, values) in &panel.series {
                info!("  {algorithm}: {values:?}");
            }
        }
    }
}

pub fn run(ctx: &PlotContext, json: bool) -> Result<()> {
    let summary = collect(ctx)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        log_summary(&summary);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::figures::{
        baselines::{Metric, Query},
        scale::Scale,
    };
    use std::{fs, path::Path};

    fn write_redis_logs(dir: &Path) {
        for query in Query::iter_variants() {
            let nimble = Algorithm::Nimble.log_file_name(query, &Storage::Redis, &Metric::Jct);
            fs::write(
                dir.join(nimble),
                "Resource: zipf-0.9\nSched_time: 80\nJCT: 20000\nCost: 300\n",
            )
            .unwrap();

            let jct = Algorithm::Ditto.log_file_name(query, &Storage::Redis, &Metric::Jct);
            fs::write(
                dir.join(jct),
                "Resource: zipf-0.9\nSched_time: 150\nJCT: 10000\nCost: 999\n",
            )
            .unwrap();
            let cost = Algorithm::Ditto.log_file_name(query, &Storage::Redis, &Metric::Cost);
            fs::write(
                dir.join(cost),
                "Resource: zipf-0.9\nSched_time: 160\nJCT: 99000\nCost: 200\n",
            )
            .unwrap();
        }
    }

    fn context(dir: &Path) -> PlotContext {
        PlotContext {
            results_dir: dir.to_path_buf(),
            scale: Scale::TenGb,
            seed: None,
            export_csv: false,
        }
    }

    #[test]
    fn test_collect_skips_missing_inputs() {
        let dir = tempfile::tempdir().unwrap();
        write_redis_logs(dir.path());

        let summary = collect(&context(dir.path())).unwrap();

        assert_eq!(summary.scale, "10G");
        assert!(!summary.sched_times_us.contains_key("s3"));
        assert_eq!(summary.sched_times_us["redis"].len(), 8);
        assert!(summary.models.is_empty());

        assert_eq!(summary.tables.len(), 1);
        let fig10 = &summary.tables[0];
        assert_eq!(fig10.figure, "fig10");
        assert_eq!(fig10.panels[0].series["ditto"], vec![10.0; 4]);
        assert_eq!(fig10.panels[0].series["nimble"], vec![20.0; 4]);
        assert_eq!(fig10.panels[1].series["ditto"], vec![1.0; 4]);
        assert_eq!(fig10.panels[1].series["nimble"], vec![1.5; 4]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["tables"][0]["figure"], "fig10");
    }

    #[test]
    fn test_collect_fails_on_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(collect(&context(dir.path())).is_err());
    }
}
