//! Parsing of the per-run scheduler logs (`q{N}_{storage}_{algorithm}.log`).
//!
//! Every scheduler run appends a block of keyword-tagged lines:
//!
//! ```text
//! Resource: zipf-0.9
//! Sched_time: 1234
//! JCT: 222260
//! Cost: 2708.5
//! ```
//!
//! JCT is logged in milliseconds and kept in seconds. Scheduling time is
//! logged in microseconds and kept as-is.

use crate::tasks::figures::baselines::{Algorithm, Metric, Query, Storage};
use anyhow::{Context, Result};
use log::{debug, error};
use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Metrics {
    /// Job completion time in seconds
    pub jct: Option<f64>,
    pub cost: Option<f64>,
}

impl Metrics {
    pub fn get(&self, metric: &Metric) -> Option<f64> {
        match metric {
            Metric::Jct => self.jct,
            Metric::Cost => self.cost,
        }
    }
}

/// Everything a single log file contributes.
#[derive(Debug, Default, PartialEq)]
pub struct RunLog {
    /// Metrics keyed by resource distribution label
    pub entries: BTreeMap<String, Metrics>,
    /// Scheduling times in microseconds, in log order
    pub sched_times_us: Vec<f64>,
}

fn parse_value(token: Option<&str>, keyword: &str, line_no: usize) -> Result<f64> {
    let token = token.ok_or_else(|| {
        anyhow::anyhow!("missing value after '{keyword}' (line={line_no})")
    })?;
    token
        .parse::<f64>()
        .with_context(|| format!("bad value after '{keyword}' (line={line_no}, value={token})"))
}

impl RunLog {
    pub fn parse<R: BufRead>(reader: R) -> Result<RunLog> {
        let mut run_log = RunLog::default();
        let mut current: Option<String> = None;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = idx + 1;
            let mut tokens = line.split_whitespace();

            let keyword = match tokens.next() {
                Some(keyword) => keyword,
                None => continue,
            };

            match keyword {
                "Resource:" => {
                    let label = tokens.next().ok_or_else(|| {
                        anyhow::anyhow!("missing label after 'Resource:' (line={line_no})")
                    })?;
                    // A new run starts from scratch, even for a label seen before
                    run_log.entries.insert(label.to_string(), Metrics::default());
                    current = Some(label.to_string());
                }
                "Sched_time:" => {
                    run_log
                        .sched_times_us
                        .push(parse_value(tokens.next(), keyword, line_no)?);
                }
                "JCT:" | "Cost:" => {
                    let value = parse_value(tokens.next(), keyword, line_no)?;
                    let label = current.as_ref().ok_or_else(|| {
                        anyhow::anyhow!("'{keyword}' before any 'Resource:' line (line={line_no})")
                    })?;
                    // The entry is always created when its label is selected
                    let entry = run_log.entries.entry(label.clone()).or_default();
                    if keyword == "JCT:" {
                        entry.jct = Some(value / 1000.0);
                    } else {
                        entry.cost = Some(value);
                    }
                }
                _ => debug!("ignoring line {line_no}: {line}"),
            }
        }

        Ok(run_log)
    }

    pub fn from_path(path: &Path) -> Result<RunLog> {
        let file = File::open(path).map_err(|e| {
            let reason = format!("error opening log (path={}, error={e:?})", path.display());
            error!("{reason}");
            anyhow::anyhow!(reason)
        })?;

        Self::parse(BufReader::new(file))
            .with_context(|| format!("error parsing log (path={})", path.display()))
    }

    pub fn metric(&self, resource: &str, metric: &Metric) -> Option<f64> {
        self.entries.get(resource).and_then(|m| m.get(metric))
    }
}

/// Results of one algorithm on one query, merged across its log files.
#[derive(Debug, Default, PartialEq)]
pub struct QueryResults {
    pub entries: BTreeMap<String, Metrics>,
    pub sched_times_us: Vec<f64>,
}

impl QueryResults {
    /// Take the JCT from `jct_log` and the cost from `cost_log`. Labels that
    /// only show up in the cost log are kept too.
    pub fn from_split_logs(jct_log: RunLog, cost_log: RunLog) -> QueryResults {
        let mut entries: BTreeMap<String, Metrics> = jct_log
            .entries
            .into_iter()
            .map(|(label, m)| {
                (
                    label,
                    Metrics {
                        jct: m.jct,
                        cost: None,
                    },
                )
            })
            .collect();

        for (label, m) in cost_log.entries {
            entries.entry(label).or_default().cost = m.cost;
        }

        let mut sched_times_us = jct_log.sched_times_us;
        sched_times_us.extend(cost_log.sched_times_us);

        QueryResults {
            entries,
            sched_times_us,
        }
    }

    pub fn from_single_log(log: RunLog) -> QueryResults {
        QueryResults {
            entries: log.entries,
            sched_times_us: log.sched_times_us,
        }
    }
}

/// All run logs needed by a figure, keyed by algorithm and query.
#[derive(Debug, Default)]
pub struct ResultSet {
    results: BTreeMap<(Algorithm, Query), QueryResults>,
}

impl ResultSet {
    pub fn load(results_dir: &Path, storage: Storage, algorithms: &[Algorithm]) -> Result<ResultSet> {
        let mut result_set = ResultSet::default();

        for algorithm in algorithms {
            for query in Query::iter_variants() {
                let log_path =
                    |metric: Metric| results_dir.join(algorithm.log_file_name(query, &storage, &metric));

                let query_results = if algorithm.has_split_logs() {
                    QueryResults::from_split_logs(
                        RunLog::from_path(&log_path(Metric::Jct))?,
                        RunLog::from_path(&log_path(Metric::Cost))?,
                    )
                } else {
                    QueryResults::from_single_log(RunLog::from_path(&log_path(Metric::Jct))?)
                };
                debug!(
                    "loaded {algorithm}/{query}/{storage}: {} resource distributions",
                    query_results.entries.len()
                );

                result_set.insert(*algorithm, *query, query_results);
            }
        }

        Ok(result_set)
    }

    pub fn insert(&mut self, algorithm: Algorithm, query: Query, results: QueryResults) {
        self.results.insert((algorithm, query), results);
    }

    pub fn metric(
        &self,
        algorithm: &Algorithm,
        query: &Query,
        resource: &str,
        metric: &Metric,
    ) -> Result<f64> {
        self.results
            .get(&(*algorithm, *query))
            .and_then(|r| r.entries.get(resource))
            .and_then(|m| m.get(metric))
            .ok_or_else(|| {
                let reason = format!(
                    "no {metric} value for {algorithm} on {query} (resource={resource})"
                );
                error!("{reason}");
                anyhow::anyhow!(reason)
            })
    }

    /// Scheduling times (us) of `algorithm` across all queries, in query
    /// order.
    pub fn sched_times_us(&self, algorithm: &Algorithm) -> Vec<f64> {
        self.results
            .iter()
            .filter(|((a, _), _)| a == algorithm)
            .flat_map(|(_, r)| r.sched_times_us.iter().copied())
            .collect()
    }
}
