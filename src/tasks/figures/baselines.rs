use crate::tasks::figures::color::get_color_from_label;
use anyhow::Result;
use plotters::prelude::RGBColor;
use std::fmt;

/// TPC-DS queries the experiments ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Query {
    Q1,
    Q16,
    Q94,
    Q95,
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Q{}", self.id())
    }
}

impl Query {
    pub fn iter_variants() -> std::slice::Iter<'static, Query> {
        static VARIANTS: [Query; 4] = [Query::Q1, Query::Q16, Query::Q94, Query::Q95];
        VARIANTS.iter()
    }

    pub fn id(&self) -> u32 {
        match self {
            Query::Q1 => 1,
            Query::Q16 => 16,
            Query::Q94 => 94,
            Query::Q95 => 95,
        }
    }

    pub fn from_id(id: u32) -> Option<Query> {
        Self::iter_variants().find(|q| q.id() == id).copied()
    }
}

/// External storage the intermediate data went through.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Storage {
    S3,
    Redis,
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Storage::S3 => write!(f, "s3"),
            Storage::Redis => write!(f, "redis"),
        }
    }
}

/// Which log(s) hold a given metric for an algorithm.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Metric {
    Jct,
    Cost,
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Metric::Jct => write!(f, "jct"),
            Metric::Cost => write!(f, "cost"),
        }
    }
}

/// Scheduling algorithms compared in the figures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Algorithm {
    Nimble,
    NimbleGroup,
    NimbleDop,
    Ditto,
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Algorithm::Nimble => write!(f, "nimble"),
            Algorithm::NimbleGroup => write!(f, "nimble-group"),
            Algorithm::NimbleDop => write!(f, "nimble-dop"),
            Algorithm::Ditto => write!(f, "ditto"),
        }
    }
}

impl Algorithm {
    pub fn iter_variants() -> std::slice::Iter<'static, Algorithm> {
        static VARIANTS: [Algorithm; 4] = [
            Algorithm::Nimble,
            Algorithm::NimbleGroup,
            Algorithm::NimbleDop,
            Algorithm::Ditto,
        ];
        VARIANTS.iter()
    }

    /// Name the scheduler uses for this algorithm when naming its logs.
    fn log_stem(&self) -> &'static str {
        match self {
            Algorithm::Nimble => "new_nimble",
            Algorithm::NimbleGroup => "new_greedy",
            Algorithm::NimbleDop => "elastic_nimble",
            Algorithm::Ditto => "elastic",
        }
    }

    /// Elastic algorithms run once optimising for JCT and once for cost, and
    /// write each run to its own log.
    pub fn has_split_logs(&self) -> bool {
        matches!(self, Algorithm::NimbleDop | Algorithm::Ditto)
    }

    /// File name of the log that holds `metric` for `query`.
    pub fn log_file_name(&self, query: &Query, storage: &Storage, metric: &Metric) -> String {
        let stem = self.log_stem();
        if self.has_split_logs() {
            format!("q{}_{storage}_{stem}_{metric}.log", query.id())
        } else {
            format!("q{}_{storage}_{stem}.log", query.id())
        }
    }

    /// Label shown in figure legends.
    pub fn legend(&self) -> &'static str {
        match self {
            Algorithm::Nimble => "NIMBLE",
            Algorithm::NimbleGroup => "NIMBLE+Group",
            Algorithm::NimbleDop => "NIMBLE+DoP",
            Algorithm::Ditto => "Ditto",
        }
    }

    pub fn get_color(&self) -> Result<RGBColor> {
        get_color_from_label(&format!("{self}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_round_trip_from_id() {
        for query in Query::iter_variants() {
            assert_eq!(Query::from_id(query.id()), Some(*query));
        }
        assert_eq!(Query::from_id(2), None);
        assert_eq!(format!("{}", Query::Q16), "Q16");
    }

    #[test]
    fn test_log_file_names() {
        assert_eq!(
            Algorithm::Nimble.log_file_name(&Query::Q1, &Storage::S3, &Metric::Jct),
            "q1_s3_new_nimble.log"
        );
        assert_eq!(
            Algorithm::Ditto.log_file_name(&Query::Q95, &Storage::Redis, &Metric::Cost),
            "q95_redis_elastic_cost.log"
        );
        assert_eq!(
            Algorithm::NimbleDop.log_file_name(&Query::Q16, &Storage::S3, &Metric::Jct),
            "q16_s3_elastic_nimble_jct.log"
        );
        assert_eq!(
            Algorithm::NimbleGroup.log_file_name(&Query::Q94, &Storage::S3, &Metric::Cost),
            "q94_s3_new_greedy.log"
        );
    }

    #[test]
    fn test_every_algorithm_has_a_color() {
        for algorithm in Algorithm::iter_variants() {
            assert!(algorithm.get_color().is_ok());
        }
    }
}
