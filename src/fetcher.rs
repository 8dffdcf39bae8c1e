use log::{debug, info, warn};

use crate::catalog::MatchSet;
use crate::cloudwatch::MetricsApi;
use crate::metrics::{Datapoint, DimensionQuery, MetricDescriptor, StatisticsRequest};
use crate::naming::series_name;

/// Queries statistics for each matched metric. The i-th result always belongs to the i-th metric:
/// a metric without datapoints (or with a failed query) gets an empty entry.
pub fn fetch<A: MetricsApi>(api: &A, matches: &[MetricDescriptor], request: &StatisticsRequest) -> Vec<Vec<Datapoint>> {
    let mut results = Vec::with_capacity(matches.len());

    for metric in matches {
        let datapoints = match api.query(metric, request) {
            Ok(datapoints) => {
                debug!("{metric}: {} datapoints.", datapoints.len());
                datapoints
            },
            Err(err) => {
                warn!("Failed to query {} of {metric}: {err}.", request.statistic);
                Vec::new()
            },
        };

        results.push(datapoints);
    }

    if results.iter().all(Vec::is_empty) {
        info!("Got no datapoints for {} metrics.", matches.len());
    }

    results
}

pub struct Series {
    pub metric: MetricDescriptor,
    pub name: String,
    pub datapoints: Vec<Datapoint>,
}

/// Fetched datapoints, each set labeled with the series name of the metric it was fetched for.
pub struct Fetched {
    series: Vec<Series>,
}

impl Fetched {
    pub fn new(target: &str, query: &DimensionQuery, matches: MatchSet, results: Vec<Vec<Datapoint>>) -> Fetched {
        assert_eq!(matches.len(), results.len());

        let series = matches.into_iter().zip(results).map(|(metric, datapoints)| {
            Series {
                name: series_name(target, query.values(), &metric.name),
                metric,
                datapoints,
            }
        }).collect();

        Fetched {series}
    }

    pub fn series(&self) -> &[Series] {
        &self.series
    }

    /// True when there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.series.iter().all(|series| series.datapoints.is_empty())
    }
}
