use log::{debug, info};

use crate::cloudwatch::MetricsApi;
use crate::error::Error;
use crate::metrics::{DimensionQuery, MetricDescriptor};

pub type MatchSet = Vec<MetricDescriptor>;

/// Snapshot of all metrics visible under the namespace, taken once per session.
pub struct Catalog {
    metrics: Vec<MetricDescriptor>,
}

impl Catalog {
    /// Lists the metrics and orders them by their canonical form, so the order doesn't depend on the
    /// order of the API response.
    pub fn load<A: MetricsApi>(api: &A, namespace: Option<&str>) -> Result<Catalog, Error> {
        let metrics = api.list_metrics(namespace).map_err(Error::CatalogUnavailable)?;
        let catalog = Catalog::new(metrics);

        info!("Found {} metrics{}.", catalog.len(), match namespace {
            Some(namespace) => format!(" in {namespace} namespace"),
            None => String::new(),
        });

        Ok(catalog)
    }

    pub fn new(metrics: Vec<MetricDescriptor>) -> Catalog {
        let mut metrics: Vec<_> = metrics.into_iter()
            .map(|metric| (metric.to_string(), metric))
            .collect();

        metrics.sort_by(|(a, _), (b, _)| a.cmp(b));
        metrics.dedup_by(|(a, _), (b, _)| a == b);

        Catalog {
            metrics: metrics.into_iter().map(|(_, metric)| metric).collect(),
        }
    }

    pub fn metrics(&self) -> &[MetricDescriptor] {
        &self.metrics
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    /// Selects the metrics having all the queried dimensions. Extra dimensions of a metric don't
    /// affect the result and an empty query selects everything.
    pub fn matching(&self, query: &DimensionQuery) -> Result<MatchSet, Error> {
        let matches: MatchSet = self.metrics().iter()
            .filter(|metric| query.iter().all(|(label, value)| metric.has_dimension(label, value)))
            .cloned()
            .collect();

        if matches.is_empty() {
            return Err(Error::NoMatchingMetrics);
        }

        debug!("{} of {} metrics match the dimensions.", matches.len(), self.len());
        Ok(matches)
    }
}
