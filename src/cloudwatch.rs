use aws_config::BehaviorVersion;
use aws_credential_types::provider::ProvideCredentials;
use aws_sdk_cloudwatch::Client;
use aws_sdk_cloudwatch::config::Region;
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;
use aws_sdk_cloudwatch::types::{
    Datapoint as AwsDatapoint, Dimension, Metric as AwsMetric, StandardUnit, Statistic as AwsStatistic};
use chrono::{DateTime, Utc};
use log::{debug, warn};
use tokio::runtime::{Builder, Runtime};

use crate::core::{GenericError, GenericResult};
use crate::error::Error;
use crate::metrics::{Datapoint, MetricDescriptor, Statistic, StatisticsRequest};

/// The hosted metrics API as seen by the pipeline.
pub trait MetricsApi {
    fn list_metrics(&self, namespace: Option<&str>) -> GenericResult<Vec<MetricDescriptor>>;
    fn query(&self, metric: &MetricDescriptor, request: &StatisticsRequest) -> GenericResult<Vec<Datapoint>>;
}

/// Blocking CloudWatch client: every call runs to completion on a private current-thread runtime.
pub struct CloudWatch {
    runtime: Runtime,
    client: Client,
}

impl CloudWatch {
    pub fn new(region: &str) -> GenericResult<CloudWatch> {
        let runtime = Builder::new_current_thread().enable_all().build().map_err(|e| format!(
            "Failed to create async runtime: {e}"))?;

        let config = runtime.block_on(
            aws_config::defaults(BehaviorVersion::latest())
                .region(Region::new(region.to_owned()))
                .load());

        let Some(credentials) = config.credentials_provider() else {
            return Err(Error::Credentials("no credentials provider is configured".into()).into());
        };
        runtime.block_on(credentials.provide_credentials()).map_err(|e| {
            Error::Credentials(DisplayErrorContext(e).to_string().into())
        })?;

        debug!("Connected to CloudWatch in {region}.");

        Ok(CloudWatch {
            client: Client::new(&config),
            runtime,
        })
    }
}

impl MetricsApi for CloudWatch {
    fn list_metrics(&self, namespace: Option<&str>) -> GenericResult<Vec<MetricDescriptor>> {
        self.runtime.block_on(async {
            let mut metrics = Vec::new();
            let mut next_token = None;

            loop {
                let output = self.client.list_metrics()
                    .set_namespace(namespace.map(ToOwned::to_owned))
                    .set_next_token(next_token)
                    .send().await
                    .map_err(|e| DisplayErrorContext(e).to_string())?;

                metrics.extend(output.metrics().iter().filter_map(convert_metric));

                next_token = output.next_token().map(ToOwned::to_owned);
                if next_token.is_none() {
                    break;
                }
            }

            Ok::<_, GenericError>(metrics)
        })
    }

    fn query(&self, metric: &MetricDescriptor, request: &StatisticsRequest) -> GenericResult<Vec<Datapoint>> {
        let dimensions = request_dimensions(metric);

        let statistic = match request.statistic {
            Statistic::Minimum => AwsStatistic::Minimum,
            Statistic::Maximum => AwsStatistic::Maximum,
            Statistic::Sum => AwsStatistic::Sum,
            Statistic::Average => AwsStatistic::Average,
            Statistic::SampleCount => AwsStatistic::SampleCount,
        };

        let output = self.runtime.block_on(
            self.client.get_metric_statistics()
                .set_namespace(metric.namespace.clone())
                .metric_name(&metric.name)
                .set_dimensions(Some(dimensions))
                .start_time(to_aws_time(request.start))
                .end_time(to_aws_time(request.end))
                .period(request.period)
                .statistics(statistic)
                .set_unit(request.unit.as_deref().map(StandardUnit::from))
                .send()
        ).map_err(|e| DisplayErrorContext(e).to_string())?;

        Ok(output.datapoints().iter()
            .filter_map(|point| convert_datapoint(point, request.statistic))
            .collect())
    }
}

fn convert_metric(metric: &AwsMetric) -> Option<MetricDescriptor> {
    let name = metric.metric_name()?;
    let mut descriptor = MetricDescriptor::new(metric.namespace(), name);

    for dimension in metric.dimensions() {
        let (Some(label), Some(value)) = (dimension.name(), dimension.value()) else {
            warn!("Ignoring incomplete dimension of {name} metric: {dimension:?}.");
            continue;
        };
        descriptor = descriptor.with_dimension(label, value);
    }

    Some(descriptor)
}

fn request_dimensions(metric: &MetricDescriptor) -> Vec<Dimension> {
    metric.dimensions.iter()
        .map(|(label, value)| Dimension::builder().name(label).value(value).build())
        .collect()
}

/// Picks the requested statistic out of a CloudWatch datapoint. Points without a timestamp or without
/// the requested value are dropped.
fn convert_datapoint(point: &AwsDatapoint, statistic: Statistic) -> Option<Datapoint> {
    let timestamp = point.timestamp()?;
    let timestamp = DateTime::from_timestamp(timestamp.secs(), timestamp.subsec_nanos())?;

    let value = match statistic {
        Statistic::Minimum => point.minimum(),
        Statistic::Maximum => point.maximum(),
        Statistic::Sum => point.sum(),
        Statistic::Average => point.average(),
        Statistic::SampleCount => point.sample_count(),
    }?;

    Some(Datapoint {timestamp, value, statistic})
}

fn to_aws_time(time: DateTime<Utc>) -> AwsDateTime {
    AwsDateTime::from_secs(time.timestamp())
}
