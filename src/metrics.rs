use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter, Write};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::core::{GenericError, GenericResult};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetricDescriptor {
    pub namespace: Option<String>,
    pub name: String,
    pub dimensions: BTreeMap<String, String>,
}

impl MetricDescriptor {
    pub fn new(namespace: Option<&str>, name: &str) -> MetricDescriptor {
        MetricDescriptor {
            namespace: namespace.map(ToOwned::to_owned),
            name: name.to_owned(),
            dimensions: BTreeMap::new(),
        }
    }

    pub fn with_dimension(mut self, label: &str, value: &str) -> MetricDescriptor {
        self.dimensions.insert(label.to_owned(), value.to_owned());
        self
    }

    pub fn has_dimension(&self, label: &str, value: &str) -> bool {
        self.dimensions.get(label).is_some_and(|actual| actual == value)
    }
}

// Canonical form, also used as the catalog sort key: Namespace:Name{label="value", ...}
impl Display for MetricDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut metric = String::new();

        if let Some(namespace) = self.namespace.as_ref() {
            metric.push_str(namespace);
            metric.push(':');
        }
        metric.push_str(&self.name);

        for (index, (label, value)) in self.dimensions.iter().enumerate() {
            if index == 0 {
                metric.push('{');
            } else {
                metric.push_str(", ");
            }

            _ = write!(&mut metric, "{label}={value:?}");

            if index == self.dimensions.len() - 1 {
                metric.push('}');
            }
        }

        f.write_str(&metric)
    }
}

/// Dimension filter in the order the caller supplied it. The order matters: it defines the path
/// segments of the resulting series names.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionQuery {
    dimensions: Vec<(String, String)>,
}

impl DimensionQuery {
    pub fn new() -> DimensionQuery {
        DimensionQuery::default()
    }

    /// Builds the query from `LABEL=VALUE` items, keeping their order.
    pub fn parse<'a>(dimensions: impl IntoIterator<Item = &'a str>) -> GenericResult<DimensionQuery> {
        let mut query = DimensionQuery::new();

        for dimension in dimensions {
            let (label, value) = parse_dimension(dimension)?;
            query.add(label, value)?;
        }

        Ok(query)
    }

    pub fn add(&mut self, label: &str, value: &str) -> GenericResult<()> {
        if self.dimensions.iter().any(|(existing, _)| existing == label) {
            return Err!("Duplicate dimension: {label}");
        }
        self.dimensions.push((label.to_owned(), value.to_owned()));
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> + use<'_> {
        self.dimensions.iter().map(|(label, value)| (label.as_str(), value.as_str()))
    }

    pub fn values(&self) -> impl Iterator<Item = &str> + use<'_> {
        self.dimensions.iter().map(|(_, value)| value.as_str())
    }
}

impl FromStr for DimensionQuery {
    type Err = GenericError;

    /// Parses a comma-separated `label=value` list.
    fn from_str(dimensions: &str) -> GenericResult<DimensionQuery> {
        DimensionQuery::parse(dimensions.split(',').filter(|dimension| !dimension.is_empty()))
    }
}

fn parse_dimension(dimension: &str) -> GenericResult<(&str, &str)> {
    match dimension.split_once('=') {
        Some((label, value)) if !label.is_empty() => Ok((label, value)),
        _ => Err!("Invalid dimension: {dimension:?}. Expected LABEL=VALUE"),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Statistic {
    Minimum,
    Maximum,
    Sum,
    Average,
    SampleCount,
}

impl Statistic {
    pub const ALL: [Statistic; 5] = [
        Statistic::Minimum, Statistic::Maximum, Statistic::Sum, Statistic::Average, Statistic::SampleCount,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Statistic::Minimum => "Minimum",
            Statistic::Maximum => "Maximum",
            Statistic::Sum => "Sum",
            Statistic::Average => "Average",
            Statistic::SampleCount => "SampleCount",
        }
    }
}

impl Display for Statistic {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Statistic {
    type Err = GenericError;

    fn from_str(name: &str) -> GenericResult<Statistic> {
        Statistic::ALL.iter()
            .find(|statistic| statistic.as_str() == name)
            .copied()
            .ok_or_else(|| format!("Invalid statistic: {name:?}").into())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Datapoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub statistic: Statistic,
}

impl Datapoint {
    /// Unix time truncated to whole seconds.
    pub fn unix_time(&self) -> i64 {
        self.timestamp.timestamp()
    }
}

#[derive(Clone, Debug)]
pub struct StatisticsRequest {
    pub statistic: Statistic,
    pub unit: Option<String>,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub period: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form() {
        let metric = MetricDescriptor::new(Some("AWS/EC2"), "CPUUtilization")
            .with_dimension("InstanceId", "i-1")
            .with_dimension("AutoScalingGroupName", "web");

        assert_eq!(
            metric.to_string(),
            r#"AWS/EC2:CPUUtilization{AutoScalingGroupName="web", InstanceId="i-1"}"#,
        );
        assert_eq!(MetricDescriptor::new(None, "Latency").to_string(), "Latency");
    }

    #[test]
    fn query_keeps_insertion_order() {
        let query: DimensionQuery = "Zone=us-west,Env=prod".parse().unwrap();
        assert_eq!(query.values().collect::<Vec<_>>(), ["us-west", "prod"]);
        assert_eq!("".parse::<DimensionQuery>().unwrap(), DimensionQuery::new());
    }

    #[test]
    fn query_rejects_invalid_dimensions() {
        assert!("Zone".parse::<DimensionQuery>().is_err());
        assert!("=value".parse::<DimensionQuery>().is_err());
        assert!("Zone=a,Zone=b".parse::<DimensionQuery>().is_err());
        assert_eq!(parse_dimension("Name=a=b").unwrap(), ("Name", "a=b"));
    }

    #[test]
    fn query_from_repeated_arguments() {
        let query = DimensionQuery::parse(["Zone=us-west", "Env=prod,canary"]).unwrap();
        assert_eq!(query.iter().collect::<Vec<_>>(), [("Zone", "us-west"), ("Env", "prod,canary")]);

        assert!(DimensionQuery::parse(["Zone=a", "Zone=b"]).is_err());
        assert!(DimensionQuery::parse(["Zone"]).is_err());
        assert_eq!(DimensionQuery::parse([]).unwrap(), DimensionQuery::new());
    }

    #[test]
    fn statistic_names() {
        for statistic in Statistic::ALL {
            assert_eq!(statistic.as_str().parse::<Statistic>().unwrap(), statistic);
        }
        assert!("average".parse::<Statistic>().is_err());
    }
}
