use std::io::{self, Write};

use tabled::{Table, Tabled};
use tabled::settings::{Alignment, Height, object::{Rows, Columns}, style::Style};

use crate::carbon::Encoding;
use crate::fetcher::Fetched;

/// Prints what would be sent to Carbon instead of sending it.
pub fn print(fetched: &Fetched, encoding: Encoding) {
    let mut table = Table::new(rows(fetched, encoding));
    table.with(Style::blank());
    table.modify(Rows::first(), Height::increase(2));
    table.modify(Columns::single(4), Alignment::right());
    table.modify(Columns::single(5), Alignment::right());

    let _ = writeln!(io::stdout(), "\n{}", table);
}

fn rows(fetched: &Fetched, encoding: Encoding) -> Vec<SeriesRow> {
    fetched.series().iter().enumerate().map(|(index, series)| {
        let datapoint = series.datapoints.first();

        let sent = datapoint.is_some() && match encoding {
            Encoding::Plain => index == 0,
            Encoding::Pickle => true,
        };

        SeriesRow {
            metric: series.metric.to_string(),
            name: series.name.clone(),
            time: datapoint.map(|datapoint| datapoint.timestamp.to_rfc3339()).unwrap_or_default(),
            statistic: datapoint.map(|datapoint| datapoint.statistic.as_str()).unwrap_or_default(),
            value: datapoint.map(|datapoint| datapoint.value.to_string()).unwrap_or_default(),
            datapoints: series.datapoints.len(),
            sent: if sent { "yes" } else { "" },
        }
    }).collect()
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Metric")]
    metric: String,

    #[tabled(rename = "Series")]
    name: String,

    #[tabled(rename = "Time")]
    time: String,

    #[tabled(rename = "Statistic")]
    statistic: &'static str,

    #[tabled(rename = "Value")]
    value: String,

    #[tabled(rename = "Datapoints")]
    datapoints: usize,

    #[tabled(rename = "Sent")]
    sent: &'static str,
}

#[cfg(test)]
mod tests {
    use crate::cloudwatch::fake::datapoint;
    use crate::metrics::{DimensionQuery, MetricDescriptor};

    use super::*;

    fn fetched() -> Fetched {
        let matches = vec![
            MetricDescriptor::new(None, "CPUUtilization").with_dimension("Zone", "us-west"),
            MetricDescriptor::new(None, "DiskReadOps").with_dimension("Zone", "us-west"),
            MetricDescriptor::new(None, "NetworkIn").with_dimension("Zone", "us-west"),
        ];
        let results = vec![vec![datapoint(1000, 42.5), datapoint(1060, 1.0)], Vec::new(), vec![datapoint(1000, 7.0)]];

        Fetched::new("prod", &"Zone=us-west".parse::<DimensionQuery>().unwrap(), matches, results)
    }

    #[test]
    fn pickle_rows() {
        let rows = rows(&fetched(), Encoding::Pickle);

        let summary: Vec<_> = rows.iter()
            .map(|row| (row.name.as_str(), row.value.as_str(), row.datapoints, row.sent))
            .collect();

        assert_eq!(summary, [
            ("prod.us-west.cpuutilization", "42.5", 2, "yes"),
            ("prod.us-west.diskreadops", "", 0, ""),
            ("prod.us-west.networkin", "7", 1, "yes"),
        ]);
        assert_eq!(rows[0].metric, r#"CPUUtilization{Zone="us-west"}"#);
        assert_eq!(rows[0].time, "1970-01-01T00:16:40+00:00");
        assert_eq!(rows[0].statistic, "Average");
    }

    #[test]
    fn plain_rows() {
        let sent: Vec<_> = rows(&fetched(), Encoding::Plain).iter().map(|row| row.sent).collect();
        assert_eq!(sent, ["yes", "", ""]);
    }
}
