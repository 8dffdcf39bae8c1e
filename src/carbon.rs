use std::io::Write;

use log::info;

use crate::error::Error;
use crate::fetcher::Fetched;
use crate::metrics::Datapoint;
use crate::pickle;

pub const DEFAULT_PORT: u16 = 2003;
pub const DEFAULT_PICKLE_PORT: u16 = 2004;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    Plain,
    Pickle,
}

impl Encoding {
    pub fn port(&self, plain_port: u16, pickle_port: u16) -> u16 {
        match self {
            Encoding::Plain => plain_port,
            Encoding::Pickle => pickle_port,
        }
    }
}

/// Plaintext protocol line: `<name> <value> <unix-seconds>\n`.
pub fn plain_line(name: &str, datapoint: &Datapoint) -> String {
    format!("{name} {} {}\n", datapoint.value, datapoint.unix_time())
}

/// Pickle protocol frame: 4-byte big-endian payload length followed by the pickled batch.
pub fn pickle_batch(metrics: &[(String, (i64, f64))]) -> Result<Vec<u8>, Error> {
    let payload = pickle::dumps(metrics)?;
    let size = pickle::length(payload.len())?;

    let mut batch = Vec::with_capacity(4 + payload.len());
    batch.extend(size.to_be_bytes());
    batch.extend(payload);

    Ok(batch)
}

/// Sends the first datapoint of the first matched metric.
pub fn send_plain<W: Write>(sink: &mut W, fetched: &Fetched) -> Result<usize, Error> {
    let Some((name, datapoint)) = fetched.series().first().and_then(|series| {
        series.datapoints.first().map(|datapoint| (&series.name, datapoint))
    }) else {
        return Err(Error::EmptyResponse);
    };

    info!("Sending 1 metric...");
    write(sink, plain_line(name, datapoint).as_bytes())?;

    Ok(1)
}

/// Sends the first datapoint of every matched metric that has one, as a single pickle batch.
pub fn send_pickle<W: Write>(sink: &mut W, fetched: &Fetched) -> Result<usize, Error> {
    let metrics: Vec<_> = fetched.series().iter().filter_map(|series| {
        // TODO: Carbon accepts any number of datapoints per series, so the whole window could be sent
        let datapoint = series.datapoints.first()?;
        Some((series.name.clone(), (datapoint.unix_time(), datapoint.value)))
    }).collect();

    if metrics.is_empty() {
        return Err(Error::EmptyResponse);
    }

    info!("Sending {} metrics...", metrics.len());
    let batch = pickle_batch(&metrics)?;
    write(sink, &batch)?;

    Ok(metrics.len())
}

fn write<W: Write>(sink: &mut W, data: &[u8]) -> Result<(), Error> {
    sink.write_all(data)?;
    sink.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;

    use crate::cloudwatch::fake::datapoint;
    use crate::metrics::{DimensionQuery, MetricDescriptor};

    use super::*;

    fn build(metrics: &[(&str, Vec<Datapoint>)]) -> Fetched {
        let query: DimensionQuery = "Env=prod,Region=us-west".parse().unwrap();

        let (matches, results) = metrics.iter().map(|(name, datapoints)| {
            let metric = MetricDescriptor::new(None, name)
                .with_dimension("Env", "prod")
                .with_dimension("Region", "us-west");
            (metric, datapoints.clone())
        }).unzip();

        Fetched::new("cloudwatch", &query, matches, results)
    }

    #[test]
    fn plain() {
        assert_eq!(plain_line("prod.us-west.cpu", &datapoint(1000, 42.5)), "prod.us-west.cpu 42.5 1000\n");

        let mut datapoint = datapoint(1000, 3.0);
        datapoint.timestamp += chrono::TimeDelta::milliseconds(999);
        assert_eq!(plain_line("a.b", &datapoint), "a.b 3 1000\n");
    }

    #[test]
    fn send_plain_line() {
        let fetched = build(&[
            ("CPU", vec![datapoint(1000, 42.5), datapoint(1060, 43.0)]),
            ("Memory", vec![datapoint(1000, 7.0)]),
        ]);

        let mut sink = Vec::<u8>::new();
        assert_eq!(send_plain(&mut sink, &fetched).unwrap(), 1);
        assert_eq!(String::from_utf8(sink).unwrap(), "cloudwatch.prod.us-west.cpu 42.5 1000\n");
    }

    #[test]
    fn send_plain_without_datapoints() {
        let mut sink = Vec::<u8>::new();

        let fetched = build(&[("CPU", Vec::new()), ("Memory", vec![datapoint(1000, 7.0)])]);
        assert!(matches!(send_plain(&mut sink, &fetched), Err(Error::EmptyResponse)));

        let fetched = build(&[]);
        assert!(matches!(send_plain(&mut sink, &fetched), Err(Error::EmptyResponse)));

        assert!(sink.is_empty());
    }

    #[test]
    fn send_pickle_batch() {
        let fetched = build(&[
            ("CPU", vec![datapoint(1000, 42.5), datapoint(1060, 43.0)]),
            ("Disk", Vec::new()),
            ("Memory", vec![datapoint(1060, 7.0)]),
        ]);

        let mut sink = Vec::<u8>::new();
        assert_eq!(send_pickle(&mut sink, &fetched).unwrap(), 2);

        let length = u32::from_be_bytes(sink[..4].try_into().unwrap()) as usize;
        let payload = &sink[4..];
        assert_eq!(length, payload.len());

        assert_eq!(payload, pickle::dumps(&[
            ("cloudwatch.prod.us-west.cpu".to_owned(), (1000, 42.5)),
            ("cloudwatch.prod.us-west.memory".to_owned(), (1060, 7.0)),
        ]).unwrap());
    }

    #[test]
    fn send_pickle_without_datapoints() {
        let fetched = build(&[("CPU", Vec::new()), ("Memory", Vec::new())]);

        let mut sink = Vec::<u8>::new();
        assert!(matches!(send_pickle(&mut sink, &fetched), Err(Error::EmptyResponse)));
        assert!(sink.is_empty());
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn transport_error() {
        let fetched = build(&[("CPU", vec![datapoint(1000, 1.0)])]);
        assert!(matches!(send_plain(&mut BrokenPipe, &fetched), Err(Error::Transport(_))));
        assert!(matches!(send_pickle(&mut BrokenPipe, &fetched), Err(Error::Transport(_))));
    }

    #[test]
    fn ports() {
        assert_eq!(Encoding::Plain.port(DEFAULT_PORT, DEFAULT_PICKLE_PORT), 2003);
        assert_eq!(Encoding::Pickle.port(DEFAULT_PORT, DEFAULT_PICKLE_PORT), 2004);
    }
}
