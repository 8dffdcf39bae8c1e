use std::io::Write;

use log::info;

use crate::carbon::{self, Encoding};
use crate::catalog::{Catalog, MatchSet};
use crate::cloudwatch::MetricsApi;
use crate::error::Error;
use crate::fetcher::{self, Fetched};
use crate::metrics::{DimensionQuery, MetricDescriptor, StatisticsRequest};

/// Holds the API client and the Carbon connection for the lifetime of one bridging run. Each stage
/// returns the input of the next one, so the caller drives the pipeline explicitly:
/// `new` → `query` (repeatable) → `fetch` → `send`.
pub struct Session<A, W> {
    api: A,
    sink: W,
    encoding: Encoding,
    target: String,
    catalog: Catalog,
}

pub struct Queried {
    query: DimensionQuery,
    matches: MatchSet,
}

impl Queried {
    pub fn matches(&self) -> &[MetricDescriptor] {
        &self.matches
    }
}

impl<A: MetricsApi, W: Write> Session<A, W> {
    pub fn new(api: A, sink: W, encoding: Encoding, target: &str, namespace: Option<&str>) -> Result<Session<A, W>, Error> {
        let catalog = Catalog::load(&api, namespace)?;

        Ok(Session {
            api,
            sink,
            encoding,
            target: target.to_owned(),
            catalog,
        })
    }

    pub fn query(&self, query: &DimensionQuery) -> Result<Queried, Error> {
        let matches = self.catalog.matching(query)?;
        info!("{} metrics match the dimensions.", matches.len());

        Ok(Queried {
            query: query.clone(),
            matches,
        })
    }

    pub fn fetch(&self, queried: Queried, request: &StatisticsRequest) -> Fetched {
        let results = fetcher::fetch(&self.api, queried.matches(), request);
        Fetched::new(&self.target, &queried.query, queried.matches, results)
    }

    pub fn send(&mut self, fetched: &Fetched) -> Result<usize, Error> {
        match self.encoding {
            Encoding::Plain => carbon::send_plain(&mut self.sink, fetched),
            Encoding::Pickle => carbon::send_pickle(&mut self.sink, fetched),
        }
    }
}
