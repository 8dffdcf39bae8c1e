#[macro_use] mod core;
mod carbon;
mod catalog;
mod cloudwatch;
mod error;
mod fetcher;
mod metrics;
mod naming;
mod pickle;
mod report;
mod session;

use std::io::{self, Write};
use std::net::TcpStream;
use std::process::ExitCode;

use chrono::{TimeDelta, Utc};
use clap::{Arg, ArgAction, Command, value_parser};
use easy_logging::LoggingConfig;
use log::{Level, debug, error};

use crate::carbon::{DEFAULT_PICKLE_PORT, DEFAULT_PORT, Encoding};
use crate::cloudwatch::CloudWatch;
use crate::core::{EmptyResult, GenericResult};
use crate::metrics::{DimensionQuery, Statistic, StatisticsRequest};
use crate::session::Session;

fn main() -> ExitCode {
    let config = match parse_args() {
        Ok(config) => config,
        Err(err) => {
            let _ = writeln!(io::stderr(), "{err}.");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = LoggingConfig::new(module_path!(), config.log_level).minimal().build() {
        let _ = writeln!(io::stderr(), "Failed to initialize the logging: {err}.");
        return ExitCode::FAILURE;
    }

    let default_panic_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        default_panic_hook(info);
        std::process::abort();
    }));

    if let Err(err) = run(&config) {
        error!("{err}.");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(config: &Config) -> EmptyResult {
    if config.dry_run {
        return bridge(config, io::sink());
    }

    let port = config.encoding.port(config.carbon_port, config.carbon_pickle_port);
    let connection = TcpStream::connect((config.carbon_host.as_str(), port)).map_err(|e| format!(
        "Failed to connect to Carbon at {}:{port}: {e}", config.carbon_host))?;

    debug!("Connected to Carbon at {}:{port}.", config.carbon_host);

    // The connection is closed when the session is dropped
    bridge(config, connection)
}

fn bridge<W: Write>(config: &Config, sink: W) -> EmptyResult {
    let api = CloudWatch::new(&config.region)?;
    let mut session = Session::new(api, sink, config.encoding, &config.target, config.namespace.as_deref())?;

    let end = Utc::now();
    let request = StatisticsRequest {
        statistic: config.statistic,
        unit: config.unit.clone(),
        start: end - config.window,
        end,
        period: config.period,
    };

    let queried = session.query(&config.dimensions)?;
    let fetched = session.fetch(queried, &request);
    if fetched.is_empty() {
        return Ok(());
    }

    if config.dry_run {
        report::print(&fetched, config.encoding);
    } else {
        session.send(&fetched)?;
    }

    Ok(())
}

struct Config {
    namespace: Option<String>,
    region: String,
    target: String,
    dimensions: DimensionQuery,

    statistic: Statistic,
    unit: Option<String>,
    period: i32,
    window: TimeDelta,

    encoding: Encoding,
    carbon_host: String,
    carbon_port: u16,
    carbon_pickle_port: u16,

    dry_run: bool,
    log_level: Level,
}

fn parse_args() -> GenericResult<Config> {
    let matches = Command::new(env!("CARGO_PKG_NAME"))
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))

        .dont_collapse_args_in_usage(true)
        .disable_help_subcommand(true)
        .help_expected(true)

        .args([
            Arg::new("verbose")
                .short('v').long("verbose")
                .action(ArgAction::Count)
                .help("Set verbosity level"),

            Arg::new("namespace")
                .short('n').long("namespace")
                .value_name("NAMESPACE")
                .help("CloudWatch namespace to take the metrics from (all namespaces by default)"),

            Arg::new("region")
                .short('r').long("region")
                .value_name("REGION")
                .default_value("us-west-1")
                .help("AWS region"),

            Arg::new("target")
                .short('t').long("target")
                .value_name("PREFIX")
                .default_value("cloudwatch")
                .help("Graphite path prefix of the series"),

            Arg::new("dimension")
                .short('d').long("dimension")
                .value_name("LABEL=VALUE")
                .action(ArgAction::Append)
                .help("Select metrics with the dimension. Dimension values form the series path in the given order"),

            Arg::new("statistic")
                .short('s').long("statistic")
                .value_name("STATISTIC")
                .value_parser(Statistic::ALL.map(|statistic| statistic.as_str()))
                .default_value("Average")
                .help("Statistic to fetch"),

            Arg::new("unit")
                .short('u').long("unit")
                .value_name("UNIT")
                .help("Unit of the statistic (Seconds, Bytes, Percent, ...)"),

            Arg::new("period")
                .long("period")
                .value_name("SECONDS")
                .value_parser(value_parser!(i32).range(1..))
                .default_value("60")
                .help("Statistic period"),

            Arg::new("window")
                .long("window")
                .value_name("SECONDS")
                .value_parser(value_parser!(i64).range(1..=i64::from(i32::MAX)))
                .default_value("600")
                .help("Time window ending now to fetch the statistic for"),

            Arg::new("method")
                .short('m').long("method")
                .value_name("METHOD")
                .value_parser(["plain", "pickle"])
                .default_value("plain")
                .help("Carbon protocol to send the metrics with"),

            Arg::new("carbon_host")
                .long("carbon-host")
                .value_name("HOST")
                .default_value("127.0.0.1")
                .help("Carbon host"),

            Arg::new("carbon_port")
                .long("carbon-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Carbon plaintext protocol port (2003 by default)"),

            Arg::new("carbon_pickle_port")
                .long("carbon-pickle-port")
                .value_name("PORT")
                .value_parser(value_parser!(u16))
                .help("Carbon pickle protocol port (2004 by default)"),

            Arg::new("dry_run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the metrics instead of sending them to Carbon"),
        ])

        .get_matches();

    let log_level = match matches.get_count("verbose") {
        0 => Level::Info,
        1 => Level::Debug,
        2 => Level::Trace,
        _ => return Err!("Invalid verbosity level"),
    };

    let dimensions = DimensionQuery::parse(
        matches.get_many::<String>("dimension").into_iter().flatten().map(String::as_str))?;

    let encoding = match matches.get_one::<String>("method").unwrap().as_str() {
        "pickle" => Encoding::Pickle,
        _ => Encoding::Plain,
    };

    Ok(Config {
        namespace: matches.get_one("namespace").cloned(),
        region: matches.get_one("region").cloned().unwrap(),
        target: matches.get_one("target").cloned().unwrap(),
        dimensions,

        statistic: matches.get_one::<String>("statistic").unwrap().parse()?,
        unit: matches.get_one("unit").cloned(),
        period: *matches.get_one("period").unwrap(),
        window: TimeDelta::seconds(*matches.get_one("window").unwrap()),

        encoding,
        carbon_host: matches.get_one("carbon_host").cloned().unwrap(),
        carbon_port: matches.get_one("carbon_port").copied().unwrap_or(DEFAULT_PORT),
        carbon_pickle_port: matches.get_one("carbon_pickle_port").copied().unwrap_or(DEFAULT_PICKLE_PORT),

        dry_run: matches.get_flag("dry_run"),
        log_level,
    })
}
