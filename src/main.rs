use std::path::PathBuf;

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing::Level;

use meteogram::chart::{self, DEFAULT_OUTPUT};
use meteogram::fetch::HttpFetcher;
use meteogram::geocode::Geocoder;
use meteogram::location::{LocationQuery, Request};
use meteogram::{Endpoints, Options, DEFAULT_FORECAST_URL, DEFAULT_GEOCODE_URL};

const DEFAULT_LOG_LEVEL: Level = Level::WARN;

const LONG_ABOUT: &str = "
Chart the temperature and precipitation forecast from met.no for a place.

The place is an address, resolved with the Google geocoding API, or with
--coordinates a latitude and longitude such as `49.210722,16.594185`. The chart
is written as SVG and opened in the default viewer.
";

#[derive(Debug, Parser)]
#[command(
    name = "meteogram",
    version,
    about = "Get your own weather chart",
    long_about = LONG_ABOUT
)]
struct MeteogramApplication {
    /// Address to chart the forecast for, or a coordinate pair with --coordinates
    #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
    address: Vec<String>,

    /// Read the address as `latitude,longitude` instead of geocoding it
    #[arg(short, long)]
    coordinates: bool,

    /// Print every extracted reading
    #[arg(short, long)]
    verbose: bool,

    /// Extract the forecast without drawing a chart
    #[arg(long)]
    no_draw: bool,

    /// Don't open the chart after writing it
    #[arg(long)]
    no_open: bool,

    /// Where to write the chart
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Write the raw forecast XML to this file
    #[arg(long)]
    dump_xml: Option<PathBuf>,

    /// Base URL of the met.no location forecast API
    #[arg(long, default_value_t = DEFAULT_FORECAST_URL.into())]
    forecast_url: String,

    /// Base URL of the Google geocoding XML API
    #[arg(long, default_value_t = DEFAULT_GEOCODE_URL.into())]
    geocode_url: String,

    /// Google geocoding API key
    #[arg(long, env = "GEOCODE_API_KEY", hide_env_values = true, default_value = "")]
    api_key: String,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[arg(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,
}

fn main() -> Result<()> {
    let opts = MeteogramApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .with_writer(std::io::stderr)
            .finish(),
    )
    .into_diagnostic()?;

    let options = Options {
        verbose: opts.verbose,
        draw: !opts.no_draw,
    };
    let endpoints = Endpoints {
        forecast: opts.forecast_url,
        geocode: opts.geocode_url,
    };

    let query = LocationQuery::from_args(opts.address.as_slice(), opts.coordinates)?;
    let fetcher = HttpFetcher::new();
    let geocoder = Geocoder::new(&endpoints.geocode, &opts.api_key, &fetcher);
    let request = Request::resolve(query, &geocoder)?;

    let xml = meteogram::fetch_forecast(&fetcher, &endpoints.forecast, request.coordinates())?;
    if let Some(path) = &opts.dump_xml {
        std::fs::write(path, &xml).into_diagnostic()?;
        tracing::info!(message = "wrote forecast xml", path = %path.display());
    }

    let forecast = meteogram::parse_forecast(&xml, &options)?;
    let written = chart::render(&forecast, &chart::title(&request), &opts.output, &options)?;

    if let Some(path) = written {
        if opts.no_open {
            println!("{}", path.display());
        } else if let Err(e) = chart::open(&path) {
            tracing::warn!(message = "unable to open chart", path = %path.display(), error = %e);
        }
    }

    Ok(())
}
