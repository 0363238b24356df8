//! Fetch a met.no forecast for an address or a coordinate pair and chart
//! its temperature and precipitation.

use miette::Diagnostic;
use thiserror::Error;

pub mod chart;
pub mod document;
pub mod fetch;
pub mod forecast;
pub mod geocode;
pub mod location;

use crate::document::{Document, DocumentError};
use crate::fetch::{Fetch, NetworkError};
use crate::forecast::{ExtractError, Forecast};
use crate::location::Coordinates;

pub const DEFAULT_FORECAST_URL: &str = "http://api.met.no/weatherapi/locationforecastlts/1.3/";
pub const DEFAULT_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/xml";

/// Switches passed down to extraction and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Print every extracted reading to stdout.
    pub verbose: bool,
    /// Render the chart at all.
    pub draw: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            verbose: false,
            draw: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub forecast: String,
    pub geocode: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            forecast: String::from(DEFAULT_FORECAST_URL),
            geocode: String::from(DEFAULT_GEOCODE_URL),
        }
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Coordinates(#[from] location::CoordinatesError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Geocode(#[from] geocode::GeocodeError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Extract(#[from] ExtractError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Chart(#[from] chart::ChartError),
}

pub fn forecast_url(endpoint: &str, coordinates: Coordinates) -> String {
    format!(
        "{endpoint}?lat={};lon={}",
        coordinates.latitude, coordinates.longitude
    )
}

/// Raw forecast XML for the given coordinates.
pub fn fetch_forecast<F: Fetch>(
    fetcher: &F,
    endpoint: &str,
    coordinates: Coordinates,
) -> Result<Vec<u8>, NetworkError> {
    fetcher.get(&forecast_url(endpoint, coordinates))
}

pub fn parse_forecast(xml: &[u8], options: &Options) -> Result<Forecast, Error> {
    let document = Document::parse(xml)?;
    Ok(Forecast::extract(&document, options)?)
}
