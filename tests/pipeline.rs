//! Geocode, fetch, extract and render against canned responses.

use std::cell::RefCell;

use meteogram::chart;
use meteogram::fetch::{Fetch, NetworkError};
use meteogram::forecast::{Measurement, ZERO_PRECIPITATION};
use meteogram::geocode::{GeocodeError, Geocoder};
use meteogram::location::{Coordinates, LocationQuery, Request};
use meteogram::{Endpoints, Error, Options};
use time::macros::datetime;

const FORECAST: &str = include_str!("data/brno.xml");

const GEOCODE: &str = "<GeocodeResponse>
 <status>OK</status>
 <result>
  <formatted_address>Brno, Czechia</formatted_address>
  <address_component><long_name>Brno</long_name><type>locality</type></address_component>
  <geometry><location><lat>49.210722</lat><lng>16.594185</lng></location></geometry>
 </result>
</GeocodeResponse>";

/// Serves the canned forecast or geocoding response depending on the URL.
#[derive(Default)]
struct FakeApis {
    requests: RefCell<Vec<String>>,
    down: bool,
}

impl Fetch for FakeApis {
    fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
        self.requests.borrow_mut().push(url.to_string());
        if self.down {
            return Err(NetworkError::Status {
                url: url.to_string(),
                status: 503,
            });
        }

        let endpoints = Endpoints::default();
        if url.starts_with(&endpoints.geocode) {
            Ok(GEOCODE.as_bytes().to_vec())
        } else {
            Ok(FORECAST.as_bytes().to_vec())
        }
    }
}

fn resolve(apis: &FakeApis, query: LocationQuery) -> Result<Request, GeocodeError> {
    let endpoints = Endpoints::default();
    let geocoder = Geocoder::new(&endpoints.geocode, "key", apis);
    Request::resolve(query, &geocoder)
}

#[test]
fn address_to_forecast() {
    let apis = FakeApis::default();
    let options = Options {
        verbose: false,
        draw: false,
    };

    let query = LocationQuery::from_args(&["Brno"], false).unwrap();
    let request = resolve(&apis, query).unwrap();
    assert_eq!(request.display_name(), "Brno, Czechia");
    assert_eq!(request.coordinates(), Coordinates::new(49.210722, 16.594185));

    let endpoints = Endpoints::default();
    let xml = meteogram::fetch_forecast(&apis, &endpoints.forecast, request.coordinates()).unwrap();
    let forecast = meteogram::parse_forecast(&xml, &options).unwrap();

    assert_eq!(
        apis.requests.borrow().last().map(String::as_str),
        Some("http://api.met.no/weatherapi/locationforecastlts/1.3/?lat=49.210722;lon=16.594185")
    );

    assert_eq!(forecast.temperatures.measurement, Measurement::Temperature);
    let temperatures: Vec<_> = forecast
        .temperatures
        .iter()
        .map(|s| (s.timestamp, s.value.as_str()))
        .collect();
    assert_eq!(
        temperatures,
        [
            (datetime!(2023-01-01 00:00 UTC), "5.2"),
            (datetime!(2023-01-01 01:00 UTC), "4.8"),
            (datetime!(2023-01-01 02:00 UTC), "-0.4"),
        ]
    );

    let precipitation: Vec<_> = forecast
        .precipitation
        .iter()
        .map(|s| (s.timestamp, s.value.as_str()))
        .collect();
    assert_eq!(
        precipitation,
        [
            (datetime!(2023-01-01 00:00 UTC), "0.3"),
            (datetime!(2023-01-01 01:00 UTC), "1.5"),
        ]
    );
    assert!(forecast
        .precipitation
        .iter()
        .all(|s| s.value != ZERO_PRECIPITATION));

    assert_eq!(
        chart::title(&request),
        "Weather in Brno, Czechia (49.210722, 16.594185)"
    );
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join(chart::DEFAULT_OUTPUT);
    assert_eq!(chart::render(&forecast, "Brno", &output, &options).unwrap(), None);
    assert!(!output.exists());

    let title = chart::title(&request);
    let written = chart::render(&forecast, &title, &output, &Options::default()).unwrap();
    assert_eq!(written, Some(output.clone()));
    assert!(std::fs::read_to_string(&output).unwrap().contains(&title));
}

#[test]
fn coordinates_are_reverse_geocoded() {
    let apis = FakeApis::default();
    let query = LocationQuery::from_args(&["49.210722,", "16.594185"], true).unwrap();

    let request = resolve(&apis, query.clone()).unwrap();
    assert_eq!(request.display_name(), "Brno");
    assert_eq!(request.query(), &query);
    assert!(apis.requests.borrow()[0].contains("latlng=49.210722,16.594185"));
}

#[test]
fn network_failure_ends_the_run() {
    let apis = FakeApis {
        down: true,
        ..FakeApis::default()
    };

    let error = resolve(&apis, LocationQuery::Address(String::from("Brno"))).unwrap_err();
    assert!(matches!(
        error,
        GeocodeError::Network(NetworkError::Status { status: 503, .. })
    ));

    let endpoints = Endpoints::default();
    let error = meteogram::fetch_forecast(&apis, &endpoints.forecast, Coordinates::new(0.0, 0.0))
        .map_err(Error::from)
        .unwrap_err();
    assert!(matches!(error, Error::Network(_)));
}

#[test]
fn forecast_without_readings_is_empty_not_an_error() {
    let xml = br#"<weatherdata><product class="pointData"/></weatherdata>"#;
    let forecast = meteogram::parse_forecast(xml, &Options::default()).unwrap();
    assert!(forecast.temperatures.is_empty());
    assert!(forecast.precipitation.is_empty());
}
