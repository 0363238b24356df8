//! Forward and reverse geocoding against the Google geocoding XML API.

use miette::Diagnostic;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use thiserror::Error;

use crate::document::{Document, DocumentError, Node};
use crate::fetch::{Fetch, NetworkError};
use crate::location::Coordinates;

/// Address component used as the display name of reverse geocoded places.
pub const LOCALITY: &str = "locality";

#[derive(Debug, Error, Diagnostic)]
pub enum GeocodeError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Network(#[from] NetworkError),
    #[error(transparent)]
    #[diagnostic(transparent)]
    Document(#[from] DocumentError),
    #[error("Geocoding failed with status {status}{}", detail(.message))]
    #[diagnostic(code(meteogram::geocode::status), help("check the address and the API key"))]
    Status {
        status: String,
        message: Option<String>,
    },
    #[error("Geocoding response has no `{0}`")]
    #[diagnostic(code(meteogram::geocode::missing_field))]
    MissingField(&'static str),
    #[error("Geocoding response has a non numeric `{field}`: `{value}`")]
    #[diagnostic(code(meteogram::geocode::invalid_number))]
    InvalidNumber { field: &'static str, value: String },
    #[error("No `{0}` address component in the reverse geocoding response")]
    #[diagnostic(code(meteogram::geocode::address_component_not_found))]
    AddressComponentNotFound(String),
}

fn detail(message: &Option<String>) -> String {
    message
        .as_ref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    pub coordinates: Coordinates,
    pub display_name: String,
}

#[derive(Debug, Clone)]
pub struct Geocoder<F> {
    endpoint: String,
    api_key: String,
    fetcher: F,
}

impl<F: Fetch> Geocoder<F> {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, fetcher: F) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            fetcher,
        }
    }

    pub fn forward_url(&self, address: &str) -> String {
        format!(
            "{}?address={}&key={}",
            self.endpoint,
            utf8_percent_encode(address, NON_ALPHANUMERIC),
            utf8_percent_encode(&self.api_key, NON_ALPHANUMERIC)
        )
    }

    pub fn reverse_url(&self, coordinates: Coordinates) -> String {
        format!(
            "{}?latlng={},{}&key={}",
            self.endpoint,
            coordinates.latitude,
            coordinates.longitude,
            utf8_percent_encode(&self.api_key, NON_ALPHANUMERIC)
        )
    }

    pub fn forward(&self, address: &str) -> Result<Place, GeocodeError> {
        tracing::debug!(message = "geocoding address", address);
        let document = self.request(&self.forward_url(address))?;
        parse_forward(&document)
    }

    pub fn reverse(&self, coordinates: Coordinates) -> Result<Place, GeocodeError> {
        tracing::debug!(message = "reverse geocoding coordinates", coordinates = %coordinates);
        let document = self.request(&self.reverse_url(coordinates))?;
        Ok(Place {
            coordinates,
            display_name: address_component(&document, LOCALITY)?.to_string(),
        })
    }

    fn request(&self, url: &str) -> Result<Document, GeocodeError> {
        let body = self.fetcher.get(url)?;
        let document = Document::parse(&body)?;
        check_status(&document)?;
        Ok(document)
    }
}

fn check_status(document: &Document) -> Result<(), GeocodeError> {
    let status = document
        .first_named("status")
        .ok_or(GeocodeError::MissingField("status"))?
        .text();
    if status == "OK" {
        return Ok(());
    }

    Err(GeocodeError::Status {
        status: status.to_string(),
        message: document
            .first_named("error_message")
            .map(|node| node.text().to_string()),
    })
}

fn number(node: Option<Node<'_>>, field: &'static str) -> Result<f64, GeocodeError> {
    let text = node.ok_or(GeocodeError::MissingField(field))?.text();
    text.parse().map_err(|_| GeocodeError::InvalidNumber {
        field,
        value: text.to_string(),
    })
}

/// Coordinates and formatted address of the first result.
pub fn parse_forward(document: &Document) -> Result<Place, GeocodeError> {
    let result = document
        .first_named("result")
        .ok_or(GeocodeError::MissingField("result"))?;
    let location = result
        .path(&["geometry", "location"])
        .ok_or(GeocodeError::MissingField("geometry/location"))?;

    let coordinates = Coordinates::new(
        number(location.child_named("lat"), "lat")?,
        number(location.child_named("lng"), "lng")?,
    );
    let display_name = result
        .child_named("formatted_address")
        .ok_or(GeocodeError::MissingField("formatted_address"))?
        .text()
        .to_string();

    Ok(Place {
        coordinates,
        display_name,
    })
}

/// `long_name` of the first address component tagged with `kind`, wherever it
/// appears in the component list.
pub fn address_component<'a>(document: &'a Document, kind: &str) -> Result<&'a str, GeocodeError> {
    document
        .elements_named("address_component")
        .find(|component| {
            component
                .children()
                .any(|child| child.name() == "type" && child.text() == kind)
        })
        .and_then(|component| component.child_named("long_name"))
        .map(|name| name.text())
        .ok_or_else(|| GeocodeError::AddressComponentNotFound(kind.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    const FORWARD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<GeocodeResponse>
 <status>OK</status>
 <result>
  <type>locality</type>
  <type>political</type>
  <formatted_address>Brno, Czechia</formatted_address>
  <address_component>
   <long_name>Brno</long_name>
   <short_name>Brno</short_name>
   <type>locality</type>
   <type>political</type>
  </address_component>
  <geometry>
   <location>
    <lat>49.1950602</lat>
    <lng>16.6068371</lng>
   </location>
  </geometry>
 </result>
</GeocodeResponse>"#;

    const REVERSE: &str = r#"<GeocodeResponse>
 <status>OK</status>
 <result>
  <formatted_address>Kounicova 1, 602 00 Brno, Czechia</formatted_address>
  <address_component>
   <long_name>1</long_name>
   <type>street_number</type>
  </address_component>
  <address_component>
   <long_name>Kounicova</long_name>
   <type>route</type>
  </address_component>
  <address_component>
   <long_name>Brno-střed</long_name>
   <type>sublocality</type>
   <type>political</type>
  </address_component>
  <address_component>
   <long_name>Brno</long_name>
   <type>political</type>
   <type>locality</type>
  </address_component>
 </result>
</GeocodeResponse>"#;

    struct Canned {
        body: &'static str,
        urls: RefCell<Vec<String>>,
    }

    impl Canned {
        fn new(body: &'static str) -> Self {
            Self {
                body,
                urls: RefCell::new(Vec::new()),
            }
        }
    }

    impl Fetch for Canned {
        fn get(&self, url: &str) -> Result<Vec<u8>, NetworkError> {
            self.urls.borrow_mut().push(url.to_string());
            Ok(self.body.as_bytes().to_vec())
        }
    }

    #[test]
    fn forward_reads_first_result() {
        let fetcher = Canned::new(FORWARD);
        let geocoder = Geocoder::new("https://geo.test/xml", "s3cret key", &fetcher);

        let place = geocoder.forward("Brno, Czech Republic").unwrap();
        assert_eq!(place.coordinates, Coordinates::new(49.1950602, 16.6068371));
        assert_eq!(place.display_name, "Brno, Czechia");
        assert_eq!(
            fetcher.urls.borrow().as_slice(),
            ["https://geo.test/xml?address=Brno%2C%20Czech%20Republic&key=s3cret%20key"]
        );
    }

    #[test]
    fn reverse_looks_up_locality_by_name() {
        let fetcher = Canned::new(REVERSE);
        let geocoder = Geocoder::new("https://geo.test/xml", "k", &fetcher);
        let coordinates = Coordinates::new(49.2, 16.6);

        let place = geocoder.reverse(coordinates).unwrap();
        assert_eq!(place.display_name, "Brno");
        assert_eq!(place.coordinates, coordinates);
        assert_eq!(
            fetcher.urls.borrow().as_slice(),
            ["https://geo.test/xml?latlng=49.2,16.6&key=k"]
        );
    }

    #[test]
    fn missing_component_is_reported_by_name() {
        let document = Document::parse(REVERSE.as_bytes()).unwrap();
        assert_eq!(address_component(&document, "route").unwrap(), "Kounicova");
        assert!(matches!(
            address_component(&document, "country"),
            Err(GeocodeError::AddressComponentNotFound(kind)) if kind == "country"
        ));
    }

    #[test]
    fn non_ok_status_is_an_error() {
        let fetcher = Canned::new(
            "<GeocodeResponse><status>REQUEST_DENIED</status>\
             <error_message>The provided API key is invalid.</error_message></GeocodeResponse>",
        );
        let geocoder = Geocoder::new("https://geo.test/xml", "bad", &fetcher);

        match geocoder.forward("Brno") {
            Err(GeocodeError::Status { status, message }) => {
                assert_eq!(status, "REQUEST_DENIED");
                assert_eq!(message.as_deref(), Some("The provided API key is invalid."));
            }
            other => panic!("expected a status error, got {other:?}"),
        }
    }

    #[test]
    fn bad_coordinates_in_response() {
        let document = Document::parse(
            b"<GeocodeResponse><status>OK</status><result>\
              <formatted_address>X</formatted_address>\
              <geometry><location><lat>north</lat><lng>1</lng></location></geometry>\
              </result></GeocodeResponse>",
        )
        .unwrap();
        assert!(matches!(
            parse_forward(&document),
            Err(GeocodeError::InvalidNumber { field: "lat", .. })
        ));

        let document =
            Document::parse(b"<GeocodeResponse><status>ZERO_RESULTS</status></GeocodeResponse>")
                .unwrap();
        assert!(matches!(
            parse_forward(&document),
            Err(GeocodeError::MissingField("result"))
        ));
    }
}
