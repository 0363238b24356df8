use std::{fmt, str::FromStr};

use logos::Logos;
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

use crate::fetch::Fetch;
use crate::geocode::{GeocodeError, Geocoder, Place};

#[derive(Logos, Debug, PartialEq)]
#[logos(skip r"[ \t\n]+")]
enum Token {
    #[regex(r"[+-]?[0-9]+(\.[0-9]+)?")]
    Number,
    #[token(",")]
    Comma,
    #[token(";")]
    Semicolon,
}

#[derive(Debug, Error, Diagnostic)]
#[error("Invalid coordinates, expected {expected}")]
#[diagnostic(
    code(meteogram::location::coordinates),
    help("write coordinates as `latitude,longitude`, for example `49.210722,16.594185`")
)]
pub struct CoordinatesError {
    expected: &'static str,
    #[source_code]
    input: String,
    #[label("here")]
    span: SourceSpan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.latitude, self.longitude)
    }
}

impl FromStr for Coordinates {
    type Err = CoordinatesError;

    /// Accepts two numbers separated by a comma, a semicolon or whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let error = |expected, span: std::ops::Range<usize>| CoordinatesError {
            expected,
            input: s.to_string(),
            span: span.into(),
        };
        let end = s.len()..s.len();

        let mut lexer = Token::lexer(s);
        let latitude = match lexer.next() {
            Some(Ok(Token::Number)) => lexer.slice(),
            None => return Err(error("a latitude", end)),
            _ => return Err(error("a latitude", lexer.span())),
        };

        let longitude = match lexer.next() {
            Some(Ok(Token::Comma | Token::Semicolon)) => match lexer.next() {
                Some(Ok(Token::Number)) => lexer.slice(),
                None => return Err(error("a longitude", end)),
                _ => return Err(error("a longitude", lexer.span())),
            },
            Some(Ok(Token::Number)) => lexer.slice(),
            None => return Err(error("a longitude", end)),
            _ => return Err(error("a separator or a longitude", lexer.span())),
        };

        if lexer.next().is_some() {
            return Err(error("nothing after the longitude", lexer.span()));
        }

        // The lexer only produces well formed numbers
        let parse = |number: &str| {
            number
                .parse::<f64>()
                .map_err(|_| error("a number", 0..s.len()))
        };

        Ok(Self {
            latitude: parse(latitude)?,
            longitude: parse(longitude)?,
        })
    }
}

/// What the user asked for on the command line.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Address(String),
    Coordinates(Coordinates),
}

impl LocationQuery {
    pub fn from_args<S: AsRef<str>>(
        words: &[S],
        coordinates: bool,
    ) -> Result<Self, CoordinatesError> {
        let joined = words
            .iter()
            .map(|word| word.as_ref())
            .collect::<Vec<_>>()
            .join(" ");

        if coordinates {
            Ok(Self::Coordinates(joined.parse()?))
        } else {
            Ok(Self::Address(joined))
        }
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Address(address) => f.write_str(address),
            Self::Coordinates(coordinates) => write!(f, "{coordinates}"),
        }
    }
}

/// A query together with where it resolved to. Built once, never changed.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    query: LocationQuery,
    coordinates: Coordinates,
    display_name: String,
}

impl Request {
    pub fn new(query: LocationQuery, place: Place) -> Self {
        Self {
            query,
            coordinates: place.coordinates,
            display_name: place.display_name,
        }
    }

    /// Addresses are geocoded, coordinates are reverse geocoded for a name.
    pub fn resolve<F: Fetch>(
        query: LocationQuery,
        geocoder: &Geocoder<F>,
    ) -> Result<Self, GeocodeError> {
        let place = match &query {
            LocationQuery::Address(address) => geocoder.forward(address)?,
            LocationQuery::Coordinates(coordinates) => geocoder.reverse(*coordinates)?,
        };

        tracing::info!(
            message = "resolved location",
            query = %query,
            coordinates = %place.coordinates,
            name = %place.display_name
        );
        Ok(Self::new(query, place))
    }

    pub fn query(&self) -> &LocationQuery {
        &self.query
    }

    pub fn coordinates(&self) -> Coordinates {
        self.coordinates
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}
