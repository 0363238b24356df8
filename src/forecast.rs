//! Time series extraction from a met.no `locationforecast` document.
//!
//! Readings (`<temperature value=".."/>`, `<precipitation value=".."/>`) sit
//! two levels below a `<time from=".." to="..">` interval marker:
//!
//! ```xml
//! <time datatype="forecast" from="2023-01-01T00:00:00Z" to="2023-01-01T01:00:00Z">
//!   <location altitude="237" latitude="49.2107" longitude="16.5942">
//!     <precipitation unit="mm" value="1.5"/>
//!   </location>
//! </time>
//! ```

use miette::Diagnostic;
use thiserror::Error;
use time::{macros::format_description, OffsetDateTime, PrimitiveDateTime, Time};

use crate::document::{Document, Node};
use crate::Options;

/// Precipitation samples with exactly this value are left out of the series.
pub const ZERO_PRECIPITATION: &str = "0.0";

#[derive(Debug, Error, Diagnostic)]
pub enum ExtractError {
    #[error("Malformed timestamp `{value}`")]
    #[diagnostic(
        code(meteogram::forecast::malformed_timestamp),
        help("timestamps must look like 2023-01-01T00:00:00Z")
    )]
    MalformedTimestamp {
        value: String,
        #[source]
        source: time::error::Parse,
    },
    #[error("`{reading}` reading has no enclosing interval marker")]
    #[diagnostic(
        code(meteogram::forecast::missing_interval_marker),
        help("readings are expected two levels below an element with `from` and `to` attributes")
    )]
    MissingIntervalMarker { reading: String },
    #[error("`{reading}` reading has no `value` attribute")]
    #[diagnostic(code(meteogram::forecast::missing_value))]
    MissingReadingValue { reading: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Measurement {
    Temperature,
    Precipitation,
}

impl Measurement {
    pub fn element_name(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Precipitation => "precipitation",
        }
    }

    fn heading(self) -> &'static str {
        match self {
            Self::Temperature => "TEMPERATURE",
            Self::Precipitation => "PRECIPITATION",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalMarker {
    pub from: OffsetDateTime,
    pub to: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub timestamp: OffsetDateTime,
    // Kept as written in the document, the renderer does the parsing
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub measurement: Measurement,
    // Document order, not necessarily chronological
    pub samples: Vec<Sample>,
}

impl Series {
    pub fn new(measurement: Measurement) -> Self {
        Self {
            measurement,
            samples: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }

    pub fn is_chronological(&self) -> bool {
        self.samples
            .windows(2)
            .all(|pair| pair[0].timestamp <= pair[1].timestamp)
    }

    /// Earliest and latest timestamp, or `None` for an empty series.
    pub fn time_span(&self) -> Option<(OffsetDateTime, OffsetDateTime)> {
        let first = self.samples.iter().map(|s| s.timestamp).min()?;
        let last = self.samples.iter().map(|s| s.timestamp).max()?;
        Some((first, last))
    }

    /// A copy ordered by timestamp. Samples with equal timestamps keep their
    /// document order.
    pub fn sorted_by_time(&self) -> Self {
        let mut samples = self.samples.clone();
        samples.sort_by_key(|sample| sample.timestamp);
        Self {
            measurement: self.measurement,
            samples,
        }
    }

    /// Splits the series into days. A new day starts at every sample taken
    /// exactly at midnight, unless the current day is still empty.
    pub fn partition_into_days(&self) -> Vec<&[Sample]> {
        let mut days = Vec::new();
        let mut start = 0;
        for (index, sample) in self.samples.iter().enumerate() {
            if sample.timestamp.time() == Time::MIDNIGHT && index > start {
                days.push(&self.samples[start..index]);
                start = index;
            }
        }
        if start < self.samples.len() {
            days.push(&self.samples[start..]);
        }
        days
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Sample;
    type IntoIter = std::slice::Iter<'a, Sample>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Forecast {
    pub temperatures: Series,
    pub precipitation: Series,
}

impl Forecast {
    pub fn extract(document: &Document, options: &Options) -> Result<Self, ExtractError> {
        let temperatures = extract_temperatures(document, options)?;
        let precipitation = extract_precipitation(document, options)?;
        tracing::info!(
            message = "extracted forecast",
            temperatures = temperatures.len(),
            precipitation = precipitation.len()
        );
        Ok(Self {
            temperatures,
            precipitation,
        })
    }
}

pub fn parse_timestamp(value: &str) -> Result<OffsetDateTime, ExtractError> {
    PrimitiveDateTime::parse(
        value,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
    )
    .map(PrimitiveDateTime::assume_utc)
    .map_err(|source| ExtractError::MalformedTimestamp {
        value: value.to_string(),
        source,
    })
}

fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(format_description!(
            "[year]-[month]-[day] [hour]:[minute]:[second]"
        ))
        .unwrap_or_else(|_| timestamp.to_string())
}

/// The `from`/`to` window a reading applies to, read from the element two
/// levels above it.
pub fn enclosing_interval_marker(reading: Node<'_>) -> Result<IntervalMarker, ExtractError> {
    let missing = || ExtractError::MissingIntervalMarker {
        reading: reading.name().to_string(),
    };

    let marker = reading
        .parent()
        .and_then(|parent| parent.parent())
        .ok_or_else(missing)?;
    let from = marker.attribute("from").ok_or_else(missing)?;
    let to = marker.attribute("to").ok_or_else(missing)?;

    Ok(IntervalMarker {
        from: parse_timestamp(from)?,
        to: parse_timestamp(to)?,
    })
}

/// Every reading of one measurement in document order, without filtering.
fn extract_readings(
    document: &Document,
    measurement: Measurement,
    options: &Options,
) -> Result<Series, ExtractError> {
    if options.verbose {
        println!("\n{}\n", measurement.heading());
    }

    let mut series = Series::new(measurement);
    for reading in document.elements_named(measurement.element_name()) {
        let interval = enclosing_interval_marker(reading)?;
        let value = reading
            .attribute("value")
            .ok_or_else(|| ExtractError::MissingReadingValue {
                reading: reading.name().to_string(),
            })?;

        if options.verbose {
            println!(
                "{}\t{}\t{}",
                format_timestamp(interval.from),
                format_timestamp(interval.to),
                value
            );
        }

        series.samples.push(Sample {
            timestamp: interval.from,
            value: value.to_string(),
        });
    }

    Ok(series)
}

fn report(series: &Series) {
    let measurement = series.measurement.element_name();
    if series.is_empty() {
        tracing::warn!(message = "forecast contains no readings", measurement);
    } else if !series.is_chronological() {
        tracing::warn!(message = "readings are not ordered by time", measurement);
    } else {
        tracing::debug!(
            message = "extracted readings",
            measurement,
            samples = series.len()
        );
    }
}

pub fn extract_temperatures(
    document: &Document,
    options: &Options,
) -> Result<Series, ExtractError> {
    let series = extract_readings(document, Measurement::Temperature, options)?;
    report(&series);
    Ok(series)
}

/// Like [`extract_temperatures`], but drops every `0.0` sample so the chart
/// isn't cluttered with empty bars.
pub fn extract_precipitation(
    document: &Document,
    options: &Options,
) -> Result<Series, ExtractError> {
    let mut series = extract_readings(document, Measurement::Precipitation, options)?;
    series.samples.retain(|sample| sample.value != ZERO_PRECIPITATION);
    report(&series);
    Ok(series)
}
