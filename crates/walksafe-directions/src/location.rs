//! Route endpoints: either something to geocode or a literal coordinate.

use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use walksafe_core::Coordinate;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Location {
    Coordinate(Coordinate),
    Address(String),
}

impl Location {
    pub fn is_address(&self) -> bool {
        matches!(self, Self::Address(_))
    }

    /// `"lat,lon"` as the provider expects it.
    pub fn as_query(&self) -> String {
        match self {
            Self::Coordinate(coord) => format!("{},{}", coord.lat, coord.lon),
            Self::Address(address) => address.clone(),
        }
    }
}

/// `"43.0,-81.2"` parses as a coordinate; anything else is an address.
impl FromStr for Location {
    type Err = Infallible;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        let parsed = value.split_once(',').and_then(|(lat, lon)| {
            let lat = lat.trim().parse::<f64>().ok()?;
            let lon = lon.trim().parse::<f64>().ok()?;
            let coord = Coordinate::new(lat, lon);
            coord.validate().ok().map(|_| coord)
        });

        Ok(match parsed {
            Some(coord) => Self::Coordinate(coord),
            None => Self::Address(value.to_string()),
        })
    }
}

impl From<Coordinate> for Location {
    fn from(coord: Coordinate) -> Self {
        Self::Coordinate(coord)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_query())
    }
}
