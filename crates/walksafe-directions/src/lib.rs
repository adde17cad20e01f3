//! Walksafe Directions - candidate walking routes from a directions provider.
//!
//! Resolves free-text addresses to coordinates and asks for every walking
//! alternative between two points.

pub mod client;
pub mod location;

pub use client::{DirectionsClient, DirectionsConfig, RouteProvider, DEFAULT_GMAPS_URL};
pub use location::Location;
