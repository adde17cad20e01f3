//! Bounding-box combination and grid partitioning.
//!
//! The feature API truncates any response past its feature cap, so the box
//! covering every candidate route is split into cells small enough that each
//! query stays under the cap.

use crate::error::PartitionError;
use crate::geometry::{BoundingBox, Coordinate};
use crate::route::Route;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Cell count used for a metropolitan-sized request.
pub const DEFAULT_CELL_COUNT: usize = 25;

/// Fixed-point units per degree used while computing cell edges.
pub const FIXED_POINT_SCALE: f64 = 1_000_000.0;

/// Largest gap or overlap the fixed-point grid can introduce, in degrees.
pub const FIXED_POINT_EPSILON: f64 = 1.0 / FIXED_POINT_SCALE;

/// How per-route boxes are merged into one covering box.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombineRule {
    /// Signed min/max on each axis. Valid in every hemisphere.
    #[default]
    Envelope,
    /// NE = (max lat, min lon), SW = (min lat, min lon).
    ///
    /// Reproduces the original single-city deployment (north-western
    /// hemisphere). The NE longitude picks the westernmost corner, so the
    /// result can miss the eastern edge of some routes.
    LegacyNorthWest,
}

impl FromStr for CombineRule {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "envelope" => Ok(Self::Envelope),
            "legacy" | "legacy_north_west" => Ok(Self::LegacyNorthWest),
            other => Err(format!("unknown bounding box rule: {other}")),
        }
    }
}

/// Box enclosing every route, using [`CombineRule::Envelope`].
pub fn max_bounding_box(routes: &[Route]) -> Result<BoundingBox, PartitionError> {
    max_bounding_box_with(routes, CombineRule::default())
}

pub fn max_bounding_box_with(
    routes: &[Route],
    rule: CombineRule,
) -> Result<BoundingBox, PartitionError> {
    combine_boxes(routes.iter().map(Route::bounding_box), rule).ok_or(PartitionError::NoRoutes)
}

/// Merge boxes under `rule`. `None` when `boxes` is empty.
pub fn combine_boxes(
    boxes: impl IntoIterator<Item = BoundingBox>,
    rule: CombineRule,
) -> Option<BoundingBox> {
    let mut boxes = boxes.into_iter();
    let first = boxes.next()?;

    let combined = match rule {
        CombineRule::Envelope => {
            let mut min_lat = first.ne.lat.min(first.sw.lat);
            let mut max_lat = first.ne.lat.max(first.sw.lat);
            let mut min_lon = first.ne.lon.min(first.sw.lon);
            let mut max_lon = first.ne.lon.max(first.sw.lon);
            for bbox in boxes {
                min_lat = min_lat.min(bbox.ne.lat.min(bbox.sw.lat));
                max_lat = max_lat.max(bbox.ne.lat.max(bbox.sw.lat));
                min_lon = min_lon.min(bbox.ne.lon.min(bbox.sw.lon));
                max_lon = max_lon.max(bbox.ne.lon.max(bbox.sw.lon));
            }
            BoundingBox::from_extremes(min_lat, min_lon, max_lat, max_lon)
        }
        CombineRule::LegacyNorthWest => boxes.fold(first, |acc, bbox| {
            BoundingBox::new(
                Coordinate::new(acc.ne.lat.max(bbox.ne.lat), acc.ne.lon.min(bbox.ne.lon)),
                Coordinate::new(acc.sw.lat.min(bbox.sw.lat), acc.sw.lon.min(bbox.sw.lon)),
            )
        }),
    };

    Some(combined)
}

/// Tile `bbox` into a `sqrt(cell_count)` x `sqrt(cell_count)` grid.
///
/// Edges are computed on a micro-degree integer grid, so neighbouring cells
/// share exact edges and the outer edges match `bbox` to within
/// [`FIXED_POINT_EPSILON`]. Output order is row-major but not part of the
/// contract.
pub fn split_box(bbox: &BoundingBox, cell_count: usize) -> Result<Vec<BoundingBox>, PartitionError> {
    let side = cells_per_side(cell_count)?;

    if !bbox.is_valid() || !bbox.has_area() {
        return Err(PartitionError::ZeroArea);
    }

    let lat0 = to_fixed(bbox.sw.lat);
    let lat1 = to_fixed(bbox.ne.lat);
    let lon0 = to_fixed(bbox.sw.lon);
    let lon1 = to_fixed(bbox.ne.lon);

    let total_lat = lat1 - lat0;
    let total_lon = lon1 - lon0;
    if total_lat <= 0 || total_lon <= 0 {
        return Err(PartitionError::ZeroArea);
    }
    if total_lat < side as i64 || total_lon < side as i64 {
        return Err(PartitionError::TooSmall {
            cells_per_side: side,
        });
    }

    let lat_edges = grid_edges(lat0, total_lat, side);
    let lon_edges = grid_edges(lon0, total_lon, side);

    let mut cells = Vec::with_capacity(cell_count);
    for lat in lat_edges.windows(2) {
        for lon in lon_edges.windows(2) {
            cells.push(BoundingBox::from_extremes(
                from_fixed(lat[0]),
                from_fixed(lon[0]),
                from_fixed(lat[1]),
                from_fixed(lon[1]),
            ));
        }
    }

    tracing::debug!(cells = cells.len(), side, "split bounding box");
    Ok(cells)
}

fn cells_per_side(cell_count: usize) -> Result<usize, PartitionError> {
    let side = (cell_count as f64).sqrt().round() as usize;
    if side == 0 || side.checked_mul(side) != Some(cell_count) {
        return Err(PartitionError::NotPerfectSquare(cell_count));
    }
    Ok(side)
}

/// `side + 1` edges from `start` to `start + total`, spreading the remainder.
fn grid_edges(start: i64, total: i64, side: usize) -> Vec<i64> {
    let side = side as i64;
    (0..=side).map(|i| start + total * i / side).collect()
}

fn to_fixed(deg: f64) -> i64 {
    (deg * FIXED_POINT_SCALE).round() as i64
}

fn from_fixed(units: i64) -> f64 {
    units as f64 / FIXED_POINT_SCALE
}
