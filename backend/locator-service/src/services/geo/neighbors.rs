use super::geohash::{cell_span_degrees, GeohashCodec};
use crate::error::Result;
use crate::models::Coordinate;

const OFFSETS: [f64; 3] = [-1.0, 0.0, 1.0];

/// The 3x3 block of cells around `cell`, `cell` included.
///
/// Neighbors are found by shifting the cell center one cell span in each
/// direction and re-encoding, not by true geohash adjacency. Shifted points
/// outside the valid latitude/longitude range are dropped rather than wrapped,
/// so cells on the poles or the antimeridian get fewer than 9 entries and
/// anything just across the 180th meridian is never scanned. Callers rely on
/// that recall gap staying as it is: result limits were tuned against it.
///
/// Output is in grid order (south-west to north-east) with duplicates removed.
pub fn neighbors(codec: &GeohashCodec, cell: &str) -> Result<Vec<String>> {
    let center = codec.decode(cell)?;
    let precision = cell.len();
    let (lat_span, lon_span) = cell_span_degrees(precision);

    let mut cells: Vec<String> = Vec::with_capacity(9);
    for dlat in OFFSETS {
        for dlon in OFFSETS {
            let lat = center.latitude() + dlat * lat_span;
            let lon = center.longitude() + dlon * lon_span;

            let Ok(shifted) = Coordinate::new(lat, lon) else {
                continue;
            };

            let neighbor = codec.encode(&shifted, precision)?;
            if !cells.contains(&neighbor) {
                cells.push(neighbor);
            }
        }
    }

    Ok(cells)
}
