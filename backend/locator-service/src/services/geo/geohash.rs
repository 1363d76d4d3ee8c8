use crate::error::{LocatorError, Result};
use crate::models::Coordinate;

/// Standard geohash alphabet (no a, i, l, o).
pub const DEFAULT_ALPHABET: &str = "0123456789bcdefghjkmnpqrstuvwxyz";

/// Longest cell key accepted. 12 characters is ~3.7cm x 1.9cm at the equator,
/// well past what f64 interval halving can still distinguish meaningfully.
pub const MAX_PRECISION: usize = 12;

const BITS_PER_CHAR: usize = 5;

/// Latitude/longitude interval covered by one geohash cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl CellBounds {
    fn world() -> Self {
        Self {
            min_lat: -90.0,
            max_lat: 90.0,
            min_lon: -180.0,
            max_lon: 180.0,
        }
    }

    pub fn center(&self) -> Result<Coordinate> {
        Coordinate::new(
            (self.min_lat + self.max_lat) / 2.0,
            (self.min_lon + self.max_lon) / 2.0,
        )
    }

    /// Closed-interval membership test.
    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_lat..=self.max_lat).contains(&point.latitude())
            && (self.min_lon..=self.max_lon).contains(&point.longitude())
    }
}

/// Number of bits each axis consumes for a key of `precision` characters.
///
/// Longitude is subdivided first, so it takes the extra bit when the total is odd.
pub fn axis_bits(precision: usize) -> (u32, u32) {
    let total = (precision * BITS_PER_CHAR) as u32;
    let lon_bits = total.div_ceil(2);
    let lat_bits = total / 2;
    (lat_bits, lon_bits)
}

/// Height and width in degrees of a cell at `precision`.
pub fn cell_span_degrees(precision: usize) -> (f64, f64) {
    let (lat_bits, lon_bits) = axis_bits(precision);
    (
        180.0 / 2f64.powi(lat_bits as i32),
        360.0 / 2f64.powi(lon_bits as i32),
    )
}

/// Base-32 geohash encoder/decoder.
///
/// The alphabet is owned by the codec so tests (or a store with a legacy key
/// scheme) can swap it without touching global state.
#[derive(Debug, Clone)]
pub struct GeohashCodec {
    alphabet: [u8; 32],
    lookup: [Option<u8>; 128],
}

impl Default for GeohashCodec {
    fn default() -> Self {
        // DEFAULT_ALPHABET is 32 distinct ASCII chars
        Self::build(DEFAULT_ALPHABET.as_bytes())
    }
}

impl GeohashCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec over a custom alphabet of exactly 32 distinct ASCII characters.
    pub fn with_alphabet(alphabet: &str) -> Result<Self> {
        let bytes = alphabet.as_bytes();
        if bytes.len() != 32 || !alphabet.is_ascii() {
            return Err(LocatorError::InvalidAlphabet(format!(
                "expected 32 ASCII characters, got {:?}",
                alphabet
            )));
        }

        let mut seen = [false; 128];
        for &b in bytes {
            if seen[b as usize] {
                return Err(LocatorError::InvalidAlphabet(format!(
                    "duplicate character '{}'",
                    b as char
                )));
            }
            seen[b as usize] = true;
        }

        Ok(Self::build(bytes))
    }

    fn build(bytes: &[u8]) -> Self {
        let mut alphabet = [0u8; 32];
        alphabet.copy_from_slice(&bytes[..32]);

        let mut lookup = [None; 128];
        for (value, &b) in alphabet.iter().enumerate() {
            lookup[b as usize] = Some(value as u8);
        }

        Self { alphabet, lookup }
    }

    /// Encode a validated coordinate into a cell key of `precision` characters.
    ///
    /// A coordinate sitting exactly on a midpoint takes the lower half (bit 0).
    /// Keys already persisted by the write side depend on this tie rule.
    pub fn encode(&self, point: &Coordinate, precision: usize) -> Result<String> {
        validate_precision(precision)?;

        let mut lat_range = (-90.0_f64, 90.0_f64);
        let mut lon_range = (-180.0_f64, 180.0_f64);
        let mut hash = String::with_capacity(precision);
        let mut ch = 0u8;
        let mut bit = 0;
        let mut even = true;

        while hash.len() < precision {
            let (range, value) = if even {
                (&mut lon_range, point.longitude())
            } else {
                (&mut lat_range, point.latitude())
            };

            let mid = (range.0 + range.1) / 2.0;
            if value > mid {
                ch |= 1 << (BITS_PER_CHAR - 1 - bit);
                range.0 = mid;
            } else {
                range.1 = mid;
            }

            even = !even;
            bit += 1;
            if bit == BITS_PER_CHAR {
                hash.push(self.alphabet[ch as usize] as char);
                bit = 0;
                ch = 0;
            }
        }

        Ok(hash)
    }

    /// Validating shorthand for `encode(&Coordinate::new(lat, lon)?, precision)`.
    pub fn encode_lat_lon(&self, lat: f64, lon: f64, precision: usize) -> Result<String> {
        let point = Coordinate::new(lat, lon)?;
        self.encode(&point, precision)
    }

    /// Interval covered by `cell`.
    pub fn bounds(&self, cell: &str) -> Result<CellBounds> {
        if cell.is_empty() {
            return Err(LocatorError::EmptyGeohash);
        }
        validate_precision(cell.len())?;

        let mut bounds = CellBounds::world();
        let mut even = true;

        for c in cell.chars() {
            let value = self.value_of(c)?;

            for shift in (0..BITS_PER_CHAR).rev() {
                let set = (value >> shift) & 1 == 1;
                let (lo, hi) = if even {
                    (&mut bounds.min_lon, &mut bounds.max_lon)
                } else {
                    (&mut bounds.min_lat, &mut bounds.max_lat)
                };

                let mid = (*lo + *hi) / 2.0;
                if set {
                    *lo = mid;
                } else {
                    *hi = mid;
                }
                even = !even;
            }
        }

        Ok(bounds)
    }

    /// Center of `cell`. Lossy: only bucket membership survives a round trip.
    pub fn decode(&self, cell: &str) -> Result<Coordinate> {
        self.bounds(cell)?.center()
    }

    fn value_of(&self, c: char) -> Result<u8> {
        if !c.is_ascii() {
            return Err(LocatorError::InvalidGeohashChar(c));
        }
        self.lookup[c as usize].ok_or(LocatorError::InvalidGeohashChar(c))
    }
}

fn validate_precision(precision: usize) -> Result<()> {
    if precision == 0 || precision > MAX_PRECISION {
        return Err(LocatorError::InvalidPrecision(precision));
    }
    Ok(())
}
