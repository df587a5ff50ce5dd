use std::fmt;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// The coordinate rounded to micro-degrees.
    ///
    /// Two coordinates with the same key are the same point for marker
    /// highlighting; raw float equality is never used.
    pub fn micro_key(&self) -> (i64, i64) {
        (
            (self.latitude * 1e6).round() as i64,
            (self.longitude * 1e6).round() as i64,
        )
    }

    /// Round both components to six decimals.
    pub fn rounded(&self) -> Self {
        Self::new(round6(self.latitude), round6(self.longitude))
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

fn round6(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

// =============================================================================
// Coordinate List
// =============================================================================

/// Ordered marker coordinates for a multi-marker map.
///
/// The text form is `lat,lon-lat,lon-...`. A `-` directly after a digit or a
/// dot separates pairs; any other `-` is a sign, so negative coordinates
/// survive the round trip.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateList {
    coordinates: Vec<Coordinate>,
}

impl CoordinateList {
    /// Build a list from coordinates.
    ///
    /// Returns `None` for an empty slice.
    pub fn new(coordinates: Vec<Coordinate>) -> Option<Self> {
        if coordinates.is_empty() {
            None
        } else {
            Some(Self { coordinates })
        }
    }

    /// Parse the dash-joined text form.
    pub fn parse(text: &str) -> Result<Self, String> {
        let mut coordinates = Vec::new();

        for pair in split_pairs(text) {
            let (lat, lon) = pair
                .split_once(',')
                .ok_or_else(|| format!("coordinate {pair:?} is not \"lat,lon\""))?;
            let latitude: f64 = lat
                .parse()
                .map_err(|_| format!("invalid latitude {lat:?}"))?;
            let longitude: f64 = lon
                .parse()
                .map_err(|_| format!("invalid longitude {lon:?}"))?;
            if !latitude.is_finite() || !longitude.is_finite() {
                return Err(format!("coordinate {pair:?} is not finite"));
            }
            coordinates.push(Coordinate::new(latitude, longitude));
        }

        Self::new(coordinates).ok_or_else(|| "missing coordinates".to_string())
    }

    pub fn coordinates(&self) -> &[Coordinate] {
        &self.coordinates
    }

    pub fn len(&self) -> usize {
        self.coordinates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coordinates.is_empty()
    }

    /// Midpoint of the bounding box, rounded to six decimals.
    pub fn center(&self) -> Coordinate {
        let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_lon, mut max_lon) = (f64::INFINITY, f64::NEG_INFINITY);

        for c in &self.coordinates {
            min_lat = min_lat.min(c.latitude);
            max_lat = max_lat.max(c.latitude);
            min_lon = min_lon.min(c.longitude);
            max_lon = max_lon.max(c.longitude);
        }

        Coordinate::new((min_lat + max_lat) / 2.0, (min_lon + max_lon) / 2.0).rounded()
    }
}

impl fmt::Display for CoordinateList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, c) in self.coordinates.iter().enumerate() {
            if i > 0 {
                f.write_str("-")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

fn split_pairs(text: &str) -> Vec<&str> {
    let mut pairs = Vec::new();
    let mut start = 0;
    let mut previous: Option<char> = None;

    for (i, c) in text.char_indices() {
        if c == '-' && previous.is_some_and(|p| p.is_ascii_digit() || p == '.') {
            pairs.push(&text[start..i]);
            start = i + 1;
        }
        previous = Some(c);
    }
    if start < text.len() {
        pairs.push(&text[start..]);
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let list = CoordinateList::parse("48.8566,2.3522-45.764,4.8357").unwrap();
        assert_eq!(list.len(), 2);
        assert_eq!(list.coordinates()[1], Coordinate::new(45.764, 4.8357));
        assert_eq!(list.to_string(), "48.8566,2.3522-45.764,4.8357");
    }

    #[test]
    fn test_parse_negative_values() {
        let list = CoordinateList::parse("-33.8688,151.2093--34.9285,-58.5").unwrap();
        assert_eq!(
            list.coordinates(),
            &[
                Coordinate::new(-33.8688, 151.2093),
                Coordinate::new(-34.9285, -58.5)
            ]
        );
        assert_eq!(list.to_string(), "-33.8688,151.2093--34.9285,-58.5");
    }

    #[test]
    fn test_parse_errors() {
        assert!(CoordinateList::parse("").is_err());
        assert!(CoordinateList::parse("48.8").is_err());
        assert!(CoordinateList::parse("a,b").is_err());
        assert!(CoordinateList::parse("NaN,1").is_err());
    }

    #[test]
    fn test_center_is_rounded_midpoint() {
        let list = CoordinateList::parse("48.8566,2.3522-45.764,4.8357").unwrap();
        let center = list.center();
        assert_eq!(center, Coordinate::new(47.3103, 3.59395));
    }

    #[test]
    fn test_micro_key() {
        let a = Coordinate::new(47.3103, 3.59395);
        let b = Coordinate::new(47.310_300_000_1, 3.593_949_999_9);
        assert_eq!(a.micro_key(), b.micro_key());
        assert_ne!(a.micro_key(), Coordinate::new(47.3104, 3.59395).micro_key());
    }
}
