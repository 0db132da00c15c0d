use crate::mercator::{LATITUDE_MAX, LATITUDE_MIN};
use crate::MapFileError;

#[derive(Debug, Clone, PartialEq)]
pub struct BoundingBox {
    pub min_latitude: f64,
    pub min_longitude: f64,
    pub max_latitude: f64,
    pub max_longitude: f64,
}

impl BoundingBox {
    pub fn new(
        min_latitude: f64,
        min_longitude: f64,
        max_latitude: f64,
        max_longitude: f64,
    ) -> Result<Self, MapFileError> {
        if min_latitude > max_latitude {
            return Err(MapFileError::format(format!(
                "invalid latitude range: {} {}",
                min_latitude, max_latitude
            )));
        }
        if min_longitude > max_longitude {
            return Err(MapFileError::format(format!(
                "invalid longitude range: {} {}",
                min_longitude, max_longitude
            )));
        }
        Ok(Self {
            min_latitude,
            min_longitude,
            max_latitude,
            max_longitude,
        })
    }

    pub fn get_center_point(&self) -> LatLong {
        LatLong {
            latitude: (self.min_latitude + self.max_latitude) / 2.0,
            longitude: (self.min_longitude + self.max_longitude) / 2.0,
        }
    }

    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        latitude >= self.min_latitude
            && latitude <= self.max_latitude
            && longitude >= self.min_longitude
            && longitude <= self.max_longitude
    }

    pub fn contains_lat_long(&self, lat_long: &LatLong) -> bool {
        self.contains(lat_long.latitude, lat_long.longitude)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        !(other.min_latitude > self.max_latitude
            || other.max_latitude < self.min_latitude
            || other.min_longitude > self.max_longitude
            || other.max_longitude < self.min_longitude)
    }

    /// Returns true if any node lies inside this box, or if the box spanned by
    /// all nodes overlaps it.
    pub fn intersects_area(&self, way_nodes: &[Vec<LatLong>]) -> bool {
        let mut nodes = way_nodes.iter().flatten().peekable();
        let Some(first) = nodes.peek() else {
            return false;
        };

        let mut area = BoundingBox {
            min_latitude: first.latitude,
            min_longitude: first.longitude,
            max_latitude: first.latitude,
            max_longitude: first.longitude,
        };
        for node in nodes {
            if self.contains_lat_long(node) {
                return true;
            }
            area.min_latitude = area.min_latitude.min(node.latitude);
            area.min_longitude = area.min_longitude.min(node.longitude);
            area.max_latitude = area.max_latitude.max(node.latitude);
            area.max_longitude = area.max_longitude.max(node.longitude);
        }

        self.intersects(&area)
    }

    /// Smallest box covering both `self` and `other`.
    pub fn extend_bounding_box(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min_latitude: self.min_latitude.min(other.min_latitude),
            min_longitude: self.min_longitude.min(other.min_longitude),
            max_latitude: self.max_latitude.max(other.max_latitude),
            max_longitude: self.max_longitude.max(other.max_longitude),
        }
    }

    /// Grows the box by `meters` on every side, clamped to the valid
    /// latitude/longitude range.
    pub fn extend_meters(&self, meters: u32) -> BoundingBox {
        if meters == 0 {
            return self.clone();
        }

        let vertical_expansion = LatLongUtils::latitude_distance(meters);
        let horizontal_expansion = LatLongUtils::longitude_distance(
            meters,
            self.min_latitude.abs().max(self.max_latitude.abs()),
        );

        BoundingBox {
            min_latitude: LATITUDE_MIN.max(self.min_latitude - vertical_expansion),
            min_longitude: LatLongUtils::LONGITUDE_MIN
                .max(self.min_longitude - horizontal_expansion),
            max_latitude: LATITUDE_MAX.min(self.max_latitude + vertical_expansion),
            max_longitude: LatLongUtils::LONGITUDE_MAX
                .min(self.max_longitude + horizontal_expansion),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LatLong {
    pub latitude: f64,
    pub longitude: f64,
}

impl LatLong {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    const KEY_VALUE_SEPARATOR: char = '=';

    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Parses a tag table entry of the form `key=value`. An entry without a
    /// separator becomes a key with an empty value.
    pub fn from_string(tag: impl AsRef<str>) -> Self {
        let tag = tag.as_ref();
        match tag.split_once(Self::KEY_VALUE_SEPARATOR) {
            Some((key, value)) => Self::new(key, value),
            None => Self::new(tag, ""),
        }
    }
}

pub struct LatLongUtils;

impl LatLongUtils {
    pub const LONGITUDE_MAX: f64 = 180.0;
    pub const LONGITUDE_MIN: f64 = -180.0;
    pub const EQUATORIAL_RADIUS: f64 = 6_378_137.0;
    const CONVERSION_FACTOR: f64 = 1_000_000.0;

    pub fn microdegrees_to_degrees(microdegrees: i32) -> f64 {
        microdegrees as f64 / Self::CONVERSION_FACTOR
    }

    /// Degrees of latitude covered by `meters`.
    pub fn latitude_distance(meters: u32) -> f64 {
        (meters as f64 * 360.0) / (2.0 * std::f64::consts::PI * Self::EQUATORIAL_RADIUS)
    }

    /// Degrees of longitude covered by `meters` at the given latitude.
    pub fn longitude_distance(meters: u32, latitude: f64) -> f64 {
        (meters as f64 * 360.0)
            / (2.0
                * std::f64::consts::PI
                * Self::EQUATORIAL_RADIUS
                * latitude.to_radians().cos())
    }

    pub fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }
}
