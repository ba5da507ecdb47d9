//! Great-circle distances and radius prefilters.

use serde::Serialize;

/// Mean earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Widening applied to bounding boxes so that rows lying exactly on the
/// radius survive floating point rounding.
const BBOX_MARGIN_DEG: f64 = 1e-6;

/// A WGS84 point in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    /// A point, or `None` when either coordinate is out of range.
    pub fn try_new(lat: f64, lng: f64) -> Option<Self> {
        let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
        let lng_ok = lng.is_finite() && (-180.0..=180.0).contains(&lng);
        (lat_ok && lng_ok).then_some(Self { lat, lng })
    }

    /// A point from nullable row columns. Both must be present.
    pub fn from_columns(lat: Option<f64>, lng: Option<f64>) -> Option<Self> {
        match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Self { lat, lng }),
            _ => None,
        }
    }
}

/// Great-circle distance between two points using the haversine formula.
///
/// No rounding is applied.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let (lat1, lat2) = (a.lat.to_radians(), b.lat.to_radians());
    let dlat = (b.lat - a.lat).to_radians();
    let dlng = (b.lng - a.lng).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
    // Rounding can push h marginally outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Center point with an optional radius, as requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoQuery {
    pub center: GeoPoint,
    /// Only rows within this many kilometres are kept when set.
    pub radius_km: Option<f64>,
}

impl GeoQuery {
    /// Distance from the center to a row's coordinates, if it has any.
    pub fn distance_to(&self, lat: Option<f64>, lng: Option<f64>) -> Option<f64> {
        GeoPoint::from_columns(lat, lng).map(|p| haversine_km(self.center, p))
    }

    /// Whether a row at `distance` passes the radius filter.
    ///
    /// Without a radius every row passes; with one, rows without
    /// coordinates never do.
    pub fn admits(&self, distance: Option<f64>) -> bool {
        match (self.radius_km, distance) {
            (None, _) => true,
            (Some(radius), Some(d)) => d <= radius,
            (Some(_), None) => false,
        }
    }

    /// Storage prefilter for the radius, if one was requested.
    pub fn bounding_box(&self) -> Option<BoundingBox> {
        self.radius_km
            .map(|radius| BoundingBox::around(self.center, radius))
    }
}

/// Latitude/longitude ranges enclosing a circle on the sphere.
///
/// The longitude range is omitted when the circle reaches a pole or
/// crosses the antimeridian; the latitude range alone then bounds it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub lng_range: Option<(f64, f64)>,
}

impl BoundingBox {
    /// The smallest box containing every point within `radius_km` of `center`.
    pub fn around(center: GeoPoint, radius_km: f64) -> Self {
        let angular = radius_km / EARTH_RADIUS_KM;
        let dlat = angular.to_degrees() + BBOX_MARGIN_DEG;

        let min_lat = center.lat - dlat;
        let max_lat = center.lat + dlat;

        if min_lat <= -90.0 || max_lat >= 90.0 {
            return Self {
                min_lat: min_lat.max(-90.0),
                max_lat: max_lat.min(90.0),
                lng_range: None,
            };
        }

        let ratio = angular.sin() / center.lat.to_radians().cos();
        let lng_range = if ratio >= 1.0 {
            None
        } else {
            let dlng = ratio.asin().to_degrees() + BBOX_MARGIN_DEG;
            let (min_lng, max_lng) = (center.lng - dlng, center.lng + dlng);
            (min_lng >= -180.0 && max_lng <= 180.0).then_some((min_lng, max_lng))
        };

        Self {
            min_lat,
            max_lat,
            lng_range,
        }
    }

    /// Whether the box contains `point`.
    pub fn contains(&self, point: GeoPoint) -> bool {
        if point.lat < self.min_lat || point.lat > self.max_lat {
            return false;
        }
        match self.lng_range {
            Some((min, max)) => point.lng >= min && point.lng <= max,
            None => true,
        }
    }
}
