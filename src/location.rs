//! Address resolution and nearby-facility lookup.
//!
//! Geocoding goes through OpenStreetMap Nominatim with an optional secondary
//! provider consulted before an address is reported unresolvable. Results
//! are memoized in bounded caches for the life of the process.

use std::sync::Mutex;

use serde::Deserialize;
use tap::Pipe;

use crate::cache::BoundedCache;

/// Location resolution errors.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no geocoding match for address: {0}")]
    NoMatch(String),
    #[error("geocoding request failed: {0}")]
    GeocodingService(#[source] reqwest::Error),
    #[error("facility lookup failed: {0}")]
    FacilityService(#[source] reqwest::Error),
    #[error("unexpected geocoding response: {0}")]
    MalformedResponse(String),
}

/// Resolution result.
pub type Result<T> = core::result::Result<T, Error>;

/// Geographic coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

/// A medical facility near the patient.
#[derive(Debug, Clone, PartialEq)]
pub struct Facility {
    /// Display name.
    pub name: String,
    /// Street address.
    pub address: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Rating on the source's scale, when the source provides one.
    pub rating: Option<f32>,
}

impl Facility {
    /// The facility's position.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates {
            lat: self.lat,
            lng: self.lng,
        }
    }
}

const EARTH_RADIUS_MILES: f64 = 3958.7613;

/// Great-circle distance between two points in miles (haversine).
pub fn geodesic_miles(a: Coordinates, b: Coordinates) -> f64 {
    let lat_a = a.lat.to_radians();
    let lat_b = b.lat.to_radians();
    let half_dlat = (b.lat - a.lat).to_radians() / 2.0;
    let half_dlng = (b.lng - a.lng).to_radians() / 2.0;
    let h = half_dlat.sin().powi(2) + lat_a.cos() * lat_b.cos() * half_dlng.sin().powi(2);
    2.0 * EARTH_RADIUS_MILES * h.sqrt().asin()
}

/// Maps a free-text address to coordinates.
pub trait Geocode: Send + Sync {
    /// Resolve `address`, failing with [`Error::NoMatch`] when the provider
    /// has no result for it.
    fn geocode(&self, address: &str) -> Result<Coordinates>;
}

/// Lists medical facilities around a point.
///
/// Implementations return their source listing in source order; ordering by
/// distance and truncation to the requested count happen in
/// [`LocationResolver::nearest_facilities`].
pub trait FacilitySource: Send + Sync {
    /// List facilities around `center`, at most `limit` where the source
    /// supports limiting server-side.
    fn facilities_near(&self, center: Coordinates, limit: usize) -> Result<Vec<Facility>>;
}

fn blocking_client(user_agent: &str) -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder()
        .user_agent(user_agent)
        .build()
        .expect("failed to build HTTP client")
}

/// One result row from Nominatim's search endpoint.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: String,
    #[serde(default)]
    name: Option<String>,
}

fn parse_coordinate(raw: &str) -> Result<f64> {
    raw.parse()
        .map_err(|_| Error::MalformedResponse(format!("bad coordinate: {raw}")))
}

/// Geocoder backed by OpenStreetMap Nominatim.
pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl NominatimGeocoder {
    /// Point at the public Nominatim instance. Nominatim requires an
    /// identifying User-Agent.
    pub fn new(user_agent: &str) -> Self {
        Self::with_base_url("https://nominatim.openstreetmap.org", user_agent)
    }

    /// Point at a specific Nominatim instance.
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: blocking_client(user_agent),
        }
    }
}

impl Geocode for NominatimGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinates> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", address), ("format", "json"), ("limit", "1")])
            .send()
            .map_err(Error::GeocodingService)?
            .error_for_status()
            .map_err(Error::GeocodingService)?
            .json()
            .map_err(Error::GeocodingService)?;
        let place = places
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoMatch(address.to_string()))?;
        Coordinates {
            lat: parse_coordinate(&place.lat)?,
            lng: parse_coordinate(&place.lon)?,
        }
        .pipe(Ok)
    }
}

#[derive(Debug, Deserialize)]
struct PhotonResponse {
    features: Vec<PhotonFeature>,
}

#[derive(Debug, Deserialize)]
struct PhotonFeature {
    geometry: PhotonGeometry,
}

#[derive(Debug, Deserialize)]
struct PhotonGeometry {
    /// GeoJSON order: longitude, latitude.
    coordinates: [f64; 2],
}

/// Secondary geocoder backed by Komoot Photon.
pub struct PhotonGeocoder {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl PhotonGeocoder {
    /// Point at the public Photon instance.
    pub fn new(user_agent: &str) -> Self {
        Self::with_base_url("https://photon.komoot.io", user_agent)
    }

    /// Point at a specific Photon instance.
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: blocking_client(user_agent),
        }
    }
}

impl Geocode for PhotonGeocoder {
    fn geocode(&self, address: &str) -> Result<Coordinates> {
        let response: PhotonResponse = self
            .client
            .get(format!("{}/api", self.base_url))
            .query(&[("q", address), ("limit", "1")])
            .send()
            .map_err(Error::GeocodingService)?
            .error_for_status()
            .map_err(Error::GeocodingService)?
            .json()
            .map_err(Error::GeocodingService)?;
        let feature = response
            .features
            .into_iter()
            .next()
            .ok_or_else(|| Error::NoMatch(address.to_string()))?;
        let [lng, lat] = feature.geometry.coordinates;
        Ok(Coordinates { lat, lng })
    }
}

/// Facility search backed by Nominatim's amenity search, restricted to a
/// viewbox around the query point.
pub struct NominatimFacilities {
    base_url: String,
    client: reqwest::blocking::Client,
    /// Half-width of the search viewbox in degrees.
    span: f64,
}

impl NominatimFacilities {
    /// Point at the public Nominatim instance with a ~0.25 degree viewbox.
    pub fn new(user_agent: &str) -> Self {
        Self::with_base_url("https://nominatim.openstreetmap.org", user_agent)
    }

    /// Point at a specific Nominatim instance.
    pub fn with_base_url(base_url: &str, user_agent: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: blocking_client(user_agent),
            span: 0.25,
        }
    }
}

impl FacilitySource for NominatimFacilities {
    fn facilities_near(&self, center: Coordinates, limit: usize) -> Result<Vec<Facility>> {
        let viewbox = format!(
            "{},{},{},{}",
            center.lng - self.span,
            center.lat + self.span,
            center.lng + self.span,
            center.lat - self.span
        );
        let limit = limit.max(1).to_string();
        let places: Vec<NominatimPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("q", "hospital"),
                ("format", "json"),
                ("limit", limit.as_str()),
                ("viewbox", viewbox.as_str()),
                ("bounded", "1"),
            ])
            .send()
            .map_err(Error::FacilityService)?
            .error_for_status()
            .map_err(Error::FacilityService)?
            .json()
            .map_err(Error::FacilityService)?;
        places
            .into_iter()
            .map(|place| {
                let lat = parse_coordinate(&place.lat)?;
                let lng = parse_coordinate(&place.lon)?;
                let name = place
                    .name
                    .filter(|name| !name.is_empty())
                    .or_else(|| {
                        place
                            .display_name
                            .split(',')
                            .next()
                            .map(|part| part.trim().to_string())
                    })
                    .unwrap_or_else(|| "Unnamed facility".to_string());
                Ok(Facility {
                    name,
                    address: place.display_name,
                    lat,
                    lng,
                    rating: None,
                })
            })
            .collect()
    }
}

/// Compiled-in facility listing, for demos and tests.
pub struct StaticDirectory {
    facilities: Vec<Facility>,
}

impl StaticDirectory {
    /// A directory with an explicit listing.
    pub fn new(facilities: Vec<Facility>) -> Self {
        Self { facilities }
    }

    /// The sample listing around Covington, KY.
    pub fn northern_kentucky() -> Self {
        Self::new(vec![
            Facility {
                name: "St. Elizabeth Hospital".to_string(),
                address: "1500 James Simpson Jr Way, Covington, KY".to_string(),
                lat: 39.0495,
                lng: -84.5120,
                rating: Some(4.2),
            },
            Facility {
                name: "TeleHealth Clinic".to_string(),
                address: "509 Madison Ave, Covington, KY".to_string(),
                lat: 39.1000,
                lng: -84.5000,
                rating: Some(3.8),
            },
            Facility {
                name: "Riverfront Urgent Care".to_string(),
                address: "2300 Alexandria Pike, Highland Heights, KY".to_string(),
                lat: 39.0280,
                lng: -84.4530,
                rating: None,
            },
        ])
    }
}

impl FacilitySource for StaticDirectory {
    fn facilities_near(&self, _center: Coordinates, _limit: usize) -> Result<Vec<Facility>> {
        Ok(self.facilities.clone())
    }
}

const CACHE_CAPACITY: usize = 128;

/// Key for the facility cache: coordinates in microdegrees plus the limit.
type FacilityKey = (i64, i64, usize);

fn facility_key(center: Coordinates, limit: usize) -> FacilityKey {
    (
        (center.lat * 1e6).round() as i64,
        (center.lng * 1e6).round() as i64,
        limit,
    )
}

/// Resolves addresses to coordinates and coordinates to nearby facilities,
/// memoizing both lookups for the life of the process.
///
/// The caches are guarded by a `Mutex` only because Rust requires explicit
/// interior mutability behind a shared reference; there is no other locking.
pub struct LocationResolver {
    geocoder: Box<dyn Geocode>,
    fallback: Option<Box<dyn Geocode>>,
    facilities: Box<dyn FacilitySource>,
    geocode_cache: Mutex<BoundedCache<String, Coordinates>>,
    facility_cache: Mutex<BoundedCache<FacilityKey, Vec<Facility>>>,
}

impl LocationResolver {
    /// Build a resolver over the given service handles.
    pub fn new(geocoder: Box<dyn Geocode>, facilities: Box<dyn FacilitySource>) -> Self {
        Self {
            geocoder,
            fallback: None,
            facilities,
            geocode_cache: Mutex::new(BoundedCache::new(CACHE_CAPACITY)),
            facility_cache: Mutex::new(BoundedCache::new(CACHE_CAPACITY)),
        }
    }

    /// Consult `fallback` when the primary geocoder fails, before failing.
    pub fn with_fallback(mut self, fallback: Box<dyn Geocode>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Resolve an address to coordinates, memoized by the exact (trimmed)
    /// address string.
    pub fn geocode(&self, address: &str) -> Result<Coordinates> {
        let address = address.trim();
        if let Some(hit) = self
            .geocode_cache
            .lock()
            .expect("geocode cache poisoned")
            .get(&address.to_string())
        {
            return Ok(hit);
        }
        let coordinates = match self.geocoder.geocode(address) {
            Ok(coordinates) => coordinates,
            Err(primary_error) => match &self.fallback {
                Some(fallback) => {
                    tracing::debug!(
                        address,
                        error = %primary_error,
                        "primary geocoder failed, consulting fallback"
                    );
                    fallback.geocode(address)?
                }
                None => return Err(primary_error),
            },
        };
        self.geocode_cache
            .lock()
            .expect("geocode cache poisoned")
            .insert(address.to_string(), coordinates);
        Ok(coordinates)
    }

    /// Up to `limit` facilities ordered by ascending great-circle distance
    /// from `center`. Ties keep the source listing's order.
    pub fn nearest_facilities(&self, center: Coordinates, limit: usize) -> Result<Vec<Facility>> {
        let key = facility_key(center, limit);
        if let Some(hit) = self
            .facility_cache
            .lock()
            .expect("facility cache poisoned")
            .get(&key)
        {
            return Ok(hit);
        }
        let listed = self.facilities.facilities_near(center, limit)?;
        let mut by_distance: Vec<(f64, Facility)> = listed
            .into_iter()
            .map(|facility| (geodesic_miles(center, facility.coordinates()), facility))
            .collect();
        // stable sort keeps the source listing order for equal distances
        by_distance.sort_by(|(a, _), (b, _)| a.total_cmp(b));
        let mut nearest: Vec<Facility> = by_distance
            .into_iter()
            .map(|(_, facility)| facility)
            .collect();
        nearest.truncate(limit);
        self.facility_cache
            .lock()
            .expect("facility cache poisoned")
            .insert(key, nearest.clone());
        Ok(nearest)
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;

    struct CountingGeocoder {
        calls: Arc<AtomicUsize>,
        result: Option<Coordinates>,
    }

    impl CountingGeocoder {
        fn returning(calls: &Arc<AtomicUsize>, coordinates: Coordinates) -> Self {
            Self {
                calls: calls.clone(),
                result: Some(coordinates),
            }
        }

        fn failing(calls: &Arc<AtomicUsize>) -> Self {
            Self {
                calls: calls.clone(),
                result: None,
            }
        }
    }

    impl Geocode for CountingGeocoder {
        fn geocode(&self, address: &str) -> Result<Coordinates> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result
                .ok_or_else(|| Error::NoMatch(address.to_string()))
        }
    }

    const COVINGTON: Coordinates = Coordinates {
        lat: 39.0837,
        lng: -84.5086,
    };

    #[test]
    fn geodesic_zero_for_identical_points() {
        assert_eq!(geodesic_miles(COVINGTON, COVINGTON), 0.0);
    }

    #[test]
    fn geodesic_is_symmetric() {
        let other = Coordinates {
            lat: 39.1000,
            lng: -84.5000,
        };
        let there = geodesic_miles(COVINGTON, other);
        let back = geodesic_miles(other, COVINGTON);
        assert!((there - back).abs() < 1e-9);
        assert!(there > 0.0);
    }

    #[test]
    fn geodesic_matches_known_distance() {
        // Covington, KY to Cincinnati, OH is roughly 2 miles.
        let cincinnati = Coordinates {
            lat: 39.1031,
            lng: -84.5120,
        };
        let miles = geodesic_miles(COVINGTON, cincinnati);
        assert!(miles > 1.0 && miles < 3.0, "got {miles}");
    }

    #[test]
    fn nearest_orders_by_distance_and_truncates() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(
            Box::new(CountingGeocoder::returning(&calls, COVINGTON)),
            Box::new(StaticDirectory::northern_kentucky()),
        );
        let nearest = resolver.nearest_facilities(COVINGTON, 2).unwrap();
        assert_eq!(nearest.len(), 2);
        let first = geodesic_miles(COVINGTON, nearest[0].coordinates());
        let second = geodesic_miles(COVINGTON, nearest[1].coordinates());
        assert!(first <= second);
    }

    #[test]
    fn nearest_never_exceeds_limit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(
            Box::new(CountingGeocoder::returning(&calls, COVINGTON)),
            Box::new(StaticDirectory::northern_kentucky()),
        );
        assert_eq!(resolver.nearest_facilities(COVINGTON, 0).unwrap().len(), 0);
        assert!(resolver.nearest_facilities(COVINGTON, 10).unwrap().len() <= 10);
    }

    #[test]
    fn geocode_memoizes_by_address() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(
            Box::new(CountingGeocoder::returning(&calls, COVINGTON)),
            Box::new(StaticDirectory::new(Vec::new())),
        );
        resolver.geocode("Covington, KY").unwrap();
        resolver.geocode("  Covington, KY ").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn geocode_uses_fallback_before_failing() {
        let primary_calls = Arc::new(AtomicUsize::new(0));
        let fallback_calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(
            Box::new(CountingGeocoder::failing(&primary_calls)),
            Box::new(StaticDirectory::new(Vec::new())),
        )
        .with_fallback(Box::new(CountingGeocoder::returning(
            &fallback_calls,
            COVINGTON,
        )));
        let coordinates = resolver.geocode("nowhere").unwrap();
        assert_eq!(coordinates, COVINGTON);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(fallback_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn geocode_without_fallback_surfaces_no_match() {
        let calls = Arc::new(AtomicUsize::new(0));
        let resolver = LocationResolver::new(
            Box::new(CountingGeocoder::failing(&calls)),
            Box::new(StaticDirectory::new(Vec::new())),
        );
        assert!(matches!(
            resolver.geocode("nowhere"),
            Err(Error::NoMatch(_))
        ));
    }
}
