//! Distance calculation and Auckland area lookup.
//!
//! Distances use Vincenty's inverse formula on the WGS-84 ellipsoid and fall
//! back to haversine on a mean Earth radius when the iteration does not
//! converge (near-antipodal points).

use serde::{Deserialize, Serialize};

use crate::types::StoreLocation;
use crate::ConfigError;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_B: f64 = 6_356_752.314_245;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const VINCENTY_TOLERANCE: f64 = 1e-12;
const VINCENTY_MAX_ITERATIONS: u32 = 100;
const MEAN_EARTH_RADIUS_KM: f64 = 6371.0088;

/// Distance assigned to stores without coordinates so they rank last.
pub const UNKNOWN_DISTANCE_KM: f64 = 999.0;

/// Bounding box for records that may be claimed as New-Zealand-verified.
pub const NZ_BOUNDS: BoundingBox = BoundingBox {
    north: -34.0,
    south: -47.5,
    east: 179.0,
    west: 166.0,
};

const AREAS_YAML: &str = include_str!("../../../config/areas.yaml");

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: f64,
    pub south: f64,
    pub east: f64,
    pub west: f64,
}

impl BoundingBox {
    /// Inclusive on every edge.
    #[must_use]
    pub fn contains(&self, point: Coordinate) -> bool {
        point.lat >= self.south
            && point.lat <= self.north
            && point.lng >= self.west
            && point.lng <= self.east
    }
}

/// Distance between two points in kilometres.
#[must_use]
pub fn distance_km(a: Coordinate, b: Coordinate) -> f64 {
    vincenty_km(a, b).unwrap_or_else(|| haversine_km(a, b))
}

/// Vincenty inverse solution. `None` when λ fails to converge.
#[must_use]
#[allow(clippy::many_single_char_names, clippy::similar_names)]
pub fn vincenty_km(a: Coordinate, b: Coordinate) -> Option<f64> {
    let l = (b.lng - a.lng).to_radians();
    let u1 = ((1.0 - WGS84_F) * a.lat.to_radians().tan()).atan();
    let u2 = ((1.0 - WGS84_F) * b.lat.to_radians().tan()).atan();
    let (sin_u1, cos_u1) = u1.sin_cos();
    let (sin_u2, cos_u2) = u2.sin_cos();

    let mut lambda = l;
    let mut converged = false;
    let mut sin_sigma = 0.0;
    let mut cos_sigma = 0.0;
    let mut sigma = 0.0;
    let mut cos_sq_alpha = 0.0;
    let mut cos_2sigma_m = 0.0;

    for _ in 0..VINCENTY_MAX_ITERATIONS {
        let (sin_lambda, cos_lambda) = lambda.sin_cos();
        sin_sigma = ((cos_u2 * sin_lambda).powi(2)
            + (cos_u1 * sin_u2 - sin_u1 * cos_u2 * cos_lambda).powi(2))
        .sqrt();
        if sin_sigma == 0.0 {
            // Coincident points.
            return Some(0.0);
        }
        cos_sigma = sin_u1 * sin_u2 + cos_u1 * cos_u2 * cos_lambda;
        sigma = sin_sigma.atan2(cos_sigma);
        let sin_alpha = cos_u1 * cos_u2 * sin_lambda / sin_sigma;
        cos_sq_alpha = 1.0 - sin_alpha * sin_alpha;
        cos_2sigma_m = cos_sigma - 2.0 * sin_u1 * sin_u2 / cos_sq_alpha;
        if cos_2sigma_m.is_nan() {
            // Both points on the equator.
            cos_2sigma_m = 0.0;
        }
        let c = WGS84_F / 16.0 * cos_sq_alpha * (4.0 + WGS84_F * (4.0 - 3.0 * cos_sq_alpha));
        let previous = lambda;
        lambda = l
            + (1.0 - c)
                * WGS84_F
                * sin_alpha
                * (sigma
                    + c * sin_sigma
                        * (cos_2sigma_m + c * cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))));
        if (lambda - previous).abs() <= VINCENTY_TOLERANCE {
            converged = true;
            break;
        }
    }

    if !converged {
        return None;
    }

    let u_sq = cos_sq_alpha * (WGS84_A.powi(2) - WGS84_B.powi(2)) / WGS84_B.powi(2);
    let big_a = 1.0 + u_sq / 16384.0 * (4096.0 + u_sq * (-768.0 + u_sq * (320.0 - 175.0 * u_sq)));
    let big_b = u_sq / 1024.0 * (256.0 + u_sq * (-128.0 + u_sq * (74.0 - 47.0 * u_sq)));
    let delta_sigma = big_b
        * sin_sigma
        * (cos_2sigma_m
            + big_b / 4.0
                * (cos_sigma * (-1.0 + 2.0 * cos_2sigma_m.powi(2))
                    - big_b / 6.0
                        * cos_2sigma_m
                        * (-3.0 + 4.0 * sin_sigma.powi(2))
                        * (-3.0 + 4.0 * cos_2sigma_m.powi(2))));

    Some(WGS84_B * big_a * (sigma - delta_sigma) / 1000.0)
}

/// Great-circle distance on a sphere of mean Earth radius.
#[must_use]
pub fn haversine_km(a: Coordinate, b: Coordinate) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * MEAN_EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn store_distance(origin: Coordinate, store: &StoreLocation) -> f64 {
    store.coordinates.map_or(UNKNOWN_DISTANCE_KM, |c| {
        round2(distance_km(origin, c.point()))
    })
}

fn is_verified(store: &StoreLocation) -> bool {
    store.coordinates.is_some_and(|c| c.verified)
}

/// Annotate each store with its rounded distance from `origin` and sort
/// ascending. Stores at the same rounded distance keep verified records
/// first. With `bounds`, stores outside the box (or without coordinates)
/// are dropped.
#[must_use]
pub fn nearest(
    origin: Coordinate,
    stores: &[StoreLocation],
    bounds: Option<&BoundingBox>,
) -> Vec<StoreLocation> {
    let mut ranked: Vec<StoreLocation> = stores
        .iter()
        .filter(|store| match bounds {
            Some(b) => store.coordinates.is_some_and(|c| b.contains(c.point())),
            None => true,
        })
        .map(|store| StoreLocation {
            distance_km: Some(store_distance(origin, store)),
            ..store.clone()
        })
        .collect();

    ranked.sort_by(|a, b| {
        let da = a.distance_km.unwrap_or(UNKNOWN_DISTANCE_KM);
        let db = b.distance_km.unwrap_or(UNKNOWN_DISTANCE_KM);
        da.total_cmp(&db)
            .then_with(|| is_verified(b).cmp(&is_verified(a)))
    });
    ranked
}

/// A named reference area used to place coordinates and rank stores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoArea {
    pub name: String,
    pub centroid: Coordinate,
    pub bounds: Option<BoundingBox>,
    #[serde(default)]
    pub aliases: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AreaTable {
    default_area: String,
    areas: Vec<GeoArea>,
}

impl AreaTable {
    /// Parse the area table compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the embedded YAML is malformed or the
    /// default area is missing from the table.
    pub fn embedded() -> Result<Self, ConfigError> {
        Self::from_yaml(AREAS_YAML)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError`] if `yaml` cannot be parsed or fails validation.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let table: AreaTable = serde_yaml::from_str(yaml).map_err(|source| {
            ConfigError::FixtureParse {
                name: "areas",
                source,
            }
        })?;
        if table.areas.is_empty() {
            return Err(ConfigError::Validation(
                "area table must list at least one area".to_string(),
            ));
        }
        if table.get(&table.default_area).is_none() {
            return Err(ConfigError::Validation(format!(
                "default area '{}' is not in the area table",
                table.default_area
            )));
        }
        Ok(table)
    }

    #[must_use]
    pub fn areas(&self) -> &[GeoArea] {
        &self.areas
    }

    #[must_use]
    pub fn default_area(&self) -> &str {
        &self.default_area
    }

    /// Look up an area by its canonical name (exact match).
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GeoArea> {
        self.areas.iter().find(|a| a.name == name)
    }

    /// Name of the area containing `point`, else the area with the nearest
    /// centroid. A bounding-box hit wins regardless of centroid distance.
    #[must_use]
    pub fn find_closest_area(&self, point: Coordinate) -> &str {
        if let Some(hit) = self
            .areas
            .iter()
            .find(|a| a.bounds.is_some_and(|b| b.contains(point)))
        {
            return &hit.name;
        }

        self.areas
            .iter()
            .map(|a| (a, distance_km(point, a.centroid)))
            .min_by(|(_, x), (_, y)| x.total_cmp(y))
            .map_or(self.default_area.as_str(), |(a, _)| a.name.as_str())
    }

    /// The area whose name or alias equals `name`, ignoring case.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&GeoArea> {
        let needle = name.trim().to_lowercase();
        self.areas.iter().find(|a| {
            a.name.to_lowercase() == needle || a.aliases.iter().any(|al| al.to_lowercase() == needle)
        })
    }

    /// `true` if `name` is an area name or alias, ignoring case.
    #[must_use]
    pub fn validate_location_name(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Area names whose name or any alias contains `partial`, in table order.
    #[must_use]
    pub fn location_suggestions(&self, partial: &str, limit: usize) -> Vec<&str> {
        let needle = partial.trim().to_lowercase();
        self.areas
            .iter()
            .filter(|a| {
                a.name.to_lowercase().contains(&needle)
                    || a.aliases.iter().any(|al| al.to_lowercase().contains(&needle))
            })
            .map(|a| a.name.as_str())
            .take(limit)
            .collect()
    }

    /// The `max` stores closest to `area`. Unknown areas return the first
    /// `max` stores unranked.
    #[must_use]
    pub fn closest_store_locations(
        &self,
        area: &str,
        stores: &[StoreLocation],
        max: usize,
    ) -> Vec<StoreLocation> {
        let Some(area) = self.get(area) else {
            return stores.iter().take(max).cloned().collect();
        };
        let mut ranked = nearest(area.centroid, stores, None);
        ranked.truncate(max);
        ranked
    }

    /// Annotate stores with their distance from `area` without reordering.
    #[must_use]
    pub fn update_store_distances(&self, area: &str, stores: &[StoreLocation]) -> Vec<StoreLocation> {
        let Some(area) = self.get(area) else {
            return stores.to_vec();
        };
        stores
            .iter()
            .map(|store| StoreLocation {
                distance_km: Some(store_distance(area.centroid, store)),
                ..store.clone()
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "geo_test.rs"]
mod tests;
