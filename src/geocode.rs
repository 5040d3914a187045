//! Geocoding - place name to coordinates, behind an injectable trait
//!
//! Lookups are best-effort: any failure for one name becomes a missing
//! coordinate pair and that name is left off the map.

use crate::aggregate::GroupValue;
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Coordinates for a place name, `None` when nothing matched
    async fn lookup(&self, name: &str) -> Result<Option<Coordinates>>;
}

/// OpenStreetMap Nominatim search endpoint
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinates>> {
        let places: Vec<NominatimPlace> = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", name), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };
        let lat = place
            .lat
            .parse::<f64>()
            .map_err(|e| DashboardError::Geocoding(format!("bad latitude for '{}': {}", name, e)))?;
        let lon = place
            .lon
            .parse::<f64>()
            .map_err(|e| DashboardError::Geocoding(format!("bad longitude for '{}': {}", name, e)))?;
        Ok(Some(Coordinates { lat, lon }))
    }
}

/// Fixed lookup table; used offline and in tests
#[derive(Debug, Clone, Default)]
pub struct StaticGeocoder {
    places: HashMap<String, Coordinates>,
}

impl StaticGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, lat: f64, lon: f64) -> Self {
        self.places.insert(name.to_string(), Coordinates { lat, lon });
        self
    }
}

#[async_trait]
impl Geocoder for StaticGeocoder {
    async fn lookup(&self, name: &str) -> Result<Option<Coordinates>> {
        Ok(self.places.get(name).copied())
    }
}

/// A located category with its weight
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MapPoint {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub count: f64,
}

/// Geocode each group key in turn. Names that fail or do not resolve are
/// dropped.
pub async fn locate(groups: &[GroupValue], geocoder: &dyn Geocoder) -> Vec<MapPoint> {
    let mut points = Vec::with_capacity(groups.len());
    for group in groups {
        match geocoder.lookup(&group.key).await {
            Ok(Some(coords)) => points.push(MapPoint {
                name: group.key.clone(),
                lat: coords.lat,
                lon: coords.lon,
                count: group.value,
            }),
            Ok(None) => debug!("No coordinates for '{}'", group.key),
            Err(e) => warn!("Geocoding '{}' failed: {}", group.key, e),
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingGeocoder;

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn lookup(&self, name: &str) -> Result<Option<Coordinates>> {
            if name == "Atlantis" {
                Err(DashboardError::Geocoding("service unavailable".into()))
            } else {
                Ok(Some(Coordinates { lat: 1.0, lon: 2.0 }))
            }
        }
    }

    fn group(key: &str, value: f64) -> GroupValue {
        GroupValue { key: key.to_string(), value }
    }

    #[tokio::test]
    async fn test_locate_skips_unresolved_names() {
        let geocoder = StaticGeocoder::new().with("United Kingdom", 54.7, -3.3);
        let points = locate(&[group("United Kingdom", 4.0), group("Nowhere", 2.0)], &geocoder).await;
        assert_eq!(
            points,
            vec![MapPoint { name: "United Kingdom".into(), lat: 54.7, lon: -3.3, count: 4.0 }]
        );
    }

    #[tokio::test]
    async fn test_locate_survives_lookup_errors() {
        let points = locate(&[group("Atlantis", 1.0), group("France", 3.0)], &FailingGeocoder).await;
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].name, "France");
    }
}
