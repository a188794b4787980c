//! Region resolution and validation.

use crate::config::{AnalysisConfig, Config};
use crate::error::ProfilerError;
use crate::location::geocoder::{ChainGeocoder, Gazetteer, Geocoder, NominatimGeocoder};
use crate::models::{GeoPoint, Region};
use tracing::info;

/// What the user asked to analyze.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    Place(String),
    Coords(String),
}

impl LocationQuery {
    /// Build the query from the mutually exclusive CLI options.
    pub fn from_args(args: &crate::cli::Args) -> Result<Self, ProfilerError> {
        match (&args.place, &args.coords) {
            (Some(place), None) => Ok(LocationQuery::Place(place.clone())),
            (None, Some(coords)) => Ok(LocationQuery::Coords(coords.clone())),
            (Some(_), Some(_)) => Err(ProfilerError::InvalidLocation(
                "--place and --coords are mutually exclusive".to_string(),
            )),
            (None, None) => Err(ProfilerError::InvalidLocation(
                "one of --place or --coords is required".to_string(),
            )),
        }
    }
}

/// Parse `"lat,lon"` into a validated point.
pub fn parse_coords(input: &str) -> Result<GeoPoint, ProfilerError> {
    let invalid = || {
        ProfilerError::InvalidLocation(format!(
            "expected coordinates as \"lat,lon\", got \"{}\"",
            input
        ))
    };

    let mut parts = input.split(',');
    let (Some(lat), Some(lon), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(invalid());
    };

    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lon: f64 = lon.trim().parse().map_err(|_| invalid())?;

    validate_center(lat, lon)?;
    Ok(GeoPoint::new(lat, lon))
}

/// Check that a center lies on the globe.
pub fn validate_center(lat: f64, lon: f64) -> Result<(), ProfilerError> {
    if !lat.is_finite() || !lon.is_finite() {
        return Err(ProfilerError::InvalidLocation(
            "coordinates must be finite numbers".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ProfilerError::InvalidLocation(format!(
            "latitude {} is outside [-90, 90]",
            lat
        )));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ProfilerError::InvalidLocation(format!(
            "longitude {} is outside [-180, 180]",
            lon
        )));
    }
    Ok(())
}

/// Resolves a [`LocationQuery`] into a [`Region`].
pub struct LocationResolver {
    geocoder: Box<dyn Geocoder>,
    bounds: AnalysisConfig,
}

impl LocationResolver {
    pub fn new(geocoder: Box<dyn Geocoder>, bounds: AnalysisConfig) -> Self {
        Self { geocoder, bounds }
    }

    /// Resolver backed by the configured geocoding API with the built-in
    /// gazetteer as fallback.
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let nominatim = NominatimGeocoder::new(
            client,
            &config.endpoints.geocoding_url,
            config.credentials.geocoding_api_key.clone(),
        );
        let chain = ChainGeocoder::new(vec![Box::new(nominatim), Box::new(Gazetteer::default())]);
        Self::new(Box::new(chain), config.analysis.clone())
    }

    /// Resolve the query. `radius_km` and `days` fall back to the configured defaults.
    pub async fn resolve(
        &self,
        query: &LocationQuery,
        radius_km: Option<f64>,
        days: Option<u32>,
    ) -> Result<Region, ProfilerError> {
        let radius_km = radius_km.unwrap_or(self.bounds.default_radius_km);
        let days = days.unwrap_or(self.bounds.default_days_back);
        self.check_bounds(radius_km, days)?;

        let (name, center) = match query {
            LocationQuery::Coords(input) => (None, parse_coords(input)?),
            LocationQuery::Place(place) => {
                let place = place.trim();
                if place.is_empty() {
                    return Err(ProfilerError::InvalidLocation(
                        "place name is empty".to_string(),
                    ));
                }

                let point = self
                    .geocoder
                    .geocode(place)
                    .await
                    .map_err(|e| {
                        ProfilerError::InvalidLocation(format!(
                            "could not geocode '{}': {}",
                            place, e
                        ))
                    })?
                    .ok_or_else(|| {
                        ProfilerError::InvalidLocation(format!("no match for place '{}'", place))
                    })?;
                validate_center(point.lat, point.lon)?;
                (Some(place.to_string()), point)
            }
        };

        let region = Region::new(name, center, radius_km, days);
        info!(
            "Resolved {} to ({}) with radius {} km over {} days",
            region.display_name(),
            region.center(),
            region.radius_km(),
            region.time_window_days()
        );
        Ok(region)
    }

    fn check_bounds(&self, radius_km: f64, days: u32) -> Result<(), ProfilerError> {
        if !radius_km.is_finite() || radius_km <= 0.0 || radius_km > self.bounds.max_radius_km {
            return Err(ProfilerError::InvalidLocation(format!(
                "radius {} km must be in (0, {}]",
                radius_km, self.bounds.max_radius_km
            )));
        }
        if days == 0 || days > self.bounds.max_days_back {
            return Err(ProfilerError::InvalidLocation(format!(
                "days {} must be in [1, {}]",
                days, self.bounds.max_days_back
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> LocationResolver {
        LocationResolver::new(Box::new(Gazetteer::default()), AnalysisConfig::default())
    }

    #[test]
    fn test_parse_coords() {
        assert_eq!(
            parse_coords("0.7893,101.3431").unwrap(),
            GeoPoint::new(0.7893, 101.3431)
        );
        assert_eq!(
            parse_coords(" -3.4653 , -62.2159 ").unwrap(),
            GeoPoint::new(-3.4653, -62.2159)
        );
    }

    #[test]
    fn test_parse_coords_malformed() {
        for input in ["", "1.0", "a,b", "1,2,3", "1;2", "NaN,0"] {
            let err = parse_coords(input).unwrap_err();
            assert!(
                matches!(err, ProfilerError::InvalidLocation(_)),
                "{} should be invalid",
                input
            );
        }
    }

    #[test]
    fn test_validate_center_ranges() {
        assert!(validate_center(90.0, 180.0).is_ok());
        assert!(validate_center(-90.0, -180.0).is_ok());
        assert!(validate_center(90.1, 0.0).is_err());
        assert!(validate_center(0.0, -180.5).is_err());
        assert!(validate_center(f64::INFINITY, 0.0).is_err());
    }

    #[tokio::test]
    async fn test_resolve_coords_keeps_center_and_radius() {
        let region = resolver()
            .resolve(
                &LocationQuery::Coords("0.7893,101.3431".into()),
                Some(20.0),
                Some(30),
            )
            .await
            .unwrap();

        assert_eq!(region.center(), GeoPoint::new(0.7893, 101.3431));
        assert_eq!(region.radius_km(), 20.0);
        assert_eq!(region.time_window_days(), 30);
        assert_eq!(region.name(), None);
    }

    #[tokio::test]
    async fn test_resolve_place_uses_defaults() {
        let region = resolver()
            .resolve(&LocationQuery::Place("Sumatra".into()), None, None)
            .await
            .unwrap();

        assert_eq!(region.name(), Some("Sumatra"));
        assert_eq!(region.center(), GeoPoint::new(0.7893, 101.3431));
        assert_eq!(region.radius_km(), 20.0);
        assert_eq!(region.time_window_days(), 30);
    }

    #[tokio::test]
    async fn test_resolve_unknown_place_is_invalid() {
        let err = resolver()
            .resolve(&LocationQuery::Place("Atlantis".into()), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ProfilerError::InvalidLocation(_)));
        assert!(err.is_fatal());
    }

    #[tokio::test]
    async fn test_resolve_rejects_out_of_bounds() {
        let query = LocationQuery::Coords("0,0".into());
        let r = resolver();

        assert!(r.resolve(&query, Some(100.5), None).await.is_err());
        assert!(r.resolve(&query, Some(0.0), None).await.is_err());
        assert!(r.resolve(&query, Some(-5.0), None).await.is_err());
        assert!(r.resolve(&query, None, Some(0)).await.is_err());
        assert!(r.resolve(&query, None, Some(366)).await.is_err());
        assert!(r.resolve(&query, Some(100.0), Some(365)).await.is_ok());
    }

    #[test]
    fn test_query_from_args() {
        use clap::Parser;
        let args = crate::cli::Args::try_parse_from(["ecoprofiler", "--coords", "1,2"]).unwrap();
        assert_eq!(
            LocationQuery::from_args(&args).unwrap(),
            LocationQuery::Coords("1,2".into())
        );
    }
}
