//! GeoJSON map layer for external map renderers.

use crate::models::{AnalysisResult, GeoPoint};
use serde_json::{json, Value};

fn point(location: &GeoPoint) -> Value {
    json!({"type": "Point", "coordinates": [location.lon, location.lat]})
}

/// Build a `FeatureCollection` with the analysis area, its center, every
/// alert and every located business.
pub fn map_layer(result: &AnalysisResult) -> Value {
    let region = &result.region;
    let mut features = Vec::with_capacity(2 + result.alerts.len() + result.businesses.len());

    features.push(json!({
        "type": "Feature",
        "geometry": {"type": "Polygon", "coordinates": [region.bounding_box().ring()]},
        "properties": {
            "layer": "analysis_area",
            "name": region.display_name(),
            "radius_km": region.radius_km(),
        }
    }));

    features.push(json!({
        "type": "Feature",
        "geometry": point(&region.center()),
        "properties": {
            "layer": "center",
            "name": region.display_name(),
            "risk_score": result.risk_score,
            "risk_level": result.risk_level,
            "insufficient_data": result.insufficient_data,
        }
    }));

    for alert in &result.alerts {
        features.push(json!({
            "type": "Feature",
            "geometry": point(&alert.location),
            "properties": {
                "layer": "alert",
                "date": alert.timestamp.format("%Y-%m-%d").to_string(),
                "confidence": alert.confidence,
                "source": alert.source,
                "area_ha": alert.area_ha,
            }
        }));
    }

    for business in &result.businesses {
        let Some(location) = business.location else {
            continue;
        };
        let layer = if business.industrial {
            "industrial_site"
        } else {
            "business"
        };
        features.push(json!({
            "type": "Feature",
            "geometry": point(&location),
            "properties": {
                "layer": layer,
                "osm_id": business.osm_id,
                "name": business.name,
                "tags": business.tags,
            }
        }));
    }

    json!({"type": "FeatureCollection", "features": features})
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::{aggregate, SourceOutcome};
    use crate::config::RiskConfig;
    use crate::models::{AlertRecord, Business, Region};
    use crate::sources::SourceRecords;
    use chrono::Utc;

    #[test]
    fn test_map_layer_features() {
        let region = Region::new(None, GeoPoint::new(-3.4653, -62.2159), 10.0, 14);
        let alert = AlertRecord {
            timestamp: Utc::now(),
            location: GeoPoint::new(-3.47, -62.22),
            confidence: 0.9,
            source: "glad".to_string(),
            area_ha: None,
        };
        let businesses = vec![
            Business {
                osm_id: 7,
                kind: "node".to_string(),
                name: Some("Sawmill".to_string()),
                location: Some(GeoPoint::new(-3.46, -62.21)),
                tags: Default::default(),
                industrial: true,
            },
            Business {
                osm_id: 8,
                kind: "way".to_string(),
                name: None,
                location: None,
                tags: Default::default(),
                industrial: false,
            },
        ];
        let result = aggregate(
            region,
            vec![
                SourceOutcome::completed(SourceRecords::Alerts(vec![alert]), 1),
                SourceOutcome::completed(SourceRecords::Businesses(businesses), 1),
            ],
            &RiskConfig::default(),
            Utc::now(),
        );

        let layer = map_layer(&result);
        let features = layer["features"].as_array().unwrap();

        assert_eq!(layer["type"], "FeatureCollection");
        assert_eq!(features.len(), 4);
        assert_eq!(features[0]["geometry"]["type"], "Polygon");
        assert_eq!(features[1]["geometry"]["coordinates"][0], -62.2159);
        assert_eq!(features[2]["properties"]["layer"], "alert");
        assert_eq!(features[3]["properties"]["layer"], "industrial_site");
    }
}
