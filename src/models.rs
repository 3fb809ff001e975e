use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Raw row as stored in `bike_predictions`.
///
/// The numeric columns are nullable in the schema, so they decode as `Option`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct PredictionRow {
    pub bike_id: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub failure_probability: Option<f64>,
}

/// A single prediction as returned by the API.
///
/// All numeric fields are guaranteed finite once built from a [`PredictionRow`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BikePrediction {
    pub bike_id: String,
    pub latitude: f64,
    pub longitude: f64,
    pub failure_probability: f64,
}

impl PredictionRow {
    pub fn new(
        bike_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        failure_probability: f64,
    ) -> Self {
        Self {
            bike_id: bike_id.into(),
            latitude: Some(latitude),
            longitude: Some(longitude),
            failure_probability: Some(failure_probability),
        }
    }
}

impl BikePrediction {
    pub fn new(
        bike_id: impl Into<String>,
        latitude: f64,
        longitude: f64,
        failure_probability: f64,
    ) -> Self {
        Self {
            bike_id: bike_id.into(),
            latitude,
            longitude,
            failure_probability,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.failure_probability.is_finite()
    }
}

impl From<PredictionRow> for BikePrediction {
    fn from(row: PredictionRow) -> Self {
        Self {
            bike_id: row.bike_id,
            latitude: finite_or_zero(row.latitude),
            longitude: finite_or_zero(row.longitude),
            failure_probability: finite_or_zero(row.failure_probability),
        }
    }
}

/// Normalize a stored numeric value: NULL, NaN and both infinities become `0.0`.
pub fn finite_or_zero(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

/// Rows written by the `seed` command.
pub fn sample_predictions() -> Vec<BikePrediction> {
    vec![
        BikePrediction::new("B001", 12.9716, 77.5946, 0.85),
        BikePrediction::new("B002", 28.7041, 77.1025, 0.12),
        BikePrediction::new("B003", 19.0760, 72.8777, 0.46),
        BikePrediction::new("B004", 13.0827, 80.2707, 0.02),
        BikePrediction::new("B005", 22.5726, 88.3639, 0.66),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finite_values_pass_through() {
        assert_eq!(finite_or_zero(Some(0.42)), 0.42);
        assert_eq!(finite_or_zero(Some(-12.5)), -12.5);
    }

    #[test]
    fn test_non_finite_values_become_zero() {
        assert_eq!(finite_or_zero(Some(f64::NAN)), 0.0);
        assert_eq!(finite_or_zero(Some(f64::INFINITY)), 0.0);
        assert_eq!(finite_or_zero(Some(f64::NEG_INFINITY)), 0.0);
        assert_eq!(finite_or_zero(None), 0.0);
    }

    #[test]
    fn test_row_conversion_sanitizes_every_field() {
        let row = PredictionRow {
            bike_id: "B900".to_string(),
            latitude: Some(f64::NAN),
            longitude: None,
            failure_probability: Some(f64::INFINITY),
        };

        let prediction = BikePrediction::from(row);

        assert_eq!(prediction.bike_id, "B900");
        assert_eq!(prediction.latitude, 0.0);
        assert_eq!(prediction.longitude, 0.0);
        assert_eq!(prediction.failure_probability, 0.0);
        assert!(prediction.is_finite());
    }

    #[test]
    fn test_prediction_serializes_with_flat_fields() {
        let prediction = BikePrediction::new("B001", 12.9716, 77.5946, 0.85);
        let json = serde_json::to_value(&prediction).unwrap();

        assert_eq!(json["bike_id"], "B001");
        assert_eq!(json["latitude"], 12.9716);
        assert_eq!(json["longitude"], 77.5946);
        assert_eq!(json["failure_probability"], 0.85);
        assert_eq!(json.as_object().unwrap().len(), 4);
    }

    #[test]
    fn test_sample_predictions_have_unique_ids() {
        let samples = sample_predictions();
        let mut ids: Vec<_> = samples.iter().map(|p| p.bike_id.as_str()).collect();
        ids.sort();
        ids.dedup();

        assert_eq!(samples.len(), 5);
        assert_eq!(ids.len(), 5);
    }
}
