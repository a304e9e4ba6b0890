use crate::error::{AnalyticsError, Result};
use serde::{Deserialize, Serialize};

/// Relative expense weight of each fiscal month, August first. Summer and the exam months
/// sit above 1.0, August (the quiet month before the school year) well below it.
pub const DEFAULT_SEASONAL_WEIGHTS: [f64; 12] = [
    0.39, 1.11, 0.92, 1.00, 1.62, 0.81, 1.59, 0.90, 0.93, 1.12, 0.84, 0.77,
];

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct SeasonalWeights([f64; 12]);

impl Default for SeasonalWeights {
    fn default() -> Self {
        Self(DEFAULT_SEASONAL_WEIGHTS)
    }
}

impl SeasonalWeights {
    /// Weights need not sum to 12 or to 1; only their ratios matter.
    pub fn custom(weights: Vec<f64>) -> Result<Self> {
        validate_custom_weights(&weights)?;
        let mut table = [0.0; 12];
        table.copy_from_slice(&weights);
        Ok(Self(table))
    }

    pub fn weights(&self) -> &[f64; 12] {
        &self.0
    }

    /// Weight of fiscal month `index` (0 = August). Out-of-range indices weigh nothing.
    pub fn weight(&self, index: usize) -> f64 {
        self.0.get(index).copied().unwrap_or(0.0)
    }

    pub fn total(&self) -> f64 {
        self.0.iter().sum()
    }
}

impl TryFrom<Vec<f64>> for SeasonalWeights {
    type Error = AnalyticsError;

    fn try_from(value: Vec<f64>) -> Result<Self> {
        Self::custom(value)
    }
}

impl From<SeasonalWeights> for Vec<f64> {
    fn from(value: SeasonalWeights) -> Self {
        value.0.to_vec()
    }
}

fn validate_custom_weights(weights: &[f64]) -> Result<()> {
    if weights.len() != 12 {
        return Err(AnalyticsError::InvalidSeasonalWeights(format!(
            "Expected 12 weights, got {}",
            weights.len()
        )));
    }

    if weights.iter().any(|w| !w.is_finite()) {
        return Err(AnalyticsError::InvalidSeasonalWeights(
            "All weights must be finite numbers".to_string(),
        ));
    }

    if weights.iter().any(|&w| w < 0.0) {
        return Err(AnalyticsError::InvalidSeasonalWeights(
            "All weights must be non-negative".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let weights = SeasonalWeights::default();
        assert_eq!(weights.weight(0), 0.39);
        assert_eq!(weights.weight(4), 1.62);
        assert_eq!(weights.weight(11), 0.77);
        assert_eq!(weights.weight(12), 0.0);
        assert!((weights.total() - 12.0).abs() < 1e-9);
    }

    #[test]
    fn test_custom_valid() {
        let weights = SeasonalWeights::custom(vec![2.0; 12]).unwrap();
        assert_eq!(weights.total(), 24.0);
    }

    #[test]
    fn test_custom_invalid_length() {
        assert!(SeasonalWeights::custom(vec![0.5, 0.5]).is_err());
    }

    #[test]
    fn test_custom_rejects_negative_and_nan() {
        let mut negative = vec![1.0; 12];
        negative[3] = -0.1;
        assert!(SeasonalWeights::custom(negative).is_err());

        let mut nan = vec![1.0; 12];
        nan[0] = f64::NAN;
        assert!(SeasonalWeights::custom(nan).is_err());
    }

    #[test]
    fn test_deserialize_validates() {
        assert!(serde_json::from_str::<SeasonalWeights>("[1,2,3]").is_err());
        let parsed: SeasonalWeights = serde_json::from_str(&serde_json::to_string(&SeasonalWeights::default()).unwrap()).unwrap();
        assert_eq!(parsed, SeasonalWeights::default());
    }
}
