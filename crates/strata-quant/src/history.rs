// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rolling per-level success statistics.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use strata_core::QuantLevel;

/// Exponential moving average of post-inference success for one level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LevelStats {
    /// Current EMA in `[0, 1]`.
    pub ema: f64,
    /// Outcomes folded into the EMA so far.
    pub samples: u32,
}

/// Success EMAs keyed by logical model and quantization level.
///
/// The first outcome seeds the average; later outcomes fold in as
/// `alpha * signal + (1 - alpha) * previous`.
#[derive(Debug)]
pub struct SuccessHistory {
    alpha: f64,
    models: HashMap<String, BTreeMap<QuantLevel, LevelStats>>,
}

impl SuccessHistory {
    pub fn new(alpha: f64) -> Self {
        Self {
            alpha: alpha.clamp(f64::MIN_POSITIVE, 1.0),
            models: HashMap::new(),
        }
    }

    /// Fold one outcome in and return the updated statistics.
    pub fn record(&mut self, model: &str, level: QuantLevel, success: bool) -> LevelStats {
        let signal = if success { 1.0 } else { 0.0 };
        let alpha = self.alpha;
        let levels = self.models.entry(model.to_string()).or_default();
        let stats = levels
            .entry(level)
            .and_modify(|s| {
                s.ema = alpha * signal + (1.0 - alpha) * s.ema;
                s.samples = s.samples.saturating_add(1);
            })
            .or_insert(LevelStats {
                ema: signal,
                samples: 1,
            });
        *stats
    }

    pub fn get(&self, model: &str, level: QuantLevel) -> Option<LevelStats> {
        self.models.get(model)?.get(&level).copied()
    }

    /// All recorded levels for a model, lowest quality first.
    pub fn snapshot(&self, model: &str) -> BTreeMap<QuantLevel, LevelStats> {
        self.models.get(model).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_outcome_seeds_average() {
        let mut history = SuccessHistory::new(0.2);
        let stats = history.record("tiny", QuantLevel::Q4KM, false);
        assert_eq!(stats.ema, 0.0);
        assert_eq!(stats.samples, 1);
    }

    #[test]
    fn ema_moves_by_alpha() {
        let mut history = SuccessHistory::new(0.2);
        history.record("tiny", QuantLevel::Q4KM, true);
        let stats = history.record("tiny", QuantLevel::Q4KM, false);
        assert!((stats.ema - 0.8).abs() < 1e-12);
        let stats = history.record("tiny", QuantLevel::Q4KM, false);
        assert!((stats.ema - 0.64).abs() < 1e-12);
        assert_eq!(stats.samples, 3);
    }

    #[test]
    fn levels_and_models_are_independent() {
        let mut history = SuccessHistory::new(0.5);
        history.record("tiny", QuantLevel::Q4KM, false);
        history.record("tiny", QuantLevel::Q8_0, true);
        history.record("expert_short", QuantLevel::Q4KM, true);

        assert_eq!(history.get("tiny", QuantLevel::Q4KM).unwrap().ema, 0.0);
        assert_eq!(history.get("tiny", QuantLevel::Q8_0).unwrap().ema, 1.0);
        assert_eq!(history.get("expert_short", QuantLevel::Q4KM).unwrap().ema, 1.0);
        assert!(history.get("expert_short", QuantLevel::Q8_0).is_none());
        assert_eq!(history.snapshot("tiny").len(), 2);
    }
}
