// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quantization level and context bucket selection.
//!
//! Selection order: force override > history-adjusted quality target > memory fit.
//! The prompt-length bucket sets a quality floor, task complexity raises it,
//! and the memory budget caps it.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::Serialize;
use strata_config::model::QuantizationConfig;
use strata_core::{ModelDescriptor, QuantLevel, StrataError};
use strum::Display;
use tracing::{debug, warn};

use crate::history::{LevelStats, SuccessHistory};

/// Coarse prompt-length class used as a baseline quality floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PromptBucket {
    Short,
    Medium,
    Long,
}

impl PromptBucket {
    fn score(self) -> f64 {
        match self {
            PromptBucket::Short => 0.0,
            PromptBucket::Medium => 0.5,
            PromptBucket::Long => 1.0,
        }
    }
}

/// Inputs for one selection.
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    pub descriptor: &'a ModelDescriptor,
    /// Estimated prompt length in tokens.
    pub prompt_tokens: u32,
    /// Externally computed task complexity in `[0, 1]`.
    pub task_complexity: f64,
    /// Memory the pool can still hand out, in MB.
    pub available_memory_mb: u64,
}

/// Snapshot of what drove a decision, for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DecisionFactors {
    pub prompt_bucket: PromptBucket,
    /// Complexity after sanitizing to `[0, 1]`.
    pub task_complexity: f64,
    /// Normalized quality the request calls for.
    pub quality_target: f64,
    /// Level justified by quality alone, after history adjustment.
    pub justified_level: QuantLevel,
    /// Success EMA of the chosen level, if enough outcomes exist.
    pub history_ema: Option<f64>,
    /// `available_memory_mb - safety_margin_mb`.
    pub budget_mb: u64,
    /// Whether the force-quality override fired.
    pub forced: bool,
}

/// Result of a selection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantizationDecision {
    pub level: QuantLevel,
    /// Context bucket to allocate, in tokens.
    pub context_tokens: u32,
    /// Estimated resident memory at `level` and `context_tokens`.
    pub estimated_mb: u64,
    /// The chosen level is below what complexity alone justifies, or does not fit the budget.
    pub degraded: bool,
    pub factors: DecisionFactors,
}

/// Maps prompt size, complexity, free memory and history to a quantization decision.
///
/// Stateless apart from the success history, which sits behind its own lock.
pub struct QuantizationSelector {
    config: QuantizationConfig,
    history: Mutex<SuccessHistory>,
}

impl QuantizationSelector {
    pub fn new(config: QuantizationConfig) -> Self {
        let history = Mutex::new(SuccessHistory::new(config.ema_alpha));
        Self { config, history }
    }

    pub fn config(&self) -> &QuantizationConfig {
        &self.config
    }

    /// Choose a level and context bucket for a local model.
    ///
    /// Fails only when the descriptor declares no quantization levels.
    pub fn select(&self, request: &SelectionRequest<'_>) -> Result<QuantizationDecision, StrataError> {
        let descriptor = request.descriptor;
        let levels = descriptor.levels();
        let (Some(&lowest), Some(&highest)) = (levels.first(), levels.last()) else {
            return Err(StrataError::Config(format!(
                "model `{}` declares no quantization levels",
                descriptor.name
            )));
        };

        let complexity = sanitize(request.task_complexity);
        let bucket = self.prompt_bucket(request.prompt_tokens);
        let quality_target = self.quality_target(bucket, complexity);
        let context_tokens = self.context_bucket(descriptor, request.prompt_tokens);
        let budget_mb = request
            .available_memory_mb
            .saturating_sub(self.config.safety_margin_mb);
        let cost = |level: QuantLevel| {
            descriptor
                .estimated_mb(level, context_tokens)
                .unwrap_or(u64::MAX)
        };

        let history = self.lock_history().snapshot(&descriptor.name);
        let forced = complexity >= self.config.force_quality_threshold;

        let (level, justified_level, degraded) = if forced {
            (highest, highest, cost(highest) > budget_mb)
        } else {
            let justified_idx = self.adjust_for_history(
                &levels,
                justified_index(levels.len(), quality_target),
                &history,
            );
            let fitting = levels[..=justified_idx]
                .iter()
                .rposition(|&level| cost(level) <= budget_mb);
            match fitting {
                Some(idx) => (levels[idx], levels[justified_idx], idx < justified_idx),
                None => (lowest, levels[justified_idx], true),
            }
        };

        let decision = QuantizationDecision {
            level,
            context_tokens,
            estimated_mb: cost(level),
            degraded,
            factors: DecisionFactors {
                prompt_bucket: bucket,
                task_complexity: complexity,
                quality_target,
                justified_level,
                history_ema: self.trusted(history.get(&level)).map(|s| s.ema),
                budget_mb,
                forced,
            },
        };

        if decision.degraded {
            warn!(
                model = descriptor.name.as_str(),
                level = %decision.level,
                justified = %justified_level,
                estimated_mb = decision.estimated_mb,
                budget_mb,
                forced,
                "degraded quantization decision"
            );
        } else {
            debug!(
                model = descriptor.name.as_str(),
                level = %decision.level,
                context_tokens,
                estimated_mb = decision.estimated_mb,
                "quantization selected"
            );
        }

        Ok(decision)
    }

    /// Fold a post-inference outcome into the level's success EMA.
    pub fn record_outcome(&self, model: &str, level: QuantLevel, success: bool) {
        let stats = self.lock_history().record(model, level, success);
        debug!(
            model,
            level = %level,
            success,
            ema = stats.ema,
            samples = stats.samples,
            "quantization outcome recorded"
        );
    }

    /// Recorded EMAs for one model.
    pub fn history(&self, model: &str) -> BTreeMap<QuantLevel, LevelStats> {
        self.lock_history().snapshot(model)
    }

    pub fn prompt_bucket(&self, prompt_tokens: u32) -> PromptBucket {
        if prompt_tokens < self.config.short_prompt_tokens {
            PromptBucket::Short
        } else if prompt_tokens < self.config.medium_prompt_tokens {
            PromptBucket::Medium
        } else {
            PromptBucket::Long
        }
    }

    /// Context the request needs: prompt plus the generation reserve.
    pub fn required_context(&self, prompt_tokens: u32) -> u32 {
        prompt_tokens.saturating_add(self.config.generation_reserve_tokens)
    }

    /// Smallest declared bucket that holds the required context.
    ///
    /// Requests larger than every bucket get the largest one; models without
    /// buckets get the configured default.
    pub fn context_bucket(&self, descriptor: &ModelDescriptor, prompt_tokens: u32) -> u32 {
        let needed = self.required_context(prompt_tokens);
        let buckets = descriptor.sorted_buckets();
        buckets
            .iter()
            .copied()
            .find(|&bucket| bucket >= needed)
            .or_else(|| buckets.last().copied())
            .unwrap_or(self.config.default_context_tokens)
    }

    fn quality_target(&self, bucket: PromptBucket, complexity: f64) -> f64 {
        let weights = self.config.bucket_weight + self.config.complexity_weight;
        if weights <= 0.0 {
            return complexity;
        }
        let raw = self.config.bucket_weight * bucket.score()
            + self.config.complexity_weight * complexity;
        (raw / weights).clamp(0.0, 1.0)
    }

    /// Step past levels whose trusted EMA is below the success floor.
    ///
    /// Returns the first level at or above `idx` that is not known-bad, or the
    /// highest level when every candidate is known-bad.
    fn adjust_for_history(
        &self,
        levels: &[QuantLevel],
        idx: usize,
        history: &BTreeMap<QuantLevel, LevelStats>,
    ) -> usize {
        let known_bad = |level: &QuantLevel| {
            self.trusted(history.get(level))
                .is_some_and(|s| s.ema < self.config.success_floor)
        };
        levels[idx..]
            .iter()
            .position(|level| !known_bad(level))
            .map(|offset| idx + offset)
            .unwrap_or(levels.len() - 1)
    }

    fn trusted(&self, stats: Option<&LevelStats>) -> Option<LevelStats> {
        stats
            .filter(|s| s.samples >= self.config.min_history_samples)
            .copied()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, SuccessHistory> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Index of the lowest level whose normalized quality reaches `target`.
///
/// Level `i` of `n` has quality `i / (n - 1)`; a single level always qualifies.
fn justified_index(n: usize, target: f64) -> usize {
    if n <= 1 {
        return 0;
    }
    let steps = (n - 1) as f64;
    let idx = (target * steps - 1e-9).ceil().max(0.0) as usize;
    idx.min(n - 1)
}

fn sanitize(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use strata_core::BackendKind;

    use super::*;

    /// Five levels, no KV cost, footprints 1000..5000.
    fn ladder() -> ModelDescriptor {
        ModelDescriptor {
            name: "expert_short".into(),
            backend: BackendKind::LocalQuantized,
            footprints_mb: BTreeMap::from([
                (QuantLevel::Q2K, 1000),
                (QuantLevel::Q3KM, 2000),
                (QuantLevel::Q4KM, 3000),
                (QuantLevel::Q6K, 4000),
                (QuantLevel::F16, 5000),
            ]),
            kv_mb_per_1k_tokens: 0,
            context_buckets: vec![1024, 4096, 16384],
            fallback: vec![],
            weights_path: None,
            endpoint: None,
        }
    }

    fn selector() -> QuantizationSelector {
        QuantizationSelector::new(QuantizationConfig::default())
    }

    fn request(desc: &ModelDescriptor, prompt: u32, complexity: f64, mem: u64) -> SelectionRequest<'_> {
        SelectionRequest {
            descriptor: desc,
            prompt_tokens: prompt,
            task_complexity: complexity,
            available_memory_mb: mem,
        }
    }

    #[test]
    fn justified_index_rounds_up_to_next_level() {
        assert_eq!(justified_index(5, 0.0), 0);
        assert_eq!(justified_index(5, 0.25), 1);
        assert_eq!(justified_index(5, 0.26), 2);
        assert_eq!(justified_index(5, 1.0), 4);
        assert_eq!(justified_index(1, 0.7), 0);
    }

    #[test]
    fn prompt_buckets_use_configured_bounds() {
        let s = selector();
        assert_eq!(s.prompt_bucket(0), PromptBucket::Short);
        assert_eq!(s.prompt_bucket(199), PromptBucket::Short);
        assert_eq!(s.prompt_bucket(200), PromptBucket::Medium);
        assert_eq!(s.prompt_bucket(799), PromptBucket::Medium);
        assert_eq!(s.prompt_bucket(800), PromptBucket::Long);
    }

    #[test]
    fn context_bucket_fits_prompt_plus_reserve() {
        let s = selector();
        let desc = ladder();
        // 100 + 512 reserve fits 1024.
        assert_eq!(s.context_bucket(&desc, 100), 1024);
        // 600 + 512 does not.
        assert_eq!(s.context_bucket(&desc, 600), 4096);
        assert_eq!(s.context_bucket(&desc, 100_000), 16384);

        let mut bare = ladder();
        bare.context_buckets.clear();
        assert_eq!(s.context_bucket(&bare, 100), 4096);
    }

    #[test]
    fn simple_short_request_takes_lowest_level() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 50, 0.0, 100_000)).unwrap();
        assert_eq!(d.level, QuantLevel::Q2K);
        assert!(!d.degraded);
        assert_eq!(d.context_tokens, 1024);
        assert_eq!(d.estimated_mb, 1000);
    }

    #[test]
    fn long_complex_request_takes_higher_level_when_memory_allows() {
        let desc = ladder();
        // target = 0.4 * 1.0 + 0.6 * 0.8 = 0.88 -> index 4
        let d = selector().select(&request(&desc, 900, 0.8, 100_000)).unwrap();
        assert_eq!(d.level, QuantLevel::F16);
        assert!(!d.degraded);
        assert_eq!(d.factors.prompt_bucket, PromptBucket::Long);
    }

    #[test]
    fn memory_pressure_degrades() {
        let desc = ladder();
        // justified F16, budget = 3600 - 512 = 3088 -> Q4KM fits.
        let d = selector().select(&request(&desc, 900, 0.8, 3600)).unwrap();
        assert_eq!(d.level, QuantLevel::Q4KM);
        assert!(d.degraded);
        assert_eq!(d.factors.justified_level, QuantLevel::F16);
    }

    #[test]
    fn nothing_fits_falls_back_to_lowest() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 900, 0.5, 600)).unwrap();
        assert_eq!(d.level, QuantLevel::Q2K);
        assert!(d.degraded);
    }

    #[test]
    fn high_complexity_forces_highest_level_degraded() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 100, 0.95, 2000)).unwrap();
        assert_eq!(d.level, QuantLevel::F16);
        assert!(d.degraded);
        assert!(d.factors.forced);
    }

    #[test]
    fn forced_level_that_fits_is_not_degraded() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 100, 0.9, 10_000)).unwrap();
        assert_eq!(d.level, QuantLevel::F16);
        assert!(!d.degraded);
    }

    #[test]
    fn failing_level_is_stepped_over() {
        let desc = ladder();
        let s = selector();
        for _ in 0..5 {
            s.record_outcome("expert_short", QuantLevel::Q2K, false);
        }
        let d = s.select(&request(&desc, 50, 0.0, 100_000)).unwrap();
        assert_eq!(d.level, QuantLevel::Q3KM);

        // Too few samples on another model's level are ignored.
        s.record_outcome("tiny", QuantLevel::Q2K, false);
        assert_eq!(s.history("tiny")[&QuantLevel::Q2K].samples, 1);
    }

    #[test]
    fn nan_complexity_is_treated_as_zero() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 50, f64::NAN, 100_000)).unwrap();
        assert_eq!(d.level, QuantLevel::Q2K);
        assert_eq!(d.factors.task_complexity, 0.0);
    }

    #[test]
    fn descriptor_without_levels_is_rejected() {
        let mut desc = ladder();
        desc.footprints_mb.clear();
        let err = selector().select(&request(&desc, 50, 0.5, 100_000)).unwrap_err();
        assert!(matches!(err, StrataError::Config(_)));
    }

    #[test]
    fn decision_serializes_for_diagnostics() {
        let desc = ladder();
        let d = selector().select(&request(&desc, 300, 0.4, 100_000)).unwrap();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(json["factors"]["prompt_bucket"], "medium");
        assert!(json["level"].is_string());
    }
}
