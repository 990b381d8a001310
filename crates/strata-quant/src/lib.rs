// SPDX-FileCopyrightText: 2026 Strata Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Quantization selection for the Strata model pool.
//!
//! This crate provides:
//! - [`QuantizationSelector`]: picks a quantization level and context bucket
//!   from prompt size, task complexity, free memory and rolling success history
//! - [`SuccessHistory`]: per-model, per-level success EMAs fed by callers after inference
//!
//! The pool consults the selector before every local load; remote backends
//! skip it entirely.

pub mod history;
pub mod selector;

pub use history::{LevelStats, SuccessHistory};
pub use selector::{
    DecisionFactors, PromptBucket, QuantizationDecision, QuantizationSelector, SelectionRequest,
};
