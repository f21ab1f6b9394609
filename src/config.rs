use std::str::FromStr;

use tracing::warn;

use crate::error::{Result, SelectError};

pub const DEFAULT_K: usize = 60;

/// Scoring constants for one selection run. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    /// Weight per distinct query keyword found in the thread body.
    pub body_weight: f64,
    /// Weight per distinct query keyword found only in the scored comments.
    pub comment_weight: f64,
    /// Upper bound (exclusive) of the engagement prior.
    pub engagement_weight: f64,
    /// Engagement at which the prior reaches half of `engagement_weight`.
    pub engagement_half_saturation: f64,
    /// Only the first N comments of a thread are scored.
    pub max_comments_scored: usize,
    pub reaction_weight: f64,
    pub comment_count_weight: f64,
    pub share_weight: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            body_weight: 2.0,
            comment_weight: 1.0,
            engagement_weight: 0.5,
            engagement_half_saturation: 25.0,
            max_comments_scored: 10,
            reaction_weight: 1.0,
            comment_count_weight: 1.0,
            share_weight: 0.0,
        }
    }
}

impl SelectorConfig {
    /// Defaults overridden by `EVIDENCE_*` variables (`.env` is loaded by main).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        override_from_env("EVIDENCE_BODY_WEIGHT", &mut cfg.body_weight);
        override_from_env("EVIDENCE_COMMENT_WEIGHT", &mut cfg.comment_weight);
        override_from_env("EVIDENCE_ENGAGEMENT_WEIGHT", &mut cfg.engagement_weight);
        override_from_env(
            "EVIDENCE_ENGAGEMENT_HALF_SATURATION",
            &mut cfg.engagement_half_saturation,
        );
        override_from_env("EVIDENCE_MAX_COMMENTS", &mut cfg.max_comments_scored);
        override_from_env("EVIDENCE_REACTION_WEIGHT", &mut cfg.reaction_weight);
        override_from_env(
            "EVIDENCE_COMMENT_COUNT_WEIGHT",
            &mut cfg.comment_count_weight,
        );
        override_from_env("EVIDENCE_SHARE_WEIGHT", &mut cfg.share_weight);
        cfg
    }

    /// Weights must be finite and non-negative.
    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("body_weight", self.body_weight),
            ("comment_weight", self.comment_weight),
            ("engagement_weight", self.engagement_weight),
            ("reaction_weight", self.reaction_weight),
            ("comment_count_weight", self.comment_count_weight),
            ("share_weight", self.share_weight),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(SelectError::InvalidArgument(format!(
                    "{} must be a non-negative number, got {}",
                    name, value
                )));
            }
        }
        if !(self.engagement_half_saturation.is_finite() && self.engagement_half_saturation > 0.0) {
            return Err(SelectError::InvalidArgument(format!(
                "engagement_half_saturation must be positive, got {}",
                self.engagement_half_saturation
            )));
        }
        Ok(())
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = dotenv::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => *slot = v,
        Err(_) => warn!(key, value = %raw, "ignoring unparseable config override"),
    }
}
