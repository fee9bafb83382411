//! # Sampling
//!
//! Random selection of otherwise automatic cases for manual review. A draw is
//! made at most once per case period (vedtaksperiode): the first draw is
//! persisted and every later evaluation reuses it.

use crate::config::DecisionConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

pub trait SamplingPolicy: Send + Sync {
    /// Name recorded with each draw
    fn name(&self) -> &str;

    /// Returns the roll, if any, and whether the case is sampled
    fn draw(&self) -> (Option<u16>, bool);
}

/// Samples `per_mille` out of every thousand cases
#[derive(Debug, Clone, Copy)]
pub struct RateSampling {
    per_mille: u16,
}

impl RateSampling {
    pub fn new(per_mille: u16) -> Self {
        Self {
            per_mille: per_mille.min(1000),
        }
    }
}

impl SamplingPolicy for RateSampling {
    fn name(&self) -> &str {
        "rate"
    }

    fn draw(&self) -> (Option<u16>, bool) {
        let roll = fastrand::u16(0..1000);
        (Some(roll), roll < self.per_mille)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledSampling;

impl SamplingPolicy for DisabledSampling {
    fn name(&self) -> &str {
        "disabled"
    }

    fn draw(&self) -> (Option<u16>, bool) {
        (None, false)
    }
}

/// Always the same outcome
#[derive(Debug, Clone, Copy)]
pub struct FixedSampling(pub bool);

impl SamplingPolicy for FixedSampling {
    fn name(&self) -> &str {
        "fixed"
    }

    fn draw(&self) -> (Option<u16>, bool) {
        (None, self.0)
    }
}

pub fn policy_from_config(config: &DecisionConfig) -> Arc<dyn SamplingPolicy> {
    if config.sampling_enabled && config.sampling_rate_per_mille > 0 {
        Arc::new(RateSampling::new(config.sampling_rate_per_mille))
    } else {
        Arc::new(DisabledSampling)
    }
}

/// A persisted sampling draw for one case period
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingDraw {
    pub vedtaksperiode_id: Uuid,
    pub policy: String,
    pub roll: Option<u16>,
    pub sampled: bool,
    pub drawn_at: DateTime<Utc>,
}

impl SamplingDraw {
    pub fn draw(vedtaksperiode_id: Uuid, policy: &dyn SamplingPolicy) -> Self {
        let (roll, sampled) = policy.draw();
        Self {
            vedtaksperiode_id,
            policy: policy.name().to_string(),
            roll,
            sampled,
            drawn_at: Utc::now(),
        }
    }
}
