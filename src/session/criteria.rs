use crate::foundation::error::{IprError, IprResult};
use std::time::Duration;

/// When a render is considered finished. Every limit is optional; with none set the render never
/// completes on its own.
#[derive(Clone, Copy, Debug, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct CompletionCriteria {
    /// Stop after this many full-frame iterations.
    pub max_iterations: Option<u32>,
    /// Stop after this much wall-clock time.
    pub max_time_ms: Option<u64>,
    /// Stop once the engine-reported variance drops to or below this value.
    pub convergence_threshold: Option<f32>,
}

/// Render progress measured against [`CompletionCriteria`].
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Progress {
    /// Completed full-frame iterations.
    pub iterations: u32,
    /// Fraction of the current iteration's tiles already rendered, in `[0, 1)`.
    pub tile_fraction: f64,
    /// Time since accumulation (re)started.
    pub elapsed: Duration,
    /// Latest engine-reported variance.
    pub variance: Option<f32>,
}

impl CompletionCriteria {
    /// Criteria stopping after `n` iterations.
    pub fn iterations(n: u32) -> Self {
        Self {
            max_iterations: Some(n),
            ..Self::default()
        }
    }

    /// Reject zero limits and non-positive thresholds.
    pub fn validate(&self) -> IprResult<()> {
        if self.max_iterations == Some(0) {
            return Err(IprError::configuration("max_iterations must be > 0"));
        }
        if self.max_time_ms == Some(0) {
            return Err(IprError::configuration("max_time_ms must be > 0"));
        }
        if let Some(t) = self.convergence_threshold
            && !(t.is_finite() && t > 0.0)
        {
            return Err(IprError::configuration(
                "convergence_threshold must be finite and > 0",
            ));
        }
        Ok(())
    }

    /// `true` when no limit is set.
    pub fn is_unlimited(&self) -> bool {
        self.max_iterations.is_none()
            && self.max_time_ms.is_none()
            && self.convergence_threshold.is_none()
    }

    fn converged(&self, p: &Progress) -> bool {
        matches!((self.convergence_threshold, p.variance), (Some(t), Some(v)) if v <= t)
    }

    /// `true` once any limit is reached.
    pub fn is_complete(&self, p: &Progress) -> bool {
        self.max_iterations.is_some_and(|n| p.iterations >= n)
            || self
                .max_time_ms
                .is_some_and(|ms| p.elapsed >= Duration::from_millis(ms))
            || self.converged(p)
    }

    /// Percentage in `[0, 100]`.
    ///
    /// Iteration limits take precedence over time limits; convergence reports 100.
    pub fn progress(&self, p: &Progress) -> u8 {
        if self.converged(p) {
            return 100;
        }
        let pct = if let Some(n) = self.max_iterations {
            (f64::from(p.iterations) + p.tile_fraction) / f64::from(n) * 100.0
        } else if let Some(ms) = self.max_time_ms {
            p.elapsed.as_secs_f64() * 1000.0 / ms as f64 * 100.0
        } else {
            0.0
        };
        // Rounding noise must not push an exact fraction up a step.
        let pct = (pct - 1e-9).ceil();
        pct.clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/criteria.rs"]
mod tests;
