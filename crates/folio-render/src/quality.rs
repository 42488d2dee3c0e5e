//! Quality tiers, frame pacing and adaptive degradation.
//!
//! Pure functions only: the controller feeds them timings and acts on the
//! returned verdicts, so the policy can be tested without a surface.

use serde::{Deserialize, Serialize};

use folio_core::{AnimationConfig, Duration, TierSettings, TierTable};

use crate::host::{HostCapabilities, Precision};

/// Slack applied to the frame-rate cap so host callbacks that land a hair
/// early (60 Hz ticks against a 30 fps cap) are not pushed a whole tick late.
pub const FRAME_SLACK_MS: f64 = 1.0;

/// One adjustable knob for frame rate, particle count and precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QualityTier {
    Low,
    Medium,
    High,
}

impl QualityTier {
    /// The next tier down, or `None` at the floor.
    pub fn lower(self) -> Option<QualityTier> {
        match self {
            QualityTier::High => Some(QualityTier::Medium),
            QualityTier::Medium => Some(QualityTier::Low),
            QualityTier::Low => None,
        }
    }

    pub fn settings(self, table: &TierTable) -> TierSettings {
        match self {
            QualityTier::Low => table.low,
            QualityTier::Medium => table.medium,
            QualityTier::High => table.high,
        }
    }

    /// Target frame rate with the default tier table.
    pub fn target_fps(self) -> f64 {
        self.settings(&TierTable::default()).fps
    }

    /// Particle budget with the default tier table.
    pub fn particle_count(self) -> usize {
        self.settings(&TierTable::default()).particles
    }

    pub fn precision(self) -> Precision {
        match self {
            QualityTier::Low => Precision::Low,
            QualityTier::Medium => Precision::Medium,
            QualityTier::High => Precision::High,
        }
    }

    /// Starting tier: an explicit choice wins, constrained or aggressively
    /// evicting hosts start low, everything else starts at medium.
    pub fn resolve(explicit: Option<QualityTier>, caps: &HostCapabilities) -> QualityTier {
        match explicit {
            Some(tier) => tier,
            None if caps.constrained_device || caps.aggressive_eviction => QualityTier::Low,
            None => QualityTier::Medium,
        }
    }
}

impl std::fmt::Display for QualityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QualityTier::Low => write!(f, "low"),
            QualityTier::Medium => write!(f, "medium"),
            QualityTier::High => write!(f, "high"),
        }
    }
}

/// Whether a frame is due, given the time since the last rendered frame.
pub fn frame_due(elapsed: Duration, interval: Duration) -> bool {
    elapsed.as_millis() + FRAME_SLACK_MS >= interval.as_millis()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DegradationPolicy {
    /// Samples further apart than this count as slow.
    pub slow_frame: Duration,
    /// Slow samples tolerated in a row; one more triggers a verdict.
    pub slow_frame_limit: u32,
    /// Pause imposed after a tier drop.
    pub recovery_pause: Duration,
}

impl From<&AnimationConfig> for DegradationPolicy {
    fn from(config: &AnimationConfig) -> Self {
        Self {
            slow_frame: Duration::from_millis(config.slow_frame_ms),
            slow_frame_limit: config.slow_frame_limit,
            recovery_pause: Duration::from_millis(config.recovery_pause_ms),
        }
    }
}

impl Default for DegradationPolicy {
    fn default() -> Self {
        Self::from(&AnimationConfig::default())
    }
}

/// What the controller should do after a timing sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    Steady,
    Degrade { to: QualityTier, pause: Duration },
    Disable,
}

/// Consecutive slow-sample counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DegradationState {
    pub consecutive_slow_frames: u32,
}

impl DegradationState {
    /// Feed the gap between this sample and the previous one.
    pub fn sample(
        self,
        gap: Duration,
        tier: QualityTier,
        policy: &DegradationPolicy,
    ) -> (DegradationState, Verdict) {
        if gap.as_millis() > policy.slow_frame.as_millis() {
            self.record_slow(tier, policy)
        } else {
            (DegradationState::default(), Verdict::Steady)
        }
    }

    /// Count one slow sample (or a failed draw) unconditionally.
    pub fn record_slow(
        self,
        tier: QualityTier,
        policy: &DegradationPolicy,
    ) -> (DegradationState, Verdict) {
        let count = self.consecutive_slow_frames + 1;
        if count <= policy.slow_frame_limit {
            return (
                DegradationState {
                    consecutive_slow_frames: count,
                },
                Verdict::Steady,
            );
        }

        let verdict = match tier.lower() {
            Some(to) => Verdict::Degrade {
                to,
                pause: policy.recovery_pause,
            },
            None => Verdict::Disable,
        };
        (DegradationState::default(), verdict)
    }
}
