//! Active liveness detection via blink tracking.
//!
//! A printed photograph or a still image on a screen never blinks. A live
//! person blinks every few seconds, and a blink shows up as a short run of
//! frames where the eye aspect ratio (see [`crate::ear`]) falls below a
//! cutoff, followed by a frame where it recovers.
//!
//! [`LivenessTracker`] keeps one small state record per recognized identity
//! for the lifetime of a session and turns the per-frame EAR signal into a
//! time-bounded verdict: an identity is live for `blink_validity` after its
//! most recent completed blink.
//!
//! # Threat Coverage
//!
//! - **Blocks:** Printed photographs, static images on a display.
//! - **Does not block:** Video replay of the enrolled person blinking,
//!   masks with cut-out eyes.

use serde::Serialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::matcher::Identity;

/// Thresholds for the blink state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LivenessConfig {
    /// EAR strictly below this value counts as a closed-eye frame.
    pub ear_threshold: f32,
    /// Minimum run of closed-eye frames that counts as a blink. Shorter runs
    /// are discarded as landmark noise.
    pub consec_frames: u32,
    /// How long a completed blink keeps the identity live.
    pub blink_validity: Duration,
}

impl Default for LivenessConfig {
    fn default() -> Self {
        Self {
            ear_threshold: 0.3,
            consec_frames: 2,
            blink_validity: Duration::from_secs(8),
        }
    }
}

/// Blink state of one identity within one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LivenessState {
    pub consecutive_closed: u32,
    pub last_blink: Option<Instant>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LivenessStatus {
    #[serde(rename = "Live")]
    Live,
    #[serde(rename = "Not Live")]
    NotLive,
}

impl LivenessStatus {
    pub fn is_live(&self) -> bool {
        matches!(self, LivenessStatus::Live)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LivenessStatus::Live => "Live",
            LivenessStatus::NotLive => "Not Live",
        }
    }
}

/// Per-session blink tracker, keyed by identity label.
///
/// Frames must be fed in arrival order. Unknown faces are never tracked.
#[derive(Debug, Clone)]
pub struct LivenessTracker {
    config: LivenessConfig,
    states: HashMap<String, LivenessState>,
}

impl LivenessTracker {
    pub fn new(config: LivenessConfig) -> Self {
        Self {
            config,
            states: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LivenessConfig {
        &self.config
    }

    /// Feed one frame's observation for `identity` and return its verdict at `now`.
    pub fn observe(&mut self, identity: &Identity, ear: Option<f32>, now: Instant) -> LivenessStatus {
        let Some(label) = identity.label() else {
            return LivenessStatus::NotLive;
        };
        self.update(label, ear, now);
        self.status(label, now)
    }

    /// Advance the state machine for `label`. An absent EAR leaves the state
    /// untouched.
    pub fn update(&mut self, label: &str, ear: Option<f32>, now: Instant) {
        let Some(ear) = ear else {
            return;
        };
        let state = self.states.entry(label.to_string()).or_default();

        if ear < self.config.ear_threshold {
            state.consecutive_closed = state.consecutive_closed.saturating_add(1);
            return;
        }

        if state.consecutive_closed >= self.config.consec_frames {
            state.last_blink = Some(now);
            tracing::debug!(
                label,
                closed_frames = state.consecutive_closed,
                "blink registered"
            );
        }
        state.consecutive_closed = 0;
    }

    /// Verdict for `label` at `now`. Never mutates state.
    pub fn status(&self, label: &str, now: Instant) -> LivenessStatus {
        let live = self
            .states
            .get(label)
            .and_then(|s| s.last_blink)
            .is_some_and(|t| now.saturating_duration_since(t) <= self.config.blink_validity);
        if live {
            LivenessStatus::Live
        } else {
            LivenessStatus::NotLive
        }
    }

    pub fn state(&self, label: &str) -> Option<&LivenessState> {
        self.states.get(label)
    }

    /// Number of identities with state in this session.
    pub fn tracked_identities(&self) -> usize {
        self.states.len()
    }
}
