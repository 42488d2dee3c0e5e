//! The particle animation lifecycle.
//!
//! One [`AnimationController`] drives one particle field through one pooled
//! context. The host fires [`AnimationController::tick`] from its frame
//! callback; every tick re-arms the callback before doing anything else, and
//! pausing only skips work, so the loop never has to be re-registered.
//!
//! ```text
//! start ──▶ Running ◀──▶ Paused
//!              │            │
//!              └────┬───────┘
//!                   ▼
//!               Destroyed (terminal)
//! ```

use std::rc::Rc;

use folio_core::{AnimationConfig, Clock, Duration, Timestamp};

use crate::error::RenderError;
use crate::host::{
    Container, ContextOptions, FrameHandle, FrameScheduler, HostCapabilities, PreferenceStore,
    Size, Subscription,
};
use crate::particles::ParticleField;
use crate::pool::{ContextLease, SharedPool};
use crate::quality::{self, DegradationPolicy, DegradationState, QualityTier, Verdict};

/// Pixel ratio ceiling; denser surfaces cost more than they show.
const MAX_PIXEL_RATIO: f64 = 1.5;

#[derive(Debug, Clone, PartialEq)]
pub struct AnimationOptions {
    /// Pool key for the context this animation renders into.
    pub context_id: String,
    /// Starting tier; probed from the host when absent.
    pub quality: Option<QualityTier>,
    /// Frame-rate cap; the tier's target when absent.
    pub frame_rate: Option<f64>,
    /// Particle count; the tier's budget when absent.
    pub particle_count: Option<usize>,
    pub pointer_tracking: bool,
    pub pixel_ratio: f64,
}

impl Default for AnimationOptions {
    fn default() -> Self {
        Self {
            context_id: "background".to_string(),
            quality: None,
            frame_rate: None,
            particle_count: None,
            pointer_tracking: true,
            pixel_ratio: 1.0,
        }
    }
}

/// Host pieces a controller takes ownership of.
pub struct AnimationHost {
    pub scheduler: Box<dyn FrameScheduler>,
    pub preferences: Box<dyn PreferenceStore>,
    pub clock: Rc<dyn Clock>,
    pub capabilities: HostCapabilities,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// `cleanup()` was called.
    Cleanup,
    /// Degraded past the lowest tier, or disabled by preference.
    Disabled,
    /// Out of view longer than the grace period.
    OutOfView,
    /// The pool evicted or replaced the context.
    ContextLost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Running,
    Paused,
    Destroyed(StopReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationEvent {
    Degraded { from: QualityTier, to: QualityTier },
    /// The caller should fall back to a static background. The preference has
    /// already been persisted.
    Disabled,
    Stopped(StopReason),
}

pub struct AnimationController {
    pool: SharedPool,
    lease: Option<ContextLease>,
    scheduler: Box<dyn FrameScheduler>,
    preferences: Box<dyn PreferenceStore>,
    clock: Rc<dyn Clock>,
    listeners: Vec<Box<dyn Subscription>>,
    field: ParticleField,
    config: AnimationConfig,
    policy: DegradationPolicy,

    tier: QualityTier,
    explicit_fps: Option<f64>,
    frame_interval: Duration,
    paused: bool,
    destroyed: Option<StopReason>,
    pending_frame: Option<FrameHandle>,

    last_render: Timestamp,
    /// Previous host callback; gaps between callbacks measure contention.
    last_callback: Timestamp,
    /// Longest callback gap since the last rendered frame.
    worst_gap: Duration,
    degradation: DegradationState,
    recovering_until: Option<Timestamp>,
    hidden_since: Option<Timestamp>,

    frame_count: u64,
    tick_count: u64,
    events: Vec<AnimationEvent>,
}

impl AnimationController {
    /// Acquire a context, build the particle field and arm the first frame.
    ///
    /// If the persisted preference has the animation switched off, the
    /// controller comes back already destroyed and holds nothing.
    pub fn start(
        container: &dyn Container,
        pool: SharedPool,
        host: AnimationHost,
        config: &AnimationConfig,
        options: AnimationOptions,
    ) -> Self {
        let now = host.clock.now();
        let tier = QualityTier::resolve(options.quality, &host.capabilities);
        let settings = tier.settings(&config.tiers);
        let explicit_fps = options.frame_rate.filter(|fps| *fps > 0.0);
        let fps = explicit_fps.unwrap_or(settings.fps);
        let enabled = host.preferences.particles_enabled();

        let mut controller = Self {
            pool,
            lease: None,
            scheduler: host.scheduler,
            preferences: host.preferences,
            clock: host.clock,
            listeners: Vec::new(),
            field: ParticleField::generate(0, config.seed),
            config: config.clone(),
            policy: DegradationPolicy::from(config),
            tier,
            explicit_fps,
            frame_interval: Duration::per_frame(fps),
            paused: false,
            destroyed: None,
            pending_frame: None,
            last_render: now,
            last_callback: now,
            worst_gap: Duration::zero(),
            degradation: DegradationState::default(),
            recovering_until: None,
            hidden_since: None,
            frame_count: 0,
            tick_count: 0,
            events: Vec::new(),
        };

        if !enabled {
            tracing::info!("particle animation disabled by preference");
            controller.destroyed = Some(StopReason::Disabled);
            controller.events.push(AnimationEvent::Disabled);
            controller
                .events
                .push(AnimationEvent::Stopped(StopReason::Disabled));
            return controller;
        }

        let context_options = ContextOptions {
            precision: tier.precision(),
            pixel_ratio: options.pixel_ratio.clamp(0.5, MAX_PIXEL_RATIO),
            ..ContextOptions::default()
        };
        let lease = controller
            .pool
            .borrow_mut()
            .acquire(&options.context_id, container.size(), &context_options);

        let particle_count = options.particle_count.unwrap_or(settings.particles);
        controller.field = ParticleField::generate(particle_count, config.seed)
            .with_smoothing(config.pointer_smoothing)
            .with_pointer_tracking(options.pointer_tracking && !host.capabilities.constrained_device);

        tracing::info!(
            "starting animation on '{}': tier {}, {:.0} fps, {} particles{}",
            lease.id,
            tier,
            fps,
            particle_count,
            if lease.fallback { " (fallback context)" } else { "" }
        );
        controller.lease = Some(lease);
        controller.pending_frame = Some(controller.scheduler.request_frame());
        controller
    }

    /// One host frame callback.
    pub fn tick(&mut self) {
        if self.destroyed.is_some() {
            return;
        }
        let now = self.clock.now();
        self.tick_count += 1;
        // The callback that brought us here has been consumed by the host.
        self.pending_frame = Some(self.scheduler.request_frame());

        // Contention shows up as late callbacks, whatever the frame cap.
        let callback_gap = now.since(self.last_callback);
        self.last_callback = now;
        if callback_gap > self.worst_gap {
            self.worst_gap = callback_gap;
        }

        if self.hidden_since.is_some() {
            self.poll_visibility();
            return;
        }
        if self.paused {
            return;
        }
        if let Some(until) = self.recovering_until {
            if now < until {
                return;
            }
            self.recovering_until = None;
            self.reset_baselines(now);
        }

        let elapsed = now.since(self.last_render);
        if !quality::frame_due(elapsed, self.frame_interval) {
            return;
        }
        self.last_render = now;
        let gap = std::mem::take(&mut self.worst_gap);

        self.field.advance();
        let Some(lease) = self.lease.as_ref() else {
            return;
        };
        let result = {
            let scene = self.field.scene();
            self.pool.borrow_mut().render(lease, &scene)
        };

        let (next, verdict) = match result {
            Ok(()) => {
                self.frame_count += 1;
                self.degradation.sample(gap, self.tier, &self.policy)
            }
            Err(RenderError::ContextLost { id }) => {
                tracing::debug!("context '{}' gone, stopping animation", id);
                self.stop(StopReason::ContextLost, false);
                return;
            }
            Err(e) => {
                tracing::warn!("render failed, counting as slow frame: {}", e);
                self.degradation.record_slow(self.tier, &self.policy)
            }
        };
        self.degradation = next;
        self.apply(verdict, now);
    }

    pub fn pause(&mut self) {
        if self.destroyed.is_none() {
            self.paused = true;
        }
    }

    /// Resume rendering. The paused interval is not treated as backlog.
    pub fn resume(&mut self) {
        if self.destroyed.is_none() && self.paused {
            self.paused = false;
            let now = self.clock.now();
            self.reset_baselines(now);
        }
    }

    /// Report whether the hosting element is in view.
    pub fn set_visible(&mut self, visible: bool) {
        if self.destroyed.is_some() {
            return;
        }
        let now = self.clock.now();
        match (visible, self.hidden_since) {
            (false, None) => {
                tracing::debug!("animation out of view, pausing");
                self.hidden_since = Some(now);
            }
            (true, Some(_)) => {
                self.hidden_since = None;
                self.reset_baselines(now);
            }
            _ => {}
        }
    }

    /// Tear down if the element has been out of view past the grace period.
    /// Returns true if this call destroyed the controller.
    pub fn poll_visibility(&mut self) -> bool {
        let Some(since) = self.hidden_since else {
            return false;
        };
        if self.destroyed.is_some() {
            return false;
        }
        let hidden_for = self.clock.now().since(since);
        if hidden_for.as_millis() < self.config.visibility_grace_ms {
            return false;
        }
        tracing::info!("animation out of view for {}, releasing context", hidden_for);
        self.stop(StopReason::OutOfView, true);
        true
    }

    /// Pointer position normalised to −1..1 on both axes.
    pub fn on_pointer_move(&mut self, x: f32, y: f32) {
        if self.destroyed.is_none() {
            self.field.set_pointer_target(x, y);
        }
    }

    pub fn on_resize(&mut self, size: Size) {
        if self.destroyed.is_some() {
            return;
        }
        if let Some(lease) = self.lease.as_mut() {
            if self.pool.borrow_mut().resize(lease, size).is_ok() {
                lease.size = size;
            }
        }
    }

    /// Hand a host listener to the controller; it is detached on teardown.
    pub fn attach_listener(&mut self, mut subscription: Box<dyn Subscription>) {
        if self.destroyed.is_some() {
            subscription.unsubscribe();
        } else {
            self.listeners.push(subscription);
        }
    }

    /// Stop for good. The pooled context stays with the pool. Idempotent.
    pub fn cleanup(&mut self) {
        self.stop(StopReason::Cleanup, false);
    }

    /// Take the events raised since the last call.
    pub fn drain_events(&mut self) -> Vec<AnimationEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn state(&self) -> ControllerState {
        match self.destroyed {
            Some(reason) => ControllerState::Destroyed(reason),
            None if self.paused || self.hidden_since.is_some() => ControllerState::Paused,
            None => ControllerState::Running,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.state() == ControllerState::Paused
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.is_some()
    }

    pub fn tier(&self) -> QualityTier {
        self.tier
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Rendered frames.
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Host callbacks received.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn consecutive_slow_frames(&self) -> u32 {
        self.degradation.consecutive_slow_frames
    }

    pub fn particle_count(&self) -> usize {
        self.field.len()
    }

    pub fn lease(&self) -> Option<&ContextLease> {
        self.lease.as_ref()
    }

    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame.is_some()
    }

    pub fn is_recovering(&self) -> bool {
        self.recovering_until.is_some()
    }

    fn apply(&mut self, verdict: Verdict, now: Timestamp) {
        match verdict {
            Verdict::Steady => {}
            Verdict::Degrade { to, pause } => {
                let from = self.tier;
                self.set_tier(to);
                self.recovering_until = Some(now + pause);
                tracing::warn!(
                    "sustained slow frames, lowering quality {} -> {} ({:.0} fps, {} particles)",
                    from,
                    to,
                    1000.0 / self.frame_interval.as_millis(),
                    self.field.len()
                );
                self.events.push(AnimationEvent::Degraded { from, to });
            }
            Verdict::Disable => {
                tracing::warn!("sustained slow frames at lowest quality, disabling animation");
                self.preferences.set_particles_enabled(false);
                self.events.push(AnimationEvent::Disabled);
                self.stop(StopReason::Disabled, true);
            }
        }
    }

    fn set_tier(&mut self, tier: QualityTier) {
        let settings = tier.settings(&self.config.tiers);
        let fps = match self.explicit_fps {
            Some(explicit) => explicit.min(settings.fps),
            None => settings.fps,
        };
        self.tier = tier;
        self.frame_interval = Duration::per_frame(fps);
        self.field.truncate(settings.particles);
    }

    fn reset_baselines(&mut self, now: Timestamp) {
        self.last_render = now;
        self.last_callback = now;
        self.worst_gap = Duration::zero();
    }

    fn stop(&mut self, reason: StopReason, release_context: bool) {
        if self.destroyed.is_some() {
            return;
        }
        // Cancel first so no callback can fire into a half-torn-down controller.
        if let Some(handle) = self.pending_frame.take() {
            self.scheduler.cancel_frame(handle);
        }
        for listener in self.listeners.iter_mut() {
            listener.unsubscribe();
        }
        self.listeners.clear();
        self.field.clear();

        if let Some(lease) = self.lease.take() {
            if release_context {
                let mut pool = self.pool.borrow_mut();
                // Only release what is still ours; the id may have been recreated.
                if pool.is_live(&lease) {
                    pool.release(&lease.id);
                }
            }
        }

        self.destroyed = Some(reason);
        self.events.push(AnimationEvent::Stopped(reason));
    }
}

impl Drop for AnimationController {
    fn drop(&mut self) {
        self.cleanup();
    }
}
