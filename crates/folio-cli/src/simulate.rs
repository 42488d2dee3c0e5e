// ─── folio simulate ─────────────────────────────────────────────────
//
// Drives one background animation through the headless host on a manual
// clock, so pacing and degradation can be observed without a browser.

use std::rc::Rc;

use serde::Serialize;

use folio_core::{FolioConfig, ManualClock, PoolConfig};
use folio_render::headless::{HeadlessBackend, HeadlessContainer, HeadlessScheduler, MemoryPreferences};
use folio_render::{
    AnimationController, AnimationEvent, AnimationHost, AnimationOptions, ContextPool,
    ControllerState, HostCapabilities, QualityTier, Size,
};

#[derive(Debug, Clone)]
pub struct SimulateOptions {
    pub frame_rate: Option<f64>,
    pub quality: Option<QualityTier>,
    /// Host callback rate.
    pub host_hz: f64,
    pub seconds: f64,
    /// Every Nth callback arrives late by `stall_ms`.
    pub stall_every: Option<u64>,
    pub stall_ms: f64,
    pub capacity: Option<usize>,
    pub constrained: bool,
}

impl Default for SimulateOptions {
    fn default() -> Self {
        Self {
            frame_rate: None,
            quality: None,
            host_hz: 60.0,
            seconds: 10.0,
            stall_every: None,
            stall_ms: 250.0,
            capacity: None,
            constrained: false,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationEvent {
    pub at_ms: f64,
    pub event: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub callbacks: u64,
    pub frames: u64,
    pub elapsed_ms: f64,
    pub effective_fps: f64,
    pub final_tier: QualityTier,
    pub final_state: String,
    pub particles: usize,
    pub events: Vec<SimulationEvent>,
}

pub fn run(options: &SimulateOptions, config: &FolioConfig) -> SimulationReport {
    let clock = ManualClock::new();
    let caps = HostCapabilities {
        constrained_device: options.constrained,
        ..Default::default()
    };
    let pool_config = PoolConfig {
        capacity: options.capacity.unwrap_or(config.pool.capacity),
        ..config.pool.clone()
    };
    let pool = ContextPool::new(Box::new(HeadlessBackend::new()), Rc::new(clock.clone()), pool_config)
        .with_capabilities(&caps)
        .shared();
    let scheduler = HeadlessScheduler::new();

    let mut controller = AnimationController::start(
        &HeadlessContainer(Size::new(1280, 720)),
        Rc::clone(&pool),
        AnimationHost {
            scheduler: Box::new(scheduler.clone()),
            preferences: Box::new(MemoryPreferences::default()),
            clock: Rc::new(clock.clone()),
            capabilities: caps,
        },
        &config.animation,
        AnimationOptions {
            quality: options.quality,
            frame_rate: options.frame_rate,
            ..Default::default()
        },
    );

    let host_hz = if options.host_hz > 0.0 { options.host_hz } else { 60.0 };
    let spacing = 1000.0 / host_hz;
    let callbacks = (options.seconds.max(0.0) * host_hz).round() as u64;
    let mut events = Vec::new();
    let mut elapsed = 0.0;

    for n in 1..=callbacks {
        let late = match options.stall_every {
            Some(every) if every > 0 && n % every == 0 => options.stall_ms,
            _ => 0.0,
        };
        elapsed += spacing + late;
        clock.set(elapsed);

        if scheduler.fire() {
            controller.tick();
        }
        pool.borrow_mut().poll_sweep();

        for event in controller.drain_events() {
            tracing::debug!("t={:.0}ms {:?}", elapsed, event);
            events.push(SimulationEvent {
                at_ms: elapsed,
                event: describe(&event),
            });
        }
        if controller.is_destroyed() {
            break;
        }
    }

    let report = SimulationReport {
        callbacks: controller.tick_count(),
        frames: controller.frame_count(),
        elapsed_ms: elapsed,
        effective_fps: if elapsed > 0.0 {
            controller.frame_count() as f64 * 1000.0 / elapsed
        } else {
            0.0
        },
        final_tier: controller.tier(),
        final_state: match controller.state() {
            ControllerState::Running => "running".to_string(),
            ControllerState::Paused => "paused".to_string(),
            ControllerState::Destroyed(reason) => format!("destroyed ({:?})", reason).to_lowercase(),
        },
        particles: controller.particle_count(),
        events,
    };
    controller.cleanup();
    report
}

fn describe(event: &AnimationEvent) -> String {
    match event {
        AnimationEvent::Degraded { from, to } => format!("degraded {} -> {}", from, to),
        AnimationEvent::Disabled => "disabled".to_string(),
        AnimationEvent::Stopped(reason) => format!("stopped: {:?}", reason).to_lowercase(),
    }
}

pub fn print_report(report: &SimulationReport) {
    println!("🎞  Folio animation simulation");
    println!("   Callbacks:  {}", report.callbacks);
    println!("   Frames:     {}", report.frames);
    println!("   Elapsed:    {:.0} ms", report.elapsed_ms);
    println!("   Effective:  {:.1} fps", report.effective_fps);
    println!("   Tier:       {}", report.final_tier);
    println!("   Particles:  {}", report.particles);
    println!("   State:      {}", report.final_state);
    if !report.events.is_empty() {
        println!();
        for event in &report.events {
            println!("   {:>8.0} ms  {}", event.at_ms, event.event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_run_renders_at_target_rate() {
        let report = run(
            &SimulateOptions {
                frame_rate: Some(30.0),
                seconds: 1.0,
                ..Default::default()
            },
            &FolioConfig::default(),
        );
        assert_eq!(report.callbacks, 60);
        assert!((29..=31).contains(&report.frames), "frames: {}", report.frames);
        assert!(report.events.is_empty());
        assert_eq!(report.final_state, "running");
    }

    #[test]
    fn test_constant_stalls_degrade_then_disable() {
        let report = run(
            &SimulateOptions {
                seconds: 30.0,
                stall_every: Some(1),
                stall_ms: 300.0,
                ..Default::default()
            },
            &FolioConfig::default(),
        );
        let events: Vec<_> = report.events.iter().map(|e| e.event.as_str()).collect();
        assert_eq!(
            events,
            vec!["degraded medium -> low", "disabled", "stopped: disabled"]
        );
        assert_eq!(report.final_tier, QualityTier::Low);
        assert_eq!(report.final_state, "destroyed (disabled)");
    }
}
