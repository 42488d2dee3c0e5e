//! In-process host.
//!
//! Every host trait implemented without a platform: surfaces count what they
//! are asked to do, the scheduler hands out handles for the driver to fire,
//! and preferences live in memory. Handles are cheap clones over shared state
//! so a driver can keep observing after passing ownership to the renderer.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::error::{RenderError, RenderResult};
use crate::host::{
    Container, ContextOptions, FrameHandle, FrameScheduler, GraphicsBackend, PreferenceStore,
    RenderSurface, Size, Subscription,
};
use crate::particles::ParticleScene;

/// What the headless surfaces have been asked to do.
#[derive(Debug, Default, Clone)]
pub struct HeadlessStats {
    pub created: usize,
    pub renders: usize,
    pub resizes: usize,
    pub renders_by_id: HashMap<String, usize>,
    /// Ids in disposal order.
    pub disposed: Vec<String>,
    pub last_particle_count: usize,
}

#[derive(Default)]
pub struct HeadlessBackend {
    stats: Rc<RefCell<HeadlessStats>>,
    failing_renders: Rc<Cell<u32>>,
    refuse: bool,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse every surface, as a host without graphics access would.
    pub fn refuse_contexts(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn stats(&self) -> Rc<RefCell<HeadlessStats>> {
        Rc::clone(&self.stats)
    }

    /// Counter of upcoming renders that should fail. Shared by all surfaces.
    pub fn failing_renders(&self) -> Rc<Cell<u32>> {
        Rc::clone(&self.failing_renders)
    }
}

impl GraphicsBackend for HeadlessBackend {
    fn create_surface(
        &mut self,
        id: &str,
        size: Size,
        _options: &ContextOptions,
    ) -> RenderResult<Box<dyn RenderSurface>> {
        if self.refuse {
            return Err(RenderError::ContextUnavailable("headless host refuses surfaces".into()));
        }
        self.stats.borrow_mut().created += 1;
        Ok(Box::new(HeadlessSurface {
            id: id.to_string(),
            size,
            stats: Rc::clone(&self.stats),
            failing_renders: Rc::clone(&self.failing_renders),
            disposed: false,
        }))
    }
}

struct HeadlessSurface {
    id: String,
    size: Size,
    stats: Rc<RefCell<HeadlessStats>>,
    failing_renders: Rc<Cell<u32>>,
    disposed: bool,
}

impl RenderSurface for HeadlessSurface {
    fn resize(&mut self, size: Size) {
        self.size = size;
        self.stats.borrow_mut().resizes += 1;
    }

    fn render(&mut self, scene: &ParticleScene<'_>) -> RenderResult<()> {
        if self.disposed {
            return Err(RenderError::context_lost(&self.id));
        }
        let failing = self.failing_renders.get();
        if failing > 0 {
            self.failing_renders.set(failing - 1);
            return Err(RenderError::Draw(format!("injected failure on '{}'", self.id)));
        }

        let mut stats = self.stats.borrow_mut();
        stats.renders += 1;
        *stats.renders_by_id.entry(self.id.clone()).or_default() += 1;
        stats.last_particle_count = scene.len();
        Ok(())
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.stats.borrow_mut().disposed.push(self.id.clone());
        }
    }
}

#[derive(Debug, Default)]
struct SchedulerState {
    next: u64,
    pending: BTreeSet<u64>,
    requested: u64,
    cancelled: u64,
}

/// Frame scheduler whose callbacks are fired by hand.
#[derive(Debug, Clone, Default)]
pub struct HeadlessScheduler {
    state: Rc<RefCell<SchedulerState>>,
}

impl HeadlessScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of callbacks currently armed.
    pub fn pending(&self) -> usize {
        self.state.borrow().pending.len()
    }

    /// Consume the armed callback, as the host does when it fires.
    /// Returns false if nothing was armed.
    pub fn fire(&self) -> bool {
        let mut state = self.state.borrow_mut();
        match state.pending.iter().next().copied() {
            Some(handle) => {
                state.pending.remove(&handle);
                true
            }
            None => false,
        }
    }

    pub fn requested(&self) -> u64 {
        self.state.borrow().requested
    }

    pub fn cancelled(&self) -> u64 {
        self.state.borrow().cancelled
    }
}

impl FrameScheduler for HeadlessScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let mut state = self.state.borrow_mut();
        state.next += 1;
        state.requested += 1;
        let handle = state.next;
        state.pending.insert(handle);
        FrameHandle(handle)
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        let mut state = self.state.borrow_mut();
        if state.pending.remove(&handle.0) {
            state.cancelled += 1;
        }
    }
}

/// Fixed-size container.
#[derive(Debug, Clone, Copy)]
pub struct HeadlessContainer(pub Size);

impl Container for HeadlessContainer {
    fn size(&self) -> Size {
        self.0
    }
}

/// In-memory preference store. Clones share the flag.
#[derive(Debug, Clone)]
pub struct MemoryPreferences {
    enabled: Rc<Cell<bool>>,
}

impl MemoryPreferences {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Rc::new(Cell::new(enabled)),
        }
    }
}

impl Default for MemoryPreferences {
    fn default() -> Self {
        Self::new(true)
    }
}

impl PreferenceStore for MemoryPreferences {
    fn particles_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn set_particles_enabled(&mut self, enabled: bool) {
        self.enabled.set(enabled);
    }
}

/// Listener registration that records whether it was detached.
#[derive(Debug, Clone, Default)]
pub struct RecordingSubscription {
    unsubscribed: Rc<Cell<u32>>,
}

impl RecordingSubscription {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unsubscribe_count(&self) -> u32 {
        self.unsubscribed.get()
    }
}

impl Subscription for RecordingSubscription {
    fn unsubscribe(&mut self) {
        self.unsubscribed.set(self.unsubscribed.get() + 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_fire_and_cancel() {
        let mut scheduler = HeadlessScheduler::new();
        let handle = scheduler.request_frame();
        assert_eq!(scheduler.pending(), 1);
        scheduler.cancel_frame(handle);
        assert_eq!(scheduler.pending(), 0);
        assert_eq!(scheduler.cancelled(), 1);
        assert!(!scheduler.fire());

        scheduler.request_frame();
        assert!(scheduler.fire());
        assert_eq!(scheduler.requested(), 2);
    }

    #[test]
    fn test_surface_failure_injection() {
        let mut backend = HeadlessBackend::new();
        backend.failing_renders().set(1);
        let stats = backend.stats();
        let mut surface = backend
            .create_surface("bg", Size::new(10, 10), &ContextOptions::default())
            .unwrap();
        let scene = ParticleScene {
            positions: &[],
            rotation: [0.0, 0.0],
            point_size: 1.0,
            color: [0, 0, 0],
            opacity: 1.0,
        };
        assert!(matches!(surface.render(&scene), Err(RenderError::Draw(_))));
        assert!(surface.render(&scene).is_ok());
        assert_eq!(stats.borrow().renders, 1);
    }

    #[test]
    fn test_dispose_recorded_once() {
        let mut backend = HeadlessBackend::new();
        let stats = backend.stats();
        let mut surface = backend
            .create_surface("bg", Size::new(10, 10), &ContextOptions::default())
            .unwrap();
        surface.dispose();
        surface.dispose();
        assert_eq!(stats.borrow().disposed, vec!["bg".to_string()]);
    }
}
