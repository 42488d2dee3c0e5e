//! Bounded pool of rendering contexts.
//!
//! The pool is the only owner of live surfaces. Callers get a
//! [`ContextLease`] and go back through the pool for every use, so the pool
//! can evict or sweep a context at any time without leaving dangling handles.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use folio_core::{Clock, Duration, PoolConfig, Timestamp};

use crate::error::{RenderError, RenderResult};
use crate::host::{ContextOptions, GraphicsBackend, HostCapabilities, NullSurface, RenderSurface, Size};
use crate::particles::ParticleScene;

/// The pool as shared between controllers on one event loop.
pub type SharedPool = Rc<RefCell<ContextPool>>;

/// One live context owned by the pool.
pub struct RenderContext {
    id: String,
    surface: Box<dyn RenderSurface>,
    created_at: Timestamp,
    last_used_at: Timestamp,
    size: Size,
    /// Insertion order, used to break `last_used_at` ties.
    seq: u64,
    generation: u64,
    fallback: bool,
}

impl RenderContext {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn last_used_at(&self) -> Timestamp {
        self.last_used_at
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True when the host refused a surface and this entry renders nothing.
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }

    fn dispose(&mut self) {
        self.surface.dispose();
    }
}

impl std::fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderContext")
            .field("id", &self.id)
            .field("size", &self.size)
            .field("created_at", &self.created_at)
            .field("last_used_at", &self.last_used_at)
            .field("generation", &self.generation)
            .field("fallback", &self.fallback)
            .finish()
    }
}

/// Non-owning reference to a pooled context.
///
/// A lease outlives its context when the pool evicts, sweeps or recreates
/// it; the generation tells the two apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextLease {
    pub id: String,
    pub generation: u64,
    pub size: Size,
    pub fallback: bool,
}

pub struct ContextPool {
    backend: Box<dyn GraphicsBackend>,
    clock: Rc<dyn Clock>,
    config: PoolConfig,
    aggressive_eviction: bool,
    contexts: HashMap<String, RenderContext>,
    next_seq: u64,
    next_generation: u64,
    last_sweep: Timestamp,
}

impl ContextPool {
    pub fn new(backend: Box<dyn GraphicsBackend>, clock: Rc<dyn Clock>, config: PoolConfig) -> Self {
        let last_sweep = clock.now();
        Self {
            backend,
            clock,
            config: PoolConfig {
                capacity: config.capacity.max(1),
                ..config
            },
            aggressive_eviction: false,
            contexts: HashMap::new(),
            next_seq: 0,
            next_generation: 1,
            last_sweep,
        }
    }

    /// Apply the host-capability probe.
    pub fn with_capabilities(mut self, caps: &HostCapabilities) -> Self {
        self.aggressive_eviction = caps.aggressive_eviction;
        self
    }

    /// Wrap for sharing between controllers.
    pub fn shared(self) -> SharedPool {
        Rc::new(RefCell::new(self))
    }

    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.contexts.contains_key(id)
    }

    pub fn get_context(&self, id: &str) -> Option<&RenderContext> {
        self.contexts.get(id)
    }

    /// Ids of live contexts, least recently used first.
    pub fn ids_by_recency(&self) -> Vec<String> {
        let mut entries: Vec<&RenderContext> = self.contexts.values().collect();
        entries.sort_by(|a, b| recency_order(a, b));
        entries.into_iter().map(|ctx| ctx.id.clone()).collect()
    }

    /// Return the context for `id`, creating it (and evicting to make room)
    /// when absent. Never fails: a refused surface becomes a fallback entry.
    pub fn acquire(&mut self, id: &str, size_hint: Size, options: &ContextOptions) -> ContextLease {
        let now = self.clock.now();

        if let Some(ctx) = self.contexts.get_mut(id) {
            ctx.last_used_at = now;
            if ctx.size != size_hint {
                ctx.surface.resize(size_hint);
                ctx.size = size_hint;
            }
            return lease_for(ctx);
        }

        if self.contexts.len() >= self.config.capacity {
            if self.aggressive_eviction {
                tracing::info!("context pool full ({}), releasing every context", self.contexts.len());
                self.release_all();
            } else {
                self.evict_lru();
            }
        }

        let (surface, fallback) = match self.backend.create_surface(id, size_hint, options) {
            Ok(surface) => (surface, false),
            Err(e) => {
                tracing::warn!("context '{}' unavailable, using fallback: {}", id, e);
                (Box::new(NullSurface) as Box<dyn RenderSurface>, true)
            }
        };

        let ctx = RenderContext {
            id: id.to_string(),
            surface,
            created_at: now,
            last_used_at: now,
            size: size_hint,
            seq: self.next_seq,
            generation: self.next_generation,
            fallback,
        };
        self.next_seq += 1;
        self.next_generation += 1;

        tracing::info!("created context '{}' ({}) generation {}", id, size_hint, ctx.generation);
        let lease = lease_for(&ctx);
        self.contexts.insert(id.to_string(), ctx);
        lease
    }

    /// Mark `id` as used now. Unknown ids are ignored.
    pub fn touch(&mut self, id: &str) {
        let now = self.clock.now();
        if let Some(ctx) = self.contexts.get_mut(id) {
            ctx.last_used_at = now;
        }
    }

    /// Whether the lease still refers to the live context.
    pub fn is_live(&self, lease: &ContextLease) -> bool {
        self.contexts
            .get(&lease.id)
            .is_some_and(|ctx| ctx.generation == lease.generation)
    }

    /// Render one frame through the leased context and count it as usage.
    pub fn render(&mut self, lease: &ContextLease, scene: &ParticleScene<'_>) -> RenderResult<()> {
        let now = self.clock.now();
        let ctx = self
            .contexts
            .get_mut(&lease.id)
            .filter(|ctx| ctx.generation == lease.generation)
            .ok_or_else(|| RenderError::context_lost(&lease.id))?;

        ctx.surface.render(scene)?;
        ctx.last_used_at = now;
        Ok(())
    }

    /// Resize the leased context.
    pub fn resize(&mut self, lease: &ContextLease, size: Size) -> RenderResult<()> {
        let ctx = self
            .contexts
            .get_mut(&lease.id)
            .filter(|ctx| ctx.generation == lease.generation)
            .ok_or_else(|| RenderError::context_lost(&lease.id))?;

        if ctx.size != size {
            ctx.surface.resize(size);
            ctx.size = size;
        }
        Ok(())
    }

    /// Dispose and forget `id`. Returns whether anything was released.
    pub fn release(&mut self, id: &str) -> bool {
        match self.contexts.remove(id) {
            Some(mut ctx) => {
                ctx.dispose();
                tracing::info!("released context '{}'", id);
                true
            }
            None => false,
        }
    }

    /// Release every context idle for longer than `idle_threshold`.
    /// Returns how many were released.
    pub fn sweep(&mut self, idle_threshold: Duration) -> usize {
        let now = self.clock.now();
        self.last_sweep = now;

        let idle: Vec<String> = self
            .contexts
            .values()
            .filter(|ctx| now.since(ctx.last_used_at) > idle_threshold)
            .map(|ctx| ctx.id.clone())
            .collect();

        for id in &idle {
            tracing::info!("sweeping idle context '{}'", id);
            self.release(id);
        }
        idle.len()
    }

    /// The idle threshold the periodic sweep uses.
    pub fn idle_threshold(&self) -> Duration {
        let threshold = Duration::from_millis(self.config.idle_timeout_ms);
        if self.aggressive_eviction {
            Duration::from_millis(threshold.as_millis() / 2.0)
        } else {
            threshold
        }
    }

    /// Run the idle sweep if the sweep interval has elapsed since the last one.
    pub fn poll_sweep(&mut self) -> usize {
        let now = self.clock.now();
        if now.since(self.last_sweep).as_millis() < self.config.sweep_interval_ms {
            return 0;
        }
        self.sweep(self.idle_threshold())
    }

    /// Dispose every live context.
    pub fn release_all(&mut self) {
        for (id, mut ctx) in self.contexts.drain() {
            ctx.dispose();
            tracing::debug!("released context '{}'", id);
        }
    }

    fn evict_lru(&mut self) {
        let victim = self
            .contexts
            .values()
            .min_by(|a, b| recency_order(a, b))
            .map(|ctx| ctx.id.clone());

        if let Some(id) = victim {
            tracing::info!("context pool full ({}), evicting '{}'", self.config.capacity, id);
            self.release(&id);
        }
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        self.release_all();
    }
}

fn lease_for(ctx: &RenderContext) -> ContextLease {
    ContextLease {
        id: ctx.id.clone(),
        generation: ctx.generation,
        size: ctx.size,
        fallback: ctx.fallback,
    }
}

/// Oldest `last_used_at` first, then insertion order.
fn recency_order(a: &RenderContext, b: &RenderContext) -> std::cmp::Ordering {
    a.last_used_at
        .as_millis()
        .total_cmp(&b.last_used_at.as_millis())
        .then(a.seq.cmp(&b.seq))
}
