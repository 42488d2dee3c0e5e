//! # folio-render
//!
//! The decorative background renderer. A [`ContextPool`] bounds the number of
//! live rendering contexts; an [`AnimationController`] drives one particle
//! animation through a pooled context on the host's frame callback.
//!
//! Everything platform-specific sits behind the traits in [`host`]. The
//! [`headless`] module implements them in-process for tests and simulation.

pub mod controller;
pub mod error;
pub mod headless;
pub mod host;
pub mod particles;
pub mod pool;
pub mod quality;

pub use controller::{
    AnimationController, AnimationEvent, AnimationHost, AnimationOptions, ControllerState, StopReason,
};
pub use error::{RenderError, RenderResult};
pub use host::{
    Container, ContextOptions, FrameHandle, FrameScheduler, GraphicsBackend, HostCapabilities,
    PreferenceStore, RenderSurface, Size, Subscription,
};
pub use particles::{ParticleField, ParticleScene};
pub use pool::{ContextLease, ContextPool, RenderContext, SharedPool};
pub use quality::{DegradationPolicy, DegradationState, QualityTier, Verdict};
