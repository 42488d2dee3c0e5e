//! Host interfaces.
//!
//! The renderer never talks to a platform directly. A host supplies a
//! [`GraphicsBackend`] that builds surfaces, a [`FrameScheduler`] for the
//! per-frame callback, a [`Container`] that reports its size, and a
//! [`PreferenceStore`] that remembers whether the animation is allowed.

use std::fmt;

use crate::error::RenderResult;
use crate::particles::ParticleScene;

/// Pixel dimensions of a surface or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width over height; 1.0 for degenerate sizes.
    pub fn aspect(&self) -> f64 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Shader precision requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    Low,
    #[default]
    Medium,
    High,
}

/// Creation parameters for a rendering context.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextOptions {
    pub alpha: bool,
    pub antialias: bool,
    pub precision: Precision,
    /// Device pixel ratio the surface should render at.
    pub pixel_ratio: f64,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            alpha: true,
            antialias: false,
            precision: Precision::Medium,
            pixel_ratio: 1.0,
        }
    }
}

/// Result of the host-capability probe at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    /// Small screen or low-power device: start at the lowest tier.
    pub constrained_device: bool,
    /// Host reclaims graphics resources poorly. The pool evicts every context
    /// when full and sweeps at half the idle threshold; animations start low.
    pub aggressive_eviction: bool,
}

/// Identifies one pending frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub u64);

/// The host's "call me before the next repaint" primitive. Each request
/// dispatches at most once.
pub trait FrameScheduler {
    fn request_frame(&mut self) -> FrameHandle;
    fn cancel_frame(&mut self, handle: FrameHandle);
}

/// One live output surface. Owned by the pool.
pub trait RenderSurface {
    fn resize(&mut self, size: Size);
    fn render(&mut self, scene: &ParticleScene<'_>) -> RenderResult<()>;
    /// Release platform resources and detach from the host container.
    fn dispose(&mut self);
}

/// Builds surfaces. Failing here makes the pool hand out a fallback.
pub trait GraphicsBackend {
    fn create_surface(
        &mut self,
        id: &str,
        size: Size,
        options: &ContextOptions,
    ) -> RenderResult<Box<dyn RenderSurface>>;
}

/// The element hosting the animation.
pub trait Container {
    fn size(&self) -> Size;
}

/// A host event listener registration. Unsubscribing twice is harmless.
pub trait Subscription {
    fn unsubscribe(&mut self);
}

/// Persisted user/device preference for the particle animation.
pub trait PreferenceStore {
    fn particles_enabled(&self) -> bool;
    fn set_particles_enabled(&mut self, enabled: bool);
}

/// Surface substituted when the host refuses a real one.
#[derive(Debug, Default)]
pub struct NullSurface;

impl RenderSurface for NullSurface {
    fn resize(&mut self, _size: Size) {}

    fn render(&mut self, _scene: &ParticleScene<'_>) -> RenderResult<()> {
        Ok(())
    }

    fn dispose(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_aspect() {
        assert!((Size::new(1920, 1080).aspect() - 16.0 / 9.0).abs() < 1e-9);
        assert_eq!(Size::new(0, 1080).aspect(), 1.0);
    }

    #[test]
    fn test_size_display() {
        assert_eq!(Size::new(320, 240).to_string(), "320x240");
    }
}
