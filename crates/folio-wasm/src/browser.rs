//! Host traits over the DOM.
//!
//! Surfaces are 2D canvases layered over their host element, frames come
//! from `requestAnimationFrame`, and the particle preference lives in
//! `localStorage` under the same key the static site reads.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use folio_core::{Clock, Timestamp};
use folio_render::{
    Container, ContextOptions, FrameHandle, FrameScheduler, GraphicsBackend, HostCapabilities,
    ParticleScene, PreferenceStore, RenderError, RenderResult, RenderSurface, Size, Subscription,
};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{
    CanvasRenderingContext2d, Element, Event, EventTarget, HtmlCanvasElement, HtmlElement,
    IntersectionObserver, Performance, Window,
};

pub const PREFERENCE_KEY: &str = "enable-particles";

/// Shared slot for the frame callback. Filled once the controller exists.
pub type FrameCallback = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

fn js_error(context: &str, err: JsValue) -> RenderError {
    RenderError::ContextUnavailable(format!("{}: {:?}", context, err))
}

// ── Capability probe ────────────────────────────────────────────────

/// Mobile user agents or narrow viewports count as constrained; Firefox
/// gets aggressive eviction because it caps live contexts hard.
pub fn probe_capabilities(window: &Window) -> HostCapabilities {
    let agent = window.navigator().user_agent().unwrap_or_default();
    let narrow = window
        .inner_width()
        .ok()
        .and_then(|w| w.as_f64())
        .is_some_and(|w| w < 768.0);
    let mobile = ["Android", "iPhone", "iPad", "iPod", "Mobile"]
        .iter()
        .any(|marker| agent.contains(marker));

    HostCapabilities {
        constrained_device: mobile || narrow,
        aggressive_eviction: agent.contains("Firefox"),
    }
}

// ── Clock ───────────────────────────────────────────────────────────

pub struct PerformanceClock {
    performance: Performance,
}

impl PerformanceClock {
    pub fn new(window: &Window) -> Option<Self> {
        window.performance().map(|performance| Self { performance })
    }
}

impl Clock for PerformanceClock {
    fn now(&self) -> Timestamp {
        Timestamp::from_millis(self.performance.now())
    }
}

// ── Surfaces ────────────────────────────────────────────────────────

/// Creates canvases inside the element registered for each context id.
pub struct CanvasBackend {
    window: Window,
    hosts: Rc<RefCell<HashMap<String, HtmlElement>>>,
}

impl CanvasBackend {
    pub fn new(window: Window, hosts: Rc<RefCell<HashMap<String, HtmlElement>>>) -> Self {
        Self { window, hosts }
    }
}

impl GraphicsBackend for CanvasBackend {
    fn create_surface(
        &mut self,
        id: &str,
        size: Size,
        options: &ContextOptions,
    ) -> RenderResult<Box<dyn RenderSurface>> {
        let host = self
            .hosts
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| RenderError::ContextUnavailable(format!("no host element for '{}'", id)))?;
        let document = self
            .window
            .document()
            .ok_or_else(|| RenderError::ContextUnavailable("no document".into()))?;

        let canvas: HtmlCanvasElement = document
            .create_element("canvas")
            .map_err(|e| js_error("create canvas", e))?
            .dyn_into()
            .map_err(|_| RenderError::ContextUnavailable("not a canvas".into()))?;
        let style = canvas.style();
        for (property, value) in [
            ("position", "absolute"),
            ("inset", "0"),
            ("width", "100%"),
            ("height", "100%"),
            ("pointer-events", "none"),
        ] {
            style
                .set_property(property, value)
                .map_err(|e| js_error("style canvas", e))?;
        }

        let context: CanvasRenderingContext2d = canvas
            .get_context("2d")
            .map_err(|e| js_error("get 2d context", e))?
            .ok_or_else(|| RenderError::ContextUnavailable("2d context refused".into()))?
            .dyn_into()
            .map_err(|_| RenderError::ContextUnavailable("not a 2d context".into()))?;

        host.append_child(&canvas)
            .map_err(|e| js_error("attach canvas", e))?;

        let mut surface = CanvasSurface {
            canvas,
            context,
            pixel_ratio: options.pixel_ratio,
            backing: Size::default(),
        };
        surface.resize(size);
        Ok(Box::new(surface))
    }
}

struct CanvasSurface {
    canvas: HtmlCanvasElement,
    context: CanvasRenderingContext2d,
    pixel_ratio: f64,
    backing: Size,
}

impl RenderSurface for CanvasSurface {
    fn resize(&mut self, size: Size) {
        let backing = Size::new(
            (size.width as f64 * self.pixel_ratio).round() as u32,
            (size.height as f64 * self.pixel_ratio).round() as u32,
        );
        self.canvas.set_width(backing.width);
        self.canvas.set_height(backing.height);
        self.backing = backing;
    }

    fn render(&mut self, scene: &ParticleScene<'_>) -> RenderResult<()> {
        if !self.canvas.is_connected() {
            return Err(RenderError::Draw("canvas detached from document".into()));
        }
        let ctx = &self.context;
        ctx.clear_rect(0.0, 0.0, self.backing.width as f64, self.backing.height as f64);
        ctx.set_global_alpha(scene.opacity as f64);
        let [r, g, b] = scene.color;
        ctx.set_fill_style_str(&format!("rgb({r}, {g}, {b})"));

        // Point size is in world units; scale by projection and backing density.
        let base = scene.point_size as f64 * self.backing.height as f64 * 0.5;
        for (x, y, scale) in scene.projected(self.backing) {
            let side = (base * scale as f64).max(1.0);
            ctx.fill_rect(x as f64 - side / 2.0, y as f64 - side / 2.0, side, side);
        }
        Ok(())
    }

    fn dispose(&mut self) {
        self.canvas.remove();
    }
}

// ── Frames ──────────────────────────────────────────────────────────

pub struct AnimationFrameScheduler {
    window: Window,
    callback: FrameCallback,
}

impl AnimationFrameScheduler {
    pub fn new(window: Window, callback: FrameCallback) -> Self {
        Self { window, callback }
    }
}

impl FrameScheduler for AnimationFrameScheduler {
    fn request_frame(&mut self) -> FrameHandle {
        let slot = self.callback.borrow();
        let Some(callback) = slot.as_ref() else {
            return FrameHandle(0);
        };
        match self
            .window
            .request_animation_frame(callback.as_ref().unchecked_ref())
        {
            Ok(id) => FrameHandle(id as u64),
            Err(e) => {
                tracing::warn!("requestAnimationFrame failed: {:?}", e);
                FrameHandle(0)
            }
        }
    }

    fn cancel_frame(&mut self, handle: FrameHandle) {
        if handle.0 != 0 {
            let _ = self.window.cancel_animation_frame(handle.0 as i32);
        }
    }
}

// ── Container & preferences ─────────────────────────────────────────

pub struct ElementContainer(pub HtmlElement);

impl Container for ElementContainer {
    fn size(&self) -> Size {
        Size::new(
            self.0.client_width().max(0) as u32,
            self.0.client_height().max(0) as u32,
        )
    }
}

/// `localStorage` flag; anything but `"false"` means enabled.
pub struct LocalStoragePreferences {
    window: Window,
}

impl LocalStoragePreferences {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn storage(&self) -> Option<web_sys::Storage> {
        self.window.local_storage().ok().flatten()
    }
}

impl PreferenceStore for LocalStoragePreferences {
    fn particles_enabled(&self) -> bool {
        self.storage()
            .and_then(|s| s.get_item(PREFERENCE_KEY).ok().flatten())
            .map_or(true, |value| value != "false")
    }

    fn set_particles_enabled(&mut self, enabled: bool) {
        if let Some(storage) = self.storage() {
            let value = if enabled { "true" } else { "false" };
            if let Err(e) = storage.set_item(PREFERENCE_KEY, value) {
                tracing::warn!("could not persist particle preference: {:?}", e);
            }
        }
    }
}

// ── Listeners ───────────────────────────────────────────────────────

/// A DOM event listener removed on unsubscribe.
pub struct EventSubscription {
    target: EventTarget,
    event: &'static str,
    closure: Option<Closure<dyn FnMut(Event)>>,
}

impl EventSubscription {
    pub fn attach(
        target: EventTarget,
        event: &'static str,
        closure: Closure<dyn FnMut(Event)>,
    ) -> Result<Self, JsValue> {
        target.add_event_listener_with_callback(event, closure.as_ref().unchecked_ref())?;
        Ok(Self {
            target,
            event,
            closure: Some(closure),
        })
    }
}

impl Subscription for EventSubscription {
    fn unsubscribe(&mut self) {
        if let Some(closure) = self.closure.take() {
            let _ = self
                .target
                .remove_event_listener_with_callback(self.event, closure.as_ref().unchecked_ref());
        }
    }
}

/// An `IntersectionObserver` watching one element.
pub struct ObserverSubscription {
    observer: IntersectionObserver,
    closure: Option<Closure<dyn FnMut(js_sys::Array)>>,
}

impl ObserverSubscription {
    pub fn observe(element: &Element, closure: Closure<dyn FnMut(js_sys::Array)>) -> Result<Self, JsValue> {
        let observer = IntersectionObserver::new(closure.as_ref().unchecked_ref())?;
        observer.observe(element);
        Ok(Self {
            observer,
            closure: Some(closure),
        })
    }
}

impl Subscription for ObserverSubscription {
    fn unsubscribe(&mut self) {
        if self.closure.take().is_some() {
            self.observer.disconnect();
        }
    }
}
