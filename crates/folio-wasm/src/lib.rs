//! # folio-wasm
//!
//! The particle background in the browser. One context pool is shared by
//! every mounted background on the page; each mount owns an animation
//! controller driven by `requestAnimationFrame`.

mod browser;

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use folio_core::AnimationConfig;
use folio_render::{
    AnimationController, AnimationEvent, AnimationHost, AnimationOptions, ContextPool,
    ControllerState, HostCapabilities, QualityTier, SharedPool, Size,
};
use serde::Deserialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlElement, MouseEvent, Window};

use browser::{
    AnimationFrameScheduler, CanvasBackend, ElementContainer, EventSubscription, FrameCallback,
    LocalStoragePreferences, ObserverSubscription, PerformanceClock,
};

/// Dispatched on the host element when the animation gives up for good.
pub const DISABLED_EVENT: &str = "folio:particles-disabled";

/// How far past the visibility grace period the teardown timer fires.
const GRACE_TIMER_SLACK_MS: f64 = 50.0;

/// Page-wide state behind every mount.
struct Runtime {
    window: Window,
    pool: SharedPool,
    hosts: Rc<RefCell<HashMap<String, HtmlElement>>>,
    clock: Rc<PerformanceClock>,
    capabilities: HostCapabilities,
    config: AnimationConfig,
    sweep: Option<(i32, Closure<dyn FnMut()>)>,
}

thread_local! {
    static RUNTIME: RefCell<Option<Runtime>> = const { RefCell::new(None) };
}

fn js_err(message: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&message.to_string())
}

/// Create the shared pool and start its idle sweep. Mounting calls this on
/// demand; calling it again is a no-op.
#[wasm_bindgen]
pub fn init() -> Result<(), JsValue> {
    RUNTIME.with(|slot| {
        if slot.borrow().is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| js_err("no window"))?;
        let clock = Rc::new(PerformanceClock::new(&window).ok_or_else(|| js_err("no performance clock"))?);
        let capabilities = browser::probe_capabilities(&window);
        let hosts = Rc::new(RefCell::new(HashMap::new()));
        let pool_config = folio_core::PoolConfig::default();
        let sweep_every = pool_config.sweep_interval_ms;

        let pool = ContextPool::new(
            Box::new(CanvasBackend::new(window.clone(), Rc::clone(&hosts))),
            clock.clone(),
            pool_config,
        )
        .with_capabilities(&capabilities)
        .shared();

        let sweep_pool = Rc::downgrade(&pool);
        let sweep = Closure::wrap(Box::new(move || {
            if let Some(pool) = sweep_pool.upgrade() {
                let mut pool = pool.borrow_mut();
                let threshold = pool.idle_threshold();
                pool.sweep(threshold);
            }
        }) as Box<dyn FnMut()>);
        let interval = window.set_interval_with_callback_and_timeout_and_arguments_0(
            sweep.as_ref().unchecked_ref(),
            sweep_every as i32,
        )?;

        *slot.borrow_mut() = Some(Runtime {
            window,
            pool,
            hosts,
            clock,
            capabilities,
            config: AnimationConfig::default(),
            sweep: Some((interval, sweep)),
        });
        Ok(())
    })
}

/// Release every context and stop the sweep. Mounted backgrounds see their
/// contexts vanish and stop on their next frame.
#[wasm_bindgen]
pub fn shutdown() {
    RUNTIME.with(|slot| {
        if let Some(mut runtime) = slot.borrow_mut().take() {
            if let Some((interval, _closure)) = runtime.sweep.take() {
                runtime.window.clear_interval_with_handle(interval);
            }
            runtime.pool.borrow_mut().release_all();
            runtime.hosts.borrow_mut().clear();
        }
    });
}

/// Number of live rendering contexts.
#[wasm_bindgen]
pub fn live_contexts() -> usize {
    RUNTIME.with(|slot| slot.borrow().as_ref().map_or(0, |rt| rt.pool.borrow().len()))
}

/// Options accepted by [`mount`] as a JSON string.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct MountOptions {
    context_id: Option<String>,
    quality: Option<QualityTier>,
    frame_rate: Option<f64>,
    particle_count: Option<usize>,
    disable_pointer_tracking: bool,
}

/// A mounted background. Dropping it from JS (`free()`) cleans up.
#[wasm_bindgen]
pub struct Background {
    controller: Rc<RefCell<AnimationController>>,
    /// Kept alive here so its grace timer outlives the listeners that feed it.
    _visibility: Option<Rc<RefCell<VisibilityWatch>>>,
}

/// Viewport intersection and tab visibility, reported by different
/// listeners. The element counts as visible only when both hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Visibility {
    in_view: bool,
    tab_visible: bool,
}

impl Default for Visibility {
    fn default() -> Self {
        Self {
            in_view: true,
            tab_visible: true,
        }
    }
}

impl Visibility {
    fn visible(self) -> bool {
        self.in_view && self.tab_visible
    }
}

/// Feeds combined visibility to the controller and enforces the grace period
/// with a timer, since hidden tabs stop delivering animation frames.
struct VisibilityWatch {
    window: Window,
    controller: Weak<RefCell<AnimationController>>,
    state: Visibility,
    grace_ms: f64,
    timer: Option<i32>,
    on_grace: Closure<dyn FnMut()>,
}

impl VisibilityWatch {
    fn new(
        window: Window,
        controller: Weak<RefCell<AnimationController>>,
        grace_ms: f64,
    ) -> Rc<RefCell<Self>> {
        Rc::new_cyclic(|weak: &Weak<RefCell<Self>>| {
            let watch = weak.clone();
            let target = controller.clone();
            let on_grace = Closure::wrap(Box::new(move || {
                if let Some(watch) = watch.upgrade() {
                    watch.borrow_mut().timer = None;
                }
                if let Some(controller) = target.upgrade() {
                    controller.borrow_mut().poll_visibility();
                }
            }) as Box<dyn FnMut()>);
            RefCell::new(Self {
                window,
                controller,
                state: Visibility::default(),
                grace_ms,
                timer: None,
                on_grace,
            })
        })
    }

    /// Apply one listener's report and forward the combined result.
    fn report(watch: &Rc<RefCell<Self>>, change: impl FnOnce(&mut Visibility)) {
        let (controller, visible) = {
            let mut watch = watch.borrow_mut();
            let before = watch.state.visible();
            change(&mut watch.state);
            let visible = watch.state.visible();
            if visible == before {
                return;
            }
            if visible {
                watch.disarm();
            } else {
                watch.arm();
            }
            (watch.controller.clone(), visible)
        };
        if let Some(controller) = controller.upgrade() {
            controller.borrow_mut().set_visible(visible);
        }
    }

    fn arm(&mut self) {
        self.disarm();
        // A little past the grace period so the controller sees it expired.
        let delay = (self.grace_ms + GRACE_TIMER_SLACK_MS).ceil() as i32;
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(self.on_grace.as_ref().unchecked_ref(), delay)
        {
            Ok(handle) => self.timer = Some(handle),
            Err(e) => tracing::warn!("could not arm visibility timer: {:?}", e),
        }
    }

    fn disarm(&mut self) {
        if let Some(handle) = self.timer.take() {
            self.window.clear_timeout_with_handle(handle);
        }
    }
}

impl Drop for VisibilityWatch {
    fn drop(&mut self) {
        self.disarm();
    }
}

#[wasm_bindgen]
impl Background {
    pub fn pause(&self) {
        self.controller.borrow_mut().pause();
    }

    pub fn resume(&self) {
        self.controller.borrow_mut().resume();
    }

    /// Stop the animation and detach its listeners. The canvas stays with
    /// the pool until swept or evicted.
    pub fn cleanup(&self) {
        self.controller.borrow_mut().cleanup();
    }

    #[wasm_bindgen(getter)]
    pub fn running(&self) -> bool {
        self.controller.borrow().state() == ControllerState::Running
    }

    #[wasm_bindgen(getter)]
    pub fn tier(&self) -> String {
        self.controller.borrow().tier().to_string()
    }

    #[wasm_bindgen(getter, js_name = frameCount)]
    pub fn frame_count(&self) -> f64 {
        self.controller.borrow().frame_count() as f64
    }
}

/// Mount a particle background inside `element`.
///
/// `options_json` may set `contextId`, `quality` (`"low"`, `"medium"`,
/// `"high"`), `frameRate`, `particleCount` and `disablePointerTracking`.
#[wasm_bindgen]
pub fn mount(element: HtmlElement, options_json: Option<String>) -> Result<Background, JsValue> {
    init()?;
    let options: MountOptions = match options_json.as_deref() {
        Some(raw) if !raw.trim().is_empty() => {
            serde_json::from_str(raw).map_err(|e| js_err(format!("invalid options: {}", e)))?
        }
        _ => MountOptions::default(),
    };

    RUNTIME.with(|slot| {
        let slot = slot.borrow();
        let runtime = slot.as_ref().ok_or_else(|| js_err("runtime not initialised"))?;
        mount_with(runtime, element, options)
    })
}

fn mount_with(runtime: &Runtime, element: HtmlElement, options: MountOptions) -> Result<Background, JsValue> {
    let window = runtime.window.clone();
    let context_id = options.context_id.unwrap_or_else(|| "background".to_string());
    runtime
        .hosts
        .borrow_mut()
        .insert(context_id.clone(), element.clone());

    let device_ratio = window.device_pixel_ratio();
    let callback: FrameCallback = Rc::new(RefCell::new(None));
    let animation_options = AnimationOptions {
        context_id,
        quality: options.quality,
        frame_rate: options.frame_rate,
        particle_count: options.particle_count,
        pointer_tracking: !options.disable_pointer_tracking,
        pixel_ratio: device_ratio,
    };

    let controller = Rc::new_cyclic(|weak: &Weak<RefCell<AnimationController>>| {
        // The frame callback must exist before `start` requests the first frame.
        *callback.borrow_mut() = Some(frame_callback(weak.clone(), element.clone()));
        let host = AnimationHost {
            scheduler: Box::new(AnimationFrameScheduler::new(window.clone(), Rc::clone(&callback))),
            preferences: Box::new(LocalStoragePreferences::new(window.clone())),
            clock: runtime.clock.clone(),
            capabilities: runtime.capabilities,
        };
        RefCell::new(AnimationController::start(
            &ElementContainer(element.clone()),
            Rc::clone(&runtime.pool),
            host,
            &runtime.config,
            animation_options,
        ))
    });

    let visibility = if controller.borrow().is_destroyed() {
        None
    } else {
        let watch = VisibilityWatch::new(
            window.clone(),
            Rc::downgrade(&controller),
            runtime.config.visibility_grace_ms,
        );
        attach_listeners(&window, &element, &controller, &watch)?;
        Some(watch)
    };
    // A background disabled by preference reports it like any other.
    let events = controller.borrow_mut().drain_events();
    dispatch_events(&element, events);
    Ok(Background {
        controller,
        _visibility: visibility,
    })
}

/// One animation frame: tick, then surface a give-up to the page.
fn frame_callback(weak: Weak<RefCell<AnimationController>>, element: HtmlElement) -> Closure<dyn FnMut()> {
    Closure::wrap(Box::new(move || {
        let Some(controller) = weak.upgrade() else {
            return;
        };
        let events = {
            let mut controller = controller.borrow_mut();
            controller.tick();
            controller.drain_events()
        };
        dispatch_events(&element, events);
    }) as Box<dyn FnMut()>)
}

fn dispatch_events(element: &HtmlElement, events: Vec<AnimationEvent>) {
    for event in events {
        match event {
            AnimationEvent::Disabled => {
                if let Ok(event) = Event::new(DISABLED_EVENT) {
                    let _ = element.dispatch_event(&event);
                }
            }
            other => tracing::debug!("background event: {:?}", other),
        }
    }
}

fn attach_listeners(
    window: &Window,
    element: &HtmlElement,
    controller: &Rc<RefCell<AnimationController>>,
    watch: &Rc<RefCell<VisibilityWatch>>,
) -> Result<(), JsValue> {
    // Resize follows the host element.
    let resize = {
        let weak = Rc::downgrade(controller);
        let element = element.clone();
        Closure::wrap(Box::new(move |_event: Event| {
            if let Some(controller) = weak.upgrade() {
                let size = Size::new(
                    element.client_width().max(0) as u32,
                    element.client_height().max(0) as u32,
                );
                controller.borrow_mut().on_resize(size);
            }
        }) as Box<dyn FnMut(Event)>)
    };
    let resize = EventSubscription::attach(window.clone().into(), "resize", resize)?;

    // Pointer position normalised to the viewport.
    let pointer = {
        let weak = Rc::downgrade(controller);
        let window = window.clone();
        Closure::wrap(Box::new(move |event: Event| {
            let (Some(controller), Some(mouse)) = (weak.upgrade(), event.dyn_ref::<MouseEvent>()) else {
                return;
            };
            let width = window.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(1.0);
            let height = window.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(1.0);
            let x = (mouse.client_x() as f64 / width) * 2.0 - 1.0;
            let y = -(mouse.client_y() as f64 / height) * 2.0 + 1.0;
            controller.borrow_mut().on_pointer_move(x as f32, y as f32);
        }) as Box<dyn FnMut(Event)>)
    };
    let pointer = EventSubscription::attach(window.clone().into(), "mousemove", pointer)?;

    // Scrolled out of view.
    let intersection = {
        let watch = Rc::clone(watch);
        Closure::wrap(Box::new(move |entries: js_sys::Array| {
            let in_view = entries.iter().any(|entry| {
                entry
                    .dyn_into::<web_sys::IntersectionObserverEntry>()
                    .is_ok_and(|entry| entry.is_intersecting())
            });
            VisibilityWatch::report(&watch, |state| state.in_view = in_view);
        }) as Box<dyn FnMut(js_sys::Array)>)
    };
    let intersection = ObserverSubscription::observe(element, intersection)?;

    // Tab hidden.
    let document = window.document().ok_or_else(|| js_err("no document"))?;
    if document.hidden() {
        VisibilityWatch::report(watch, |state| state.tab_visible = false);
    }
    let visibility = {
        let watch = Rc::clone(watch);
        let document = document.clone();
        Closure::wrap(Box::new(move |_event: Event| {
            let tab_visible = !document.hidden();
            VisibilityWatch::report(&watch, |state| state.tab_visible = tab_visible);
        }) as Box<dyn FnMut(Event)>)
    };
    let visibility = EventSubscription::attach(document.into(), "visibilitychange", visibility)?;

    let mut controller = controller.borrow_mut();
    controller.attach_listener(Box::new(resize));
    controller.attach_listener(Box::new(pointer));
    controller.attach_listener(Box::new(intersection));
    controller.attach_listener(Box::new(visibility));
    Ok(())
}

/// Get the version string.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
