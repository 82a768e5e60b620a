use leptos::prelude::{RwSignal, Set};
use wasm_bindgen::JsCast;
use wasm_bindgen::closure::Closure;
use web_sys::{
    Document, Element, MutationObserver, MutationObserverInit, ResizeObserver, ShadowRoot, Window,
};

use hoverline_shared::{InfoUpdate, OverlayUpdate, RegionRecord, SurfaceHost};

use crate::driver;

const SVG_NS: &str = "http://www.w3.org/2000/svg";

/// CSS selectors locating the vendor map's parts.
#[derive(Debug, Clone)]
pub struct Selectors {
    /// The map's custom element in the page.
    pub host: String,
    /// Tooltip element inside the map's shadow root.
    pub hover: String,
    /// Optional child of the tooltip carrying just the region name.
    pub hover_label: Option<String>,
    /// The `<svg>` the map draws into, inside the shadow root.
    pub drawable: String,
    /// Id given to the `<path>` we append for outlines.
    pub overlay_id: String,
}

/// Size notifications for the drawable: a `ResizeObserver` on the `<svg>`
/// itself, plus the window `resize` event where observing is unavailable.
struct ResizeBinding {
    observer: Option<ResizeObserver>,
    window: Option<Window>,
    handler: Closure<dyn FnMut()>,
}

impl Drop for ResizeBinding {
    fn drop(&mut self) {
        if let Some(observer) = self.observer.as_ref() {
            observer.disconnect();
        }
        if let Some(window) = self.window.as_ref() {
            let _ = window
                .remove_event_listener_with_callback("resize", self.handler.as_ref().unchecked_ref());
        }
    }
}

struct HoverBinding {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut()>,
}

impl Drop for HoverBinding {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}

/// [`SurfaceHost`] backed by the live DOM. Reaches into the vendor map's
/// open shadow root; writes only to the `<path>` it adds there.
pub struct DomHost {
    document: Document,
    selectors: Selectors,
    info: RwSignal<Option<RegionRecord>>,
    shadow: Option<ShadowRoot>,
    hover: Option<Element>,
    drawable: Option<Element>,
    overlay: Option<Element>,
    resize_binding: Option<ResizeBinding>,
    hover_binding: Option<HoverBinding>,
}

impl DomHost {
    pub fn new(
        document: Document,
        selectors: Selectors,
        info: RwSignal<Option<RegionRecord>>,
    ) -> Self {
        Self {
            document,
            selectors,
            info,
            shadow: None,
            hover: None,
            drawable: None,
            overlay: None,
            resize_binding: None,
            hover_binding: None,
        }
    }

    fn find_in_shadow(&self, selector: &str) -> Option<Element> {
        self.shadow
            .as_ref()
            .and_then(|root| root.query_selector(selector).ok().flatten())
    }

    /// Reuse our outline path if a previous mount left one, else append a new one.
    fn ensure_overlay(&self, drawable: &Element) -> Option<Element> {
        let selector = format!("#{}", self.selectors.overlay_id);
        if let Ok(Some(existing)) = drawable.query_selector(&selector) {
            return Some(existing);
        }

        let path = self.document.create_element_ns(Some(SVG_NS), "path").ok()?;
        path.set_id(&self.selectors.overlay_id);
        for (name, value) in [
            ("fill", "none"),
            ("stroke", "#f5c542"),
            ("stroke-width", "2"),
            ("stroke-linejoin", "round"),
            ("pointer-events", "none"),
        ] {
            path.set_attribute(name, value).ok()?;
        }
        drawable.append_child(&path).ok()?;
        Some(path)
    }
}

impl SurfaceHost for DomHost {
    fn is_ready(&mut self) -> bool {
        let shadow = self
            .document
            .query_selector(&self.selectors.host)
            .ok()
            .flatten()
            .and_then(|el| el.shadow_root())
            .filter(|root| root.child_element_count() > 0);
        let ready = shadow.is_some();
        self.shadow = shadow;
        ready
    }

    fn locate_hover_target(&mut self) -> bool {
        let hover = self.find_in_shadow(&self.selectors.hover);
        let drawable = self.find_in_shadow(&self.selectors.drawable);
        let overlay = drawable.as_ref().and_then(|d| self.ensure_overlay(d));

        let found = hover.is_some() && overlay.is_some();
        if found {
            self.hover = hover;
            self.drawable = drawable;
            self.overlay = overlay;
        } else {
            tracing::debug!(
                hover = hover.is_some(),
                drawable = drawable.is_some(),
                "hover target incomplete"
            );
        }
        found
    }

    fn drawable_dimensions(&self) -> Option<(f64, f64)> {
        let rect = self.drawable.as_ref()?.get_bounding_client_rect();
        Some((rect.width(), rect.height()))
    }

    fn subscribe_to_resize(&mut self) {
        let Some(drawable) = self.drawable.as_ref() else {
            return;
        };
        let handler = Closure::<dyn FnMut()>::new(|| {
            driver::dispatch(|sync| sync.on_resize(driver::now_ms()));
        });

        match ResizeObserver::new(handler.as_ref().unchecked_ref()) {
            Ok(observer) => {
                observer.observe(drawable);
                self.resize_binding = Some(ResizeBinding {
                    observer: Some(observer),
                    window: None,
                    handler,
                });
            }
            Err(e) => {
                tracing::warn!(error = ?e, "ResizeObserver unavailable; following window resizes");
                let Some(window) = web_sys::window() else {
                    return;
                };
                if let Err(e) = window
                    .add_event_listener_with_callback("resize", handler.as_ref().unchecked_ref())
                {
                    tracing::warn!(error = ?e, "could not listen for resize; projection stays fixed");
                    return;
                }
                self.resize_binding = Some(ResizeBinding {
                    observer: None,
                    window: Some(window),
                    handler,
                });
            }
        }
    }

    fn subscribe_to_hover_change(&mut self) {
        let Some(hover) = self.hover.as_ref() else {
            return;
        };
        let callback = Closure::<dyn FnMut()>::new(|| {
            driver::dispatch(|sync| sync.on_hover_change());
        });
        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(e) => {
                tracing::warn!(error = ?e, "MutationObserver unavailable; hover ignored");
                return;
            }
        };
        let options = MutationObserverInit::new();
        options.set_child_list(true);
        options.set_character_data(true);
        options.set_subtree(true);
        if let Err(e) = observer.observe_with_options(hover, &options) {
            tracing::warn!(error = ?e, "could not observe hover notification");
            return;
        }
        self.hover_binding = Some(HoverBinding {
            observer,
            _callback: callback,
        });
    }

    fn hover_label(&self) -> Option<String> {
        let hover = self.hover.as_ref()?;
        let source = match self.selectors.hover_label.as_deref() {
            Some(selector) => hover.query_selector(selector).ok().flatten()?,
            None => hover.clone(),
        };
        let text = source.text_content()?;
        text.lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(str::to_string)
    }

    fn present(&mut self, update: OverlayUpdate<'_>) {
        if let (Some(d), Some(overlay)) = (update.path, self.overlay.as_ref())
            && let Err(e) = overlay.set_attribute("d", d)
        {
            tracing::warn!(error = ?e, "could not write outline path");
        }
        match update.info {
            InfoUpdate::Unchanged => {}
            InfoUpdate::Show(record) => self.info.set(Some(record.clone())),
            InfoUpdate::Clear => self.info.set(None),
        }
    }
}
