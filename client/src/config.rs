//! Page-level configuration. Compiled-in defaults, each overridable by a
//! `data-*` attribute on the mount element.

use std::str::FromStr;

use web_sys::Element;

use hoverline_shared::{KeySource, Registry, SyncConfig};

use crate::dom_host::Selectors;

pub const MOUNT_ELEMENT_ID: &str = "app";
pub const LOG_ELEMENT_ID: &str = "hoverline-log";
pub const MAX_LOG_LINES: usize = 200;
pub const DEFAULT_LOG_FILTER: &str = "info";
pub const SUGGESTION_LIMIT: usize = 8;

pub const DEFAULT_REGISTRY_URL: &str = "data/regions.csv";
pub const DEFAULT_TOPOLOGY_URL: &str = "data/regions.topo.json";

pub const DEFAULT_HOST_SELECTOR: &str = "choropleth-map";
pub const DEFAULT_HOVER_SELECTOR: &str = "[role=tooltip]";
pub const DEFAULT_DRAWABLE_SELECTOR: &str = "svg";
pub const OVERLAY_PATH_ID: &str = "hoverline-outline";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub registry_url: String,
    pub topology_url: String,
    pub delimiter: char,
    pub key_source: KeySource,
    pub selectors: Selectors,
    pub sync: SyncConfig,
    pub log_filter: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            topology_url: DEFAULT_TOPOLOGY_URL.to_string(),
            delimiter: Registry::DEFAULT_DELIMITER,
            key_source: KeySource::Id,
            selectors: Selectors {
                host: DEFAULT_HOST_SELECTOR.to_string(),
                hover: DEFAULT_HOVER_SELECTOR.to_string(),
                hover_label: None,
                drawable: DEFAULT_DRAWABLE_SELECTOR.to_string(),
                overlay_id: OVERLAY_PATH_ID.to_string(),
            },
            sync: SyncConfig::default(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl ClientConfig {
    /// Defaults overlaid with the mount element's `data-*` attributes.
    pub fn from_page() -> Self {
        let mount = web_sys::window()
            .and_then(|w| w.document())
            .and_then(|d| d.get_element_by_id(MOUNT_ELEMENT_ID));
        match mount {
            Some(el) => Self::from_element(&el),
            None => Self::default(),
        }
    }

    pub fn from_element(el: &Element) -> Self {
        let defaults = Self::default();
        let sync = SyncConfig {
            surface_poll_ms: positive(el, "data-surface-poll-ms")
                .unwrap_or(defaults.sync.surface_poll_ms),
            surface_max_retries: parsed(el, "data-surface-max-retries")
                .unwrap_or(defaults.sync.surface_max_retries),
            hover_target_retry_ms: positive(el, "data-hover-retry-ms")
                .unwrap_or(defaults.sync.hover_target_retry_ms),
            hover_target_max_retries: parsed(el, "data-hover-max-retries")
                .unwrap_or(defaults.sync.hover_target_max_retries),
            resize_quiet_ms: positive(el, "data-resize-quiet-ms")
                .unwrap_or(defaults.sync.resize_quiet_ms),
        };

        Self {
            registry_url: text(el, "data-registry-url").unwrap_or(defaults.registry_url),
            topology_url: text(el, "data-topology-url").unwrap_or(defaults.topology_url),
            delimiter: text(el, "data-delimiter")
                .and_then(|v| single_char(&v))
                .unwrap_or(defaults.delimiter),
            key_source: text(el, "data-region-key")
                .map(|v| key_source(&v))
                .unwrap_or(defaults.key_source),
            selectors: Selectors {
                host: text(el, "data-host-selector").unwrap_or(defaults.selectors.host),
                hover: text(el, "data-hover-selector").unwrap_or(defaults.selectors.hover),
                hover_label: text(el, "data-hover-label-selector"),
                drawable: text(el, "data-drawable-selector")
                    .unwrap_or(defaults.selectors.drawable),
                overlay_id: defaults.selectors.overlay_id,
            },
            sync,
            log_filter: text(el, "data-log-filter").unwrap_or(defaults.log_filter),
        }
    }
}

/// `id` (or nothing) keys regions by geometry id; anything else names a property.
pub fn key_source(value: &str) -> KeySource {
    match value.trim() {
        "" | "id" => KeySource::Id,
        name => KeySource::Property(name.to_string()),
    }
}

fn single_char(value: &str) -> Option<char> {
    match value {
        "\\t" | "tab" => Some('\t'),
        _ => {
            let mut chars = value.chars();
            let c = chars.next()?;
            chars.next().is_none().then_some(c)
        }
    }
}

fn text(el: &Element, name: &str) -> Option<String> {
    el.get_attribute(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parsed<T: FromStr>(el: &Element, name: &str) -> Option<T> {
    text(el, name).and_then(|v| v.parse::<T>().ok())
}

fn positive(el: &Element, name: &str) -> Option<f64> {
    parsed::<f64>(el, name).filter(|v| v.is_finite() && *v > 0.0)
}
