use std::cell::RefCell;

use gloo_timers::callback::Timeout;
use leptos::prelude::RwSignal;

use hoverline_shared::{RegionRecord, Synchronizer};

use crate::config::ClientConfig;
use crate::dom_host::DomHost;
use crate::loader;

thread_local! {
    static SYNC: RefCell<Option<Synchronizer<DomHost>>> = const { RefCell::new(None) };
    static WAKEUP: RefCell<Option<Timeout>> = const { RefCell::new(None) };
}

pub fn now_ms() -> f64 {
    js_sys::Date::now()
}

/// Build the synchronizer for this page, start discovery, and kick off the
/// two data loads. A previous instance (from a re-mount) is dropped first.
pub fn start(
    config: &ClientConfig,
    info: RwSignal<Option<RegionRecord>>,
    registry_loaded: RwSignal<bool>,
) {
    let Some(document) = web_sys::window().and_then(|w| w.document()) else {
        tracing::error!("no document available; overlay disabled");
        return;
    };
    let host = DomHost::new(document, config.selectors.clone(), info);
    let sync = Synchronizer::new(host, config.sync.clone(), now_ms());
    tracing::info!(host = %config.selectors.host, "waiting for map surface");

    SYNC.with(|slot| {
        let _old = slot.borrow_mut().replace(sync);
    });
    rearm();

    loader::spawn_loads(config, registry_loaded);
}

/// Run `f` against the live synchronizer, then reschedule its next wakeup.
/// Returns `None` when nothing is installed yet.
pub fn dispatch<R>(f: impl FnOnce(&mut Synchronizer<DomHost>) -> R) -> Option<R> {
    let result = SYNC.with(|slot| match slot.try_borrow_mut() {
        Ok(mut guard) => guard.as_mut().map(f),
        Err(_) => {
            tracing::warn!("synchronizer busy; event dropped");
            None
        }
    });
    rearm();
    result
}

/// Read-only access for views. Never blocks a dispatch in progress.
pub fn with_sync<R>(f: impl FnOnce(&Synchronizer<DomHost>) -> R) -> Option<R> {
    SYNC.with(|slot| slot.try_borrow().ok()?.as_ref().map(f))
}

/// Keep exactly one timer armed for the synchronizer's earliest deadline.
fn rearm() {
    let next = with_sync(|sync| sync.next_wakeup()).flatten();
    WAKEUP.with(|slot| {
        let mut slot = slot.borrow_mut();
        if let Some(timeout) = slot.take() {
            timeout.cancel();
        }
        if let Some(at) = next {
            let delay = (at - now_ms()).max(0.0).ceil() as u32;
            *slot = Some(Timeout::new(delay, || {
                dispatch(|sync| sync.tick(now_ms()));
            }));
        }
    });
}
