use leptos::prelude::*;
use wasm_bindgen::JsCast;

use hoverline_shared::RegionRecord;

use crate::config::{ClientConfig, LOG_ELEMENT_ID, SUGGESTION_LIMIT};
use crate::driver;
use crate::logging;

/// Record whose tooltip is on display. Written by the DOM host, read by [`InfoPanel`].
#[derive(Clone, Copy)]
pub(crate) struct InfoDisplay(pub RwSignal<Option<RegionRecord>>);
/// Flips to `true` once the registry has reached the synchronizer.
#[derive(Clone, Copy)]
pub(crate) struct RegistryLoaded(pub RwSignal<bool>);

#[component]
pub fn App() -> impl IntoView {
    let info: RwSignal<Option<RegionRecord>> = RwSignal::new(None);
    provide_context(InfoDisplay(info));

    let registry_loaded = RwSignal::new(false);
    provide_context(RegistryLoaded(registry_loaded));

    // Runs after mount, so startup lines land in the log element.
    let config = ClientConfig::from_page();
    Effect::new(move || {
        logging::flush_backlog();
        driver::start(&config, info, registry_loaded);
    });

    view! {
        <div
            class="hoverline"
            style="position: fixed; top: 16px; right: 16px; z-index: 20; width: 280px; display: flex; flex-direction: column; gap: 8px; font-family: 'Inter', system-ui, sans-serif;"
        >
            <RegionSearch />
            <InfoPanel />
            <div
                id=LOG_ELEMENT_ID
                class="hoverline-log"
                style="max-height: 140px; overflow-y: auto; font-family: 'JetBrains Mono', monospace; font-size: 0.6rem; color: #5a5860; background: rgba(19,22,31,0.85); border-radius: 6px; padding: 4px 6px;"
            />
        </div>
    }
}

/// Search box with prefix suggestions. Picking one outlines that region
/// exactly as hovering it would.
#[component]
fn RegionSearch() -> impl IntoView {
    let RegistryLoaded(registry_loaded) = expect_context();
    let query: RwSignal<String> = RwSignal::new(String::new());
    let suggestions = suggestion_list(query, registry_loaded, live_suggestions);

    let pick = move |name: String| {
        driver::dispatch(|sync| sync.select(&name));
        query.set(name);
    };

    view! {
        <div style="display: flex; flex-direction: column; gap: 4px;">
            <div style="display: flex; gap: 6px;">
                <input
                    type="text"
                    placeholder="Find a region..."
                    style="flex: 1; background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 6px 8px; color: #e2e0d8; font-size: 0.8rem;"
                    prop:value=move || query.get()
                    on:input=move |e| {
                        if let Some(input) = e.target().and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok()) {
                            query.set(input.value());
                        }
                    }
                    on:keydown=move |e: web_sys::KeyboardEvent| {
                        if e.key() == "Enter" {
                            pick(query.get_untracked());
                        }
                    }
                />
                <button
                    style="background: #13161f; border: 1px solid #282c3e; border-radius: 6px; padding: 0 10px; color: #9a9590; cursor: pointer; font-size: 0.75rem;"
                    on:click=move |_| {
                        query.set(String::new());
                        driver::dispatch(|sync| sync.clear());
                    }
                >
                    "Clear"
                </button>
            </div>
            <ul style="list-style: none; margin: 0; padding: 0; background: #161921; border-radius: 6px; overflow: hidden;">
                {move || suggestions.get().into_iter().map(|name| {
                    let label = name.clone();
                    view! {
                        <li
                            style="padding: 4px 8px; font-size: 0.75rem; color: #e2e0d8; cursor: pointer; border-top: 1px solid rgba(40,44,62,0.5);"
                            on:click=move |_| pick(name.clone())
                        >
                            {label}
                        </li>
                    }
                }).collect_view()}
            </ul>
        </div>
    }
}

/// Suggestions for the current query. Recomputed on every keystroke and
/// once more when the registry lands.
pub(crate) fn suggestion_list(
    query: RwSignal<String>,
    registry_loaded: RwSignal<bool>,
    lookup: fn(&str) -> Vec<String>,
) -> Memo<Vec<String>> {
    Memo::new(move |_| {
        registry_loaded.track();
        lookup(&query.get())
    })
}

fn live_suggestions(prefix: &str) -> Vec<String> {
    driver::with_sync(|sync| {
        sync.suggest(prefix, SUGGESTION_LIMIT)
            .into_iter()
            .map(|record| record.display_name.clone())
            .filter(|name| !name.eq_ignore_ascii_case(prefix.trim()))
            .collect()
    })
    .unwrap_or_default()
}

/// Name and tooltip text of the highlighted region.
#[component]
fn InfoPanel() -> impl IntoView {
    let InfoDisplay(info) = expect_context();

    view! {
        {move || {
            let Some(record) = info.get() else {
                return view! { <div style="display:none;" /> }.into_any();
            };
            view! {
                <div
                    class="hoverline-info"
                    style="background: #161921; border: 1px solid #282c3e; border-left: 3px solid #f5c542; border-radius: 6px; padding: 8px 10px; box-shadow: 0 4px 16px rgba(0,0,0,0.5);"
                >
                    <div style="font-size: 0.85rem; font-weight: 700; color: #e2e0d8;">
                        {record.display_name}
                    </div>
                    <div style="font-size: 0.7rem; color: #5a5860; font-family: 'JetBrains Mono', monospace;">
                        {record.region_key}
                    </div>
                    <div style="font-size: 0.75rem; color: #9a9590; margin-top: 4px; white-space: pre-line;">
                        {record.tooltip_text}
                    </div>
                </div>
            }.into_any()
        }}
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use hoverline_shared::Registry;
    use leptos::reactive::owner::Owner;

    use super::*;

    thread_local! {
        static LOADED: RefCell<Option<Registry>> = const { RefCell::new(None) };
    }

    fn loaded_suggestions(prefix: &str) -> Vec<String> {
        LOADED.with(|slot| {
            slot.borrow()
                .as_ref()
                .map(|registry| {
                    registry
                        .suggest(prefix, SUGGESTION_LIMIT)
                        .into_iter()
                        .map(|record| record.display_name.clone())
                        .collect()
                })
                .unwrap_or_default()
        })
    }

    #[test]
    fn suggestions_appear_when_registry_lands_after_typing() {
        let owner = Owner::new();
        owner.with(|| {
            let query = RwSignal::new("ha".to_string());
            let registry_loaded = RwSignal::new(false);
            let suggestions = suggestion_list(query, registry_loaded, loaded_suggestions);
            assert!(suggestions.get().is_empty());

            LOADED.with(|slot| {
                *slot.borrow_mut() = Some(Registry::parse(
                    "name;key;tooltip\nHamburg;02;Hansestadt\nHessen;06;Wiesbaden\n",
                    ';',
                ));
            });
            registry_loaded.set(true);
            assert_eq!(suggestions.get(), ["Hamburg"]);
        });
    }
}
