use leptos::prelude::{RwSignal, Set};
use wasm_bindgen_futures::spawn_local;

use hoverline_shared::{KeySource, Registry, TopologyDocument};

use crate::config::ClientConfig;
use crate::driver;

async fn fetch_text(url: &str) -> Result<String, String> {
    let resp = gloo_net::http::Request::get(url)
        .send()
        .await
        .map_err(|e| format!("fetch error: {e}"))?;

    if !resp.ok() {
        return Err(format!("HTTP {}", resp.status()));
    }

    resp.text().await.map_err(|e| format!("read error: {e}"))
}

/// Fetch and parse the delimited region registry.
pub async fn fetch_registry(url: &str, delimiter: char) -> Result<Registry, String> {
    let text = fetch_text(url).await?;
    Ok(Registry::parse(&text, delimiter))
}

/// Fetch and decode the region topology.
pub async fn fetch_topology(url: &str, keys: &KeySource) -> Result<TopologyDocument, String> {
    let text = fetch_text(url).await?;
    TopologyDocument::from_json(&text, keys).map_err(|e| format!("parse error: {e}"))
}

/// Start both loads. Each result reaches the synchronizer whenever it lands;
/// a failed load leaves that half of the overlay inert. `registry_loaded`
/// flips once names are searchable.
pub fn spawn_loads(config: &ClientConfig, registry_loaded: RwSignal<bool>) {
    let registry_url = config.registry_url.clone();
    let delimiter = config.delimiter;
    spawn_local(async move {
        match fetch_registry(&registry_url, delimiter).await {
            Ok(registry) => {
                driver::dispatch(|sync| sync.load_registry(registry));
                registry_loaded.set(true);
            }
            Err(e) => {
                tracing::warn!(url = %registry_url, error = %e, "registry unavailable");
            }
        }
    });

    let topology_url = config.topology_url.clone();
    let keys = config.key_source.clone();
    spawn_local(async move {
        match fetch_topology(&topology_url, &keys).await {
            Ok(document) => {
                driver::dispatch(|sync| sync.load_topology(&document));
            }
            Err(e) => {
                tracing::warn!(url = %topology_url, error = %e, "topology unavailable");
            }
        }
    });
}
