//! Surface synchronizer: finds the host surface, keeps the projection in step
//! with its size, and turns hover notifications into overlay updates.
//!
//! The state machine never reads a clock. Drivers pass `now_ms` into every
//! time-dependent call and arm a single timer at [`Synchronizer::next_wakeup`].

use crate::host::{InfoUpdate, OverlayUpdate, SurfaceHost};
use crate::path::render_path;
use crate::projection::Projection;
use crate::registry::{RegionRecord, Registry};
use crate::schedule::{Debouncer, RetryOutcome, RetrySchedule};
use crate::topology::{GeometryCache, TopologyDocument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    AwaitingSurface,
    AwaitingHoverTarget { retries_remaining: u32 },
    /// Subscribed and serving hover/resize events.
    Ready,
    /// Discovery gave up. Permanent for the page's lifetime.
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    pub surface_poll_ms: f64,
    /// Surface polls allowed after the first one.
    pub surface_max_retries: u32,
    pub hover_target_retry_ms: f64,
    pub hover_target_max_retries: u32,
    /// Quiet period a resize burst must settle for before refitting.
    pub resize_quiet_ms: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            surface_poll_ms: 250.0,
            surface_max_retries: 120,
            hover_target_retry_ms: 500.0,
            hover_target_max_retries: 20,
            resize_quiet_ms: 200.0,
        }
    }
}

/// Loaded data and derived state. Each field is replaced whole, never edited in place.
#[derive(Debug, Default)]
pub struct OverlayContext {
    registry: Option<Registry>,
    geometry: Option<GeometryCache>,
    projection: Option<Projection>,
    highlighted: Option<RegionRecord>,
}

impl OverlayContext {
    pub fn projection(&self) -> Option<Projection> {
        self.projection
    }

    /// Region whose outline is currently shown.
    pub fn highlighted(&self) -> Option<&RegionRecord> {
        self.highlighted.as_ref()
    }

    /// Outline for a region under the current projection; `None` while no
    /// projection exists. Regions without geometry render as an empty path.
    pub fn outline(&self, region_key: &str) -> Option<String> {
        let projection = self.projection?;
        let rings = self
            .geometry
            .as_ref()
            .map(|g| g.rings(region_key))
            .unwrap_or_default();
        Some(render_path(&projection, rings))
    }
}

pub struct Synchronizer<H> {
    host: H,
    config: SyncConfig,
    state: SyncState,
    context: OverlayContext,
    discovery: RetrySchedule,
    resize: Debouncer,
}

impl<H: SurfaceHost> Synchronizer<H> {
    /// Start in [`SyncState::AwaitingSurface`] with the first surface poll due at `now_ms`.
    pub fn new(host: H, config: SyncConfig, now_ms: f64) -> Self {
        let discovery =
            RetrySchedule::start(config.surface_poll_ms, config.surface_max_retries, now_ms);
        let resize = Debouncer::new(config.resize_quiet_ms);
        Self {
            host,
            config,
            state: SyncState::AwaitingSurface,
            context: OverlayContext::default(),
            discovery,
            resize,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn context(&self) -> &OverlayContext {
        &self.context
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Earliest time [`Synchronizer::tick`] has work to do.
    pub fn next_wakeup(&self) -> Option<f64> {
        match (self.discovery.next_at(), self.resize.deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Run whatever is due: a discovery attempt and/or a settled resize.
    pub fn tick(&mut self, now_ms: f64) {
        if self.discovery.is_due(now_ms) {
            match self.state {
                SyncState::AwaitingSurface => self.poll_surface(now_ms),
                SyncState::AwaitingHoverTarget { .. } => self.poll_hover_target(now_ms),
                SyncState::Ready | SyncState::Failed => self.discovery.stop(),
            }
        }
        if self.state == SyncState::Ready && self.resize.fire_if_due(now_ms) {
            self.refit();
        }
    }

    fn poll_surface(&mut self, now_ms: f64) {
        if self.host.is_ready() {
            let retries = self.config.hover_target_max_retries;
            tracing::info!(retries, "map surface ready; locating hover target");
            self.discovery =
                RetrySchedule::start(self.config.hover_target_retry_ms, retries, now_ms);
            self.state = SyncState::AwaitingHoverTarget {
                retries_remaining: retries,
            };
            self.poll_hover_target(now_ms);
            return;
        }

        match self.discovery.failed(now_ms) {
            RetryOutcome::Retry { remaining } => {
                tracing::debug!(remaining, "map surface not ready yet");
            }
            RetryOutcome::Exhausted => self.fail("surface"),
        }
    }

    fn poll_hover_target(&mut self, now_ms: f64) {
        if self.host.locate_hover_target() {
            self.enter_ready();
            return;
        }

        match self.discovery.failed(now_ms) {
            RetryOutcome::Retry { remaining } => {
                tracing::debug!(remaining, "hover target not found yet");
                self.state = SyncState::AwaitingHoverTarget {
                    retries_remaining: remaining,
                };
            }
            RetryOutcome::Exhausted => self.fail("hover target"),
        }
    }

    fn enter_ready(&mut self) {
        self.state = SyncState::Ready;
        self.discovery.stop();
        self.host.subscribe_to_resize();
        self.host.subscribe_to_hover_change();
        tracing::info!("overlay attached to map surface");
        self.refit();
    }

    fn fail(&mut self, stage: &'static str) {
        self.state = SyncState::Failed;
        self.discovery.stop();
        self.resize.cancel();
        tracing::error!(stage, "host discovery exhausted; overlay disabled for this page");
    }

    /// Resize notification from the drawable area. Refits once the burst settles.
    pub fn on_resize(&mut self, now_ms: f64) {
        if self.state != SyncState::Ready {
            return;
        }
        self.resize.signal(now_ms);
    }

    /// Hover notification changed: highlight whatever it names now.
    pub fn on_hover_change(&mut self) {
        if self.state != SyncState::Ready {
            return;
        }
        let Some(label) = self.host.hover_label() else {
            tracing::debug!("hover notification carries no label");
            return;
        };
        self.highlight(&label);
    }

    /// Highlight a region picked by name outside the host (e.g. a search box).
    pub fn select(&mut self, name: &str) {
        if self.state != SyncState::Ready {
            tracing::info!(name, "surface not ready; selection ignored");
            return;
        }
        self.highlight(name);
    }

    /// Blank the outline and the info display together.
    pub fn clear(&mut self) {
        if self.state != SyncState::Ready {
            return;
        }
        self.host.present(OverlayUpdate::clear());
        self.context.highlighted = None;
    }

    pub fn load_registry(&mut self, registry: Registry) {
        tracing::info!(regions = registry.len(), "registry available");
        self.context.registry = Some(registry);
        // The pointer may already be resting on a region.
        self.on_hover_change();
    }

    pub fn load_topology(&mut self, document: &TopologyDocument) {
        let cache = GeometryCache::build(document);
        tracing::info!(regions = cache.len(), "geometry cache built");
        self.context.geometry = Some(cache);
        if self.state == SyncState::Ready {
            self.refit();
        }
    }

    /// Registry records starting with `prefix`; empty until the registry loads.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<&RegionRecord> {
        self.context
            .registry
            .as_ref()
            .map(|r| r.suggest(prefix, limit))
            .unwrap_or_default()
    }

    fn highlight(&mut self, label: &str) {
        let label = label.trim();
        if label.is_empty() {
            return;
        }
        let Some(registry) = self.context.registry.as_ref() else {
            tracing::info!(label, "registry not loaded yet; hover ignored");
            return;
        };
        let Some(record) = registry.lookup(label).cloned() else {
            tracing::info!(label, "no registry entry for hovered label");
            return;
        };

        if let Some(geometry) = self.context.geometry.as_ref()
            && !geometry.contains(&record.region_key)
        {
            tracing::info!(key = %record.region_key, "region has no geometry");
        }

        let path = self.context.outline(&record.region_key);
        self.host.present(OverlayUpdate {
            path: path.as_deref(),
            info: InfoUpdate::Show(&record),
        });
        self.context.highlighted = Some(record);
    }

    fn refit(&mut self) {
        let bbox = self
            .context
            .geometry
            .as_ref()
            .and_then(GeometryCache::bounding_box);
        let projection = Projection::fit_to(bbox, self.host.drawable_dimensions());
        self.context.projection = projection;

        match projection {
            Some(p) => {
                tracing::debug!(
                    scale = p.scale,
                    translate_x = p.translate_x,
                    translate_y = p.translate_y,
                    "projection fitted"
                );
                self.redraw_highlight();
            }
            None => {
                tracing::debug!("projection inputs incomplete; outline paused");
                // An outline from the old projection must not outlive it.
                if self.context.highlighted.is_some() {
                    self.host.present(OverlayUpdate {
                        path: Some(""),
                        info: InfoUpdate::Unchanged,
                    });
                }
            }
        }
    }

    fn redraw_highlight(&mut self) {
        let Some(record) = self.context.highlighted.as_ref() else {
            return;
        };
        let Some(path) = self.context.outline(&record.region_key) else {
            return;
        };
        self.host.present(OverlayUpdate {
            path: Some(&path),
            info: InfoUpdate::Unchanged,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::topology::{BoundingBox, RegionGeometry};

    #[derive(Debug, Clone, PartialEq)]
    enum Info {
        Unchanged,
        Show(String),
        Clear,
    }

    /// Host double: becomes ready / exposes its hover target after a set
    /// number of polls, and records every update it is asked to present.
    #[derive(Default)]
    struct FakeHost {
        ready_after: Option<u32>,
        target_after: Option<u32>,
        ready_polls: u32,
        target_polls: u32,
        dimensions: Option<(f64, f64)>,
        label: Option<String>,
        resize_subscriptions: u32,
        hover_subscriptions: u32,
        updates: Vec<(Option<String>, Info)>,
    }

    impl FakeHost {
        fn attached() -> Self {
            Self {
                ready_after: Some(0),
                target_after: Some(0),
                dimensions: Some((200.0, 200.0)),
                ..Self::default()
            }
        }
    }

    impl SurfaceHost for FakeHost {
        fn is_ready(&mut self) -> bool {
            self.ready_polls += 1;
            self.ready_after.is_some_and(|n| self.ready_polls > n)
        }

        fn locate_hover_target(&mut self) -> bool {
            self.target_polls += 1;
            self.target_after.is_some_and(|n| self.target_polls > n)
        }

        fn drawable_dimensions(&self) -> Option<(f64, f64)> {
            self.dimensions
        }

        fn subscribe_to_resize(&mut self) {
            self.resize_subscriptions += 1;
        }

        fn subscribe_to_hover_change(&mut self) {
            self.hover_subscriptions += 1;
        }

        fn hover_label(&self) -> Option<String> {
            self.label.clone()
        }

        fn present(&mut self, update: OverlayUpdate<'_>) {
            let info = match update.info {
                InfoUpdate::Unchanged => Info::Unchanged,
                InfoUpdate::Show(record) => Info::Show(record.display_name.clone()),
                InfoUpdate::Clear => Info::Clear,
            };
            self.updates.push((update.path.map(str::to_string), info));
        }
    }

    fn config() -> SyncConfig {
        SyncConfig {
            surface_poll_ms: 100.0,
            surface_max_retries: 3,
            hover_target_retry_ms: 50.0,
            hover_target_max_retries: 2,
            resize_quiet_ms: 200.0,
        }
    }

    fn registry() -> Registry {
        Registry::parse(
            "name;key;tooltip\nBayern;09;Freistaat\nHamburg;02;Hansestadt\nAtlantis;99;Lost\n",
            ';',
        )
    }

    /// bbox [0,0,100,50]; "09" is a 10x10 square at (10,10), "02" at (60,20).
    fn topology() -> TopologyDocument {
        let square = |x: f64, y: f64| vec![[x, y], [x + 10.0, y], [x + 10.0, y + 10.0], [x, y + 10.0], [x, y]];
        let mut regions = HashMap::new();
        regions.insert("09".to_string(), RegionGeometry::Polygon(vec![vec![0]]));
        regions.insert("02".to_string(), RegionGeometry::Polygon(vec![vec![1]]));
        TopologyDocument::new(
            Some(BoundingBox::new(0.0, 0.0, 100.0, 50.0)),
            vec![square(10.0, 10.0), square(60.0, 20.0)],
            regions,
        )
        .unwrap()
    }

    /// Synchronizer that reached Ready at t=0 with all data loaded.
    fn ready() -> Synchronizer<FakeHost> {
        let mut sync = Synchronizer::new(FakeHost::attached(), config(), 0.0);
        sync.load_registry(registry());
        sync.load_topology(&topology());
        sync.tick(0.0);
        assert_eq!(sync.state(), SyncState::Ready);
        sync
    }

    #[test]
    fn waits_for_surface_then_target() {
        let host = FakeHost {
            ready_after: Some(2),
            target_after: Some(1),
            ..FakeHost::attached()
        };
        let mut sync = Synchronizer::new(host, config(), 0.0);
        assert_eq!(sync.next_wakeup(), Some(0.0));

        sync.tick(0.0);
        assert_eq!(sync.state(), SyncState::AwaitingSurface);
        assert_eq!(sync.next_wakeup(), Some(100.0));

        sync.tick(50.0);
        assert_eq!(sync.host().ready_polls, 1, "not due yet");

        sync.tick(100.0);
        sync.tick(200.0);
        assert_eq!(
            sync.state(),
            SyncState::AwaitingHoverTarget {
                retries_remaining: 1
            }
        );
        assert_eq!(sync.next_wakeup(), Some(250.0));

        sync.tick(250.0);
        assert_eq!(sync.state(), SyncState::Ready);
        assert_eq!(sync.next_wakeup(), None);
        assert_eq!(sync.host().resize_subscriptions, 1);
        assert_eq!(sync.host().hover_subscriptions, 1);
    }

    #[test]
    fn hover_target_exhaustion_is_permanent() {
        let host = FakeHost {
            target_after: None,
            ..FakeHost::attached()
        };
        let mut sync = Synchronizer::new(host, config(), 0.0);
        sync.load_registry(registry());
        sync.load_topology(&topology());

        let mut now = 0.0;
        while let Some(at) = sync.next_wakeup() {
            now = at;
            sync.tick(now);
        }
        assert_eq!(sync.state(), SyncState::Failed);
        // first attempt + 2 retries
        assert_eq!(sync.host().target_polls, 3);
        assert_eq!(now, 100.0);

        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        sync.on_resize(now);
        sync.tick(now + 10_000.0);
        assert!(sync.host().updates.is_empty());
        assert_eq!(sync.next_wakeup(), None);
        assert_eq!(sync.host().target_polls, 3);
        assert_eq!(sync.host().hover_subscriptions, 0);
    }

    #[test]
    fn surface_exhaustion_fails() {
        let host = FakeHost {
            ready_after: None,
            ..FakeHost::attached()
        };
        let mut sync = Synchronizer::new(host, config(), 0.0);
        for t in [0.0, 100.0, 200.0, 300.0] {
            sync.tick(t);
        }
        assert_eq!(sync.state(), SyncState::Failed);
        assert_eq!(sync.host().ready_polls, 4);
        assert_eq!(sync.host().target_polls, 0);
        assert_eq!(sync.next_wakeup(), None);
    }

    #[test]
    fn hover_on_known_region_updates_info_and_outline() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();

        let expected = sync.context().outline("09").unwrap();
        assert_eq!(expected, "M20,70L40,70L40,90L20,90Z");
        assert_eq!(
            sync.host().updates,
            vec![(Some(expected), Info::Show("Bayern".into()))]
        );
        assert_eq!(
            sync.context().highlighted().map(|r| r.region_key.as_str()),
            Some("09")
        );
    }

    #[test]
    fn hover_label_case_and_whitespace_do_not_matter() {
        let mut sync = ready();
        sync.host_mut().label = Some("  HAMBURG ".into());
        sync.on_hover_change();
        assert_eq!(sync.host().updates.len(), 1);
        assert_eq!(sync.host().updates[0].1, Info::Show("Hamburg".into()));
    }

    #[test]
    fn unknown_label_leaves_overlay_alone() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        sync.host_mut().label = Some("Narnia".into());
        sync.on_hover_change();
        assert_eq!(sync.host().updates.len(), 1);
        assert_eq!(
            sync.context().highlighted().map(|r| r.display_name.as_str()),
            Some("Bayern")
        );
    }

    #[test]
    fn region_without_geometry_clears_outline() {
        let mut sync = ready();
        sync.host_mut().label = Some("Atlantis".into());
        sync.on_hover_change();
        assert_eq!(
            sync.host().updates,
            vec![(Some(String::new()), Info::Show("Atlantis".into()))]
        );
    }

    #[test]
    fn repeated_hover_is_idempotent() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        sync.on_hover_change();
        let updates = &sync.host().updates;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0], updates[1]);
    }

    #[test]
    fn resize_burst_refits_once_and_redraws_highlight() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        let before = sync.context().projection();

        sync.host_mut().dimensions = Some((400.0, 400.0));
        for t in [1000.0, 1050.0, 1100.0] {
            sync.on_resize(t);
            sync.tick(t);
        }
        assert_eq!(sync.context().projection(), before, "never refit mid-resize");
        assert_eq!(sync.next_wakeup(), Some(1300.0));

        sync.tick(1300.0);
        let after = sync.context().projection().unwrap();
        assert_eq!(after.scale, 4.0);
        assert_eq!(sync.next_wakeup(), None);

        let updates = &sync.host().updates;
        assert_eq!(updates.len(), 2);
        assert_eq!(
            updates[1],
            (Some("M40,140L80,140L80,180L40,180Z".to_string()), Info::Unchanged)
        );
    }

    #[test]
    fn resize_before_ready_is_ignored() {
        let mut sync = Synchronizer::new(FakeHost::default(), config(), 0.0);
        sync.on_resize(0.0);
        assert_eq!(sync.next_wakeup(), Some(0.0));
        sync.tick(0.0);
        assert_eq!(sync.next_wakeup(), Some(100.0));
    }

    #[test]
    fn clear_blanks_overlay_and_info_together() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        sync.clear();
        assert_eq!(
            sync.host().updates.last(),
            Some(&(Some(String::new()), Info::Clear))
        );
        assert!(sync.context().highlighted().is_none());
    }

    #[test]
    fn topology_arriving_late_draws_pending_highlight() {
        let mut sync = Synchronizer::new(FakeHost::attached(), config(), 0.0);
        sync.load_registry(registry());
        sync.tick(0.0);
        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync.context().projection().is_none());

        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        assert_eq!(
            sync.host().updates,
            vec![(None, Info::Show("Bayern".into()))]
        );

        sync.load_topology(&topology());
        assert!(sync.context().projection().is_some());
        assert_eq!(
            sync.host().updates.last(),
            Some(&(
                Some("M20,70L40,70L40,90L20,90Z".to_string()),
                Info::Unchanged
            ))
        );
    }

    #[test]
    fn registry_arriving_late_resolves_current_hover() {
        let mut sync = Synchronizer::new(FakeHost::attached(), config(), 0.0);
        sync.load_topology(&topology());
        sync.tick(0.0);
        sync.host_mut().label = Some("Hamburg".into());
        sync.on_hover_change();
        assert!(sync.host().updates.is_empty());

        sync.load_registry(registry());
        assert_eq!(sync.host().updates.len(), 1);
        assert_eq!(sync.host().updates[0].1, Info::Show("Hamburg".into()));
    }

    #[test]
    fn missing_dimensions_pause_outline_until_resize() {
        let host = FakeHost {
            dimensions: None,
            ..FakeHost::attached()
        };
        let mut sync = Synchronizer::new(host, config(), 0.0);
        sync.load_registry(registry());
        sync.load_topology(&topology());
        sync.tick(0.0);
        assert!(sync.context().projection().is_none());

        sync.host_mut().dimensions = Some((200.0, 200.0));
        sync.on_resize(10.0);
        sync.tick(210.0);
        assert!(sync.context().projection().is_some());
    }

    #[test]
    fn lost_projection_blanks_outline_before_next_hover() {
        let mut sync = ready();
        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();

        sync.host_mut().dimensions = None;
        sync.on_resize(1000.0);
        sync.tick(1200.0);
        assert!(sync.context().projection().is_none());

        sync.host_mut().label = Some("Hamburg".into());
        sync.on_hover_change();
        assert_eq!(
            sync.host().updates,
            vec![
                (
                    Some("M20,70L40,70L40,90L20,90Z".to_string()),
                    Info::Show("Bayern".into())
                ),
                (Some(String::new()), Info::Unchanged),
                (None, Info::Show("Hamburg".into())),
            ]
        );
    }

    #[test]
    fn drawable_laid_out_after_ready_gets_outline_on_resize() {
        let host = FakeHost {
            dimensions: Some((0.0, 0.0)),
            ..FakeHost::attached()
        };
        let mut sync = Synchronizer::new(host, config(), 0.0);
        sync.load_registry(registry());
        sync.load_topology(&topology());
        sync.tick(0.0);
        assert_eq!(sync.state(), SyncState::Ready);
        assert!(sync.context().projection().is_none());

        sync.host_mut().label = Some("Bayern".into());
        sync.on_hover_change();
        assert_eq!(sync.host().updates.last(), Some(&(None, Info::Show("Bayern".into()))));

        // The drawable's own size notification, with no window resize involved.
        sync.host_mut().dimensions = Some((200.0, 200.0));
        sync.on_resize(500.0);
        sync.tick(700.0);
        assert_eq!(
            sync.host().updates.last(),
            Some(&(
                Some("M20,70L40,70L40,90L20,90Z".to_string()),
                Info::Unchanged
            ))
        );
    }

    #[test]
    fn select_and_suggest_use_registry() {
        let mut sync = ready();
        let names: Vec<&str> = sync
            .suggest("ha", 5)
            .into_iter()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(names, ["Hamburg"]);

        sync.select("hamburg");
        assert_eq!(sync.host().updates[0].1, Info::Show("Hamburg".into()));
    }
}
