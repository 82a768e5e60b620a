pub mod host;
pub mod path;
pub mod projection;
pub mod registry;
pub mod schedule;
pub mod sync;
pub mod topology;

pub use host::{InfoUpdate, OverlayUpdate, SurfaceHost};
pub use path::render_path;
pub use projection::Projection;
pub use registry::{RegionRecord, Registry};
pub use schedule::{Debouncer, RetryOutcome, RetrySchedule};
pub use sync::{OverlayContext, SyncConfig, SyncState, Synchronizer};
pub use topology::*;
