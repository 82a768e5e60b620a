use crate::registry::RegionRecord;

/// What the info display should do as part of an [`OverlayUpdate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfoUpdate<'a> {
    Unchanged,
    Show(&'a RegionRecord),
    Clear,
}

/// One user-visible change: overlay path and info display are applied together.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverlayUpdate<'a> {
    /// New path description for the overlay target. `None` leaves it as is;
    /// an empty string removes the outline.
    pub path: Option<&'a str>,
    pub info: InfoUpdate<'a>,
}

impl OverlayUpdate<'_> {
    pub const fn clear() -> Self {
        Self {
            path: Some(""),
            info: InfoUpdate::Clear,
        }
    }
}

/// Capabilities the synchronizer needs from the vendor-controlled map surface.
pub trait SurfaceHost {
    /// The surface exists and its encapsulated content is attached.
    fn is_ready(&mut self) -> bool;

    /// Find the hover notification element and the overlay target inside the
    /// surface. True only when both were found.
    fn locate_hover_target(&mut self) -> bool;

    /// Current pixel size of the drawable area, if it can be measured.
    fn drawable_dimensions(&self) -> Option<(f64, f64)>;

    /// Start delivering resize notifications for the drawable area.
    fn subscribe_to_resize(&mut self);

    /// Start delivering hover notification changes.
    fn subscribe_to_hover_change(&mut self);

    /// Label of the region the hover notification currently names.
    fn hover_label(&self) -> Option<String>;

    fn present(&mut self, update: OverlayUpdate<'_>);
}
