/// The host-facing display surface — everything the engine pushes out
/// passes through this trait.
///
/// All methods default to no-ops so hosts implement only what they render.
/// The engine drives the surface in a fixed order per scene: an optional
/// page break, choice removal, content blocks, then the fresh choice list.
use crate::core::signals::SignalRecord;
use crate::schema::content::RenderedBlock;
use crate::schema::state::Choice;

pub trait DisplaySurface {
    /// Rendered content blocks for the current scene, in document order.
    fn display_content(&mut self, _blocks: &[RenderedBlock]) {}

    /// A fresh list of choices the player may pick from.
    fn display_choices(&mut self, _choices: &[Choice]) {}

    /// Withdraw any previously displayed choices.
    fn remove_choices(&mut self) {}

    /// Start a new page before the next content push.
    fn new_page(&mut self) {}

    /// A named lifecycle or quality-change notification.
    fn signal(&mut self, _record: &SignalRecord) {}
}

/// A surface that discards everything. Useful for headless simulation and
/// tests that only inspect state.
pub struct NullDisplay;

impl DisplaySurface for NullDisplay {}
