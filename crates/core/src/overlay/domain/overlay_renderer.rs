use crate::overlay::domain::display_mapping::OverlayBox;
use crate::shared::frame::Frame;

/// Draws one tick's overlay. Each call starts from scratch; nothing carries
/// over from the previous tick.
pub trait OverlayRenderer: Send {
    /// Current display size in pixels. May change between ticks.
    fn display_size(&self) -> (f64, f64);

    fn render(
        &mut self,
        frame: &Frame,
        boxes: &[OverlayBox],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
