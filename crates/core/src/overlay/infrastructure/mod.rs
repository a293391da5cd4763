pub mod bitmap_font;
pub mod snapshot_overlay_renderer;
