pub mod cell;
pub mod compositor;
pub mod display;
pub mod layout;
pub mod mapper;
pub mod processor;
pub mod status;

pub use compositor::{DisplayCompositor, RenderOutput};
pub use display::DisplayManager;
pub use layout::{DrawRect, LayoutPolicy, Viewport};
pub use processor::FrameProcessor;
pub use status::{PixelReadout, StatusReport};
