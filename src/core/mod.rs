pub mod capture;
pub mod click_port;
pub mod frame;
pub mod frame_buffer;
pub mod frame_source;
pub mod pixel_buffer;
pub mod session;

pub use frame_buffer::FrameRelay;
pub use frame_source::FrameSource;
pub use session::{PointerButton, SessionOptions, ViewerSession};
