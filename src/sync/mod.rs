pub mod clock;
pub mod rate;
pub mod scheduler;
pub mod vsync;

pub use clock::FrameClock;
pub use rate::RateStats;
pub use scheduler::{DisplayScheduler, ScheduleMode};
pub use vsync::FramePacer;
