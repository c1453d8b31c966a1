pub mod input;
pub mod viewer;

pub use viewer::run_viewer;
