//! I/O services around the engines

pub mod format;
pub mod io;

pub use format::OutputFormatHandler;
pub use io::ImageIOService;
