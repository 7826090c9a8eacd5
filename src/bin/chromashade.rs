//! chromashade CLI
//!
//! Color removal and shadow correction for image files.

#[cfg(feature = "cli")]
use chromashade::cli;

#[cfg(feature = "cli")]
fn main() -> anyhow::Result<()> {
    cli::main()
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
