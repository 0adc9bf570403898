// ABOUTME: Init command implementation.
// ABOUTME: Writes a productionapp.yml template into the current directory.

use productionapp::config;
use productionapp::error::Result;
use productionapp::output::Output;
use std::path::Path;

pub fn init(
    dir: &Path,
    name: Option<&str>,
    image: Option<&str>,
    force: bool,
    output: Output,
) -> Result<()> {
    let path = config::init_config(dir, name, image, force)?;
    output.success(&format!("Created {}", path.display()));
    Ok(())
}
