// ABOUTME: Command module aggregator for the productionapp CLI.
// ABOUTME: Shared setup (engine wiring, warnings) plus one handler per subcommand.

mod apply;
mod deploy;
mod destroy;
mod init;
mod list;
mod schema;
mod status;

pub use apply::apply;
pub use deploy::deploy;
pub use destroy::destroy;
pub use init::init;
pub use list::list;
pub use schema::schema;
pub use status::status;

use productionapp::config::Config;
use productionapp::diagnostics::Diagnostics;
use productionapp::engine::Engine;
use productionapp::error::Result;
use productionapp::output::Output;
use productionapp::platform;
use productionapp::store::FileStateStore;
use std::sync::Arc;

/// Connect to the configured platform and wire up the engine.
///
/// State records and lock files share the state directory.
async fn connect_engine(config: &Config, force: bool, output: &Output) -> Result<Engine> {
    output.progress(&format!("  → Connecting to {}...", config.platform.kind));
    let platform = platform::connect(&config.platform).await?;

    let state_dir = config.state_dir()?;
    let store = FileStateStore::new(&state_dir);

    Ok(Engine::new(platform, Arc::new(store))
        .with_lock_dir(state_dir)
        .with_force(force))
}

fn emit_warnings(diag: &Diagnostics, output: &Output) {
    for warning in diag.warnings() {
        output.warning(&warning.to_string());
    }
}
