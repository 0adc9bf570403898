// ABOUTME: List command implementation.
// ABOUTME: Prints recorded deployments from the state directory; no platform access.

use productionapp::config::Config;
use productionapp::error::Result;
use productionapp::output::Output;
use productionapp::store::{FileStateStore, StateStore};

pub async fn list(config: &Config, output: Output) -> Result<()> {
    let store = FileStateStore::new(config.state_dir()?);
    let states = store.list().await?;

    if states.is_empty() {
        output.progress("No deployments recorded");
    }

    for state in &states {
        output.result(
            &format!(
                "{:<24} {:<40} {}:{}",
                state.name.as_str(), state.url, state.applied.image, state.applied.port
            ),
            state,
        );
    }
    Ok(())
}
