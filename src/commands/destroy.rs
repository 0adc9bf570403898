// ABOUTME: Destroy command implementation.
// ABOUTME: Tears down one deployment and forgets its state.

use super::{connect_engine, emit_warnings};
use productionapp::config::Config;
use productionapp::diagnostics::Diagnostics;
use productionapp::engine::EngineError;
use productionapp::error::Result;
use productionapp::output::Output;
use productionapp::resource::{Action, ValidationError};
use productionapp::types::DeploymentName;

pub async fn destroy(config: &Config, name: &str, force: bool, mut output: Output) -> Result<()> {
    let name = DeploymentName::new(name)
        .map_err(|e| EngineError::from(ValidationError::from(e)))?;

    output.start_timer();
    output.progress(&format!("Destroying {}", name));

    let engine = connect_engine(config, force, &output).await?;
    let mut diag = Diagnostics::default();
    let result = engine.destroy(name.as_str(), &mut diag).await;
    emit_warnings(&diag, &output);
    let outcome = result?;

    match outcome.action {
        Action::NoOp => output.success(&format!("Nothing to destroy for {}", name)),
        _ => output.success(&format!("Destroyed {}", name)),
    }
    Ok(())
}
