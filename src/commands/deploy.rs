// ABOUTME: Deploy command implementation.
// ABOUTME: Creates or updates one deployment and prints its URL.

use super::{connect_engine, emit_warnings};
use productionapp::config::Config;
use productionapp::diagnostics::Diagnostics;
use productionapp::engine::EngineError;
use productionapp::error::Result;
use productionapp::names;
use productionapp::output::Output;
use productionapp::resource::{Action, DeploymentArgs, DeploymentSpec, DeploymentState};
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Serialize)]
struct Deployed<'a> {
    name: &'a str,
    action: Action,
    outputs: Map<String, Value>,
    state: &'a DeploymentState,
}

pub async fn deploy(
    config: &Config,
    image: String,
    port: i64,
    name: Option<String>,
    force: bool,
    mut output: Output,
) -> Result<()> {
    let name = name.unwrap_or_else(names::generate);

    // Validate before touching the platform
    let spec = DeploymentSpec::from_args(&name, &DeploymentArgs::new(image, port))
        .map_err(EngineError::from)?;

    output.start_timer();
    output.progress(&format!(
        "Deploying {} ({}, port {})",
        spec.name(),
        spec.image(),
        spec.port()
    ));

    let engine = connect_engine(config, force, &output).await?;
    let mut diag = Diagnostics::default();
    let result = engine.up_spec(&spec, &mut diag).await;
    emit_warnings(&diag, &output);
    let outcome = result?;

    let Some(ref state) = outcome.state else {
        return Ok(());
    };

    let message = match outcome.action {
        Action::NoOp => format!("  ✓ {} is up to date", spec.name()),
        Action::Create => format!("  ✓ Created {}", spec.name()),
        Action::Update => format!("  ✓ Updated {}", spec.name()),
        Action::Delete => format!("  ✓ Removed {}", spec.name()),
    };
    output.progress(&message);

    output.result(
        &state.url,
        &Deployed {
            name: spec.name().as_str(),
            action: outcome.action,
            outputs: state.to_properties(),
            state,
        },
    );
    Ok(())
}
