// ABOUTME: Apply command implementation.
// ABOUTME: Reconciles the declared set from the config file against recorded state.

use super::{connect_engine, emit_warnings};
use productionapp::config::Config;
use productionapp::diagnostics::Diagnostics;
use productionapp::engine::{Outcome, plan_apply};
use productionapp::error::{Error, Result};
use productionapp::output::Output;
use productionapp::resource::Action;
use productionapp::store::FileStateStore;

pub async fn apply(config: &Config, dry_run: bool, force: bool, mut output: Output) -> Result<()> {
    let declared = config.declared()?;

    output.start_timer();
    output.progress(&format!(
        "{} {} declared deployment(s)",
        if dry_run { "Planning" } else { "Applying" },
        declared.len()
    ));

    let report = if dry_run {
        // Planning reads recorded state only; no platform is needed.
        let store = FileStateStore::new(config.state_dir()?);
        plan_apply(&store, &declared).await?
    } else {
        let engine = connect_engine(config, force, &output).await?;
        let mut diag = Diagnostics::default();
        let report = engine.apply(&declared, false, &mut diag).await;
        emit_warnings(&diag, &output);
        report?
    };

    for outcome in &report.outcomes {
        output.result(&describe(outcome, dry_run), outcome);
    }
    for (name, error) in &report.failures {
        output.error(&format!("{}: {}", name, error));
    }

    if !report.is_success() {
        let total = report.outcomes.len() + report.failures.len();
        return Err(Error::ApplyFailed(report.failures.len(), total));
    }

    let changed = report
        .outcomes
        .iter()
        .filter(|o| o.action != Action::NoOp)
        .count();
    if dry_run {
        output.success(&format!("{} change(s) planned", changed));
    } else {
        output.success(&format!("{} change(s) applied", changed));
    }
    Ok(())
}

fn describe(outcome: &Outcome, dry_run: bool) -> String {
    let url = outcome
        .state
        .as_ref()
        .map(|s| s.url.as_str())
        .unwrap_or("-");
    let action = if dry_run {
        format!("would {}", outcome.action)
    } else {
        outcome.action.to_string()
    };
    match outcome.action {
        Action::Delete => format!("{:<24} {}", outcome.name.as_str(), action),
        _ => format!("{:<24} {:<16} {}", outcome.name.as_str(), action, url),
    }
}
