// ABOUTME: Status command implementation.
// ABOUTME: Shows the recorded state of one deployment next to what the platform reports.

use super::connect_engine;
use productionapp::config::Config;
use productionapp::error::Result;
use productionapp::output::Output;

pub async fn status(config: &Config, name: &str, output: Output) -> Result<()> {
    let engine = connect_engine(config, false, &output).await?;
    let status = engine.status(name).await?;

    let mut lines = vec![format!("Deployment: {}", status.name)];
    match status.state {
        Some(ref state) => {
            lines.push(format!("URL: {}", state.url));
            lines.push(format!("Image: {}", state.applied.image));
            lines.push(format!("Port: {}", state.applied.port));
            lines.push(format!("Workload: {}", state.workload));
            lines.push(format!("Updated: {}", state.updated_at.to_rfc3339()));
        }
        None => lines.push("State: not recorded".to_string()),
    }
    match status.workload {
        Some(ref workload) if workload.running => lines.push("Platform: running".to_string()),
        Some(_) => lines.push("Platform: present, not running".to_string()),
        None => lines.push("Platform: no workload".to_string()),
    }

    output.result(&lines.join("\n"), &status);
    Ok(())
}
