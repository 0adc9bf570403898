// ABOUTME: Config scaffolding for new projects.
// ABOUTME: Creates a productionapp.yml template file.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::{DeploymentName, ImageRef};

use super::CONFIG_FILENAME;

/// Write a template config into `dir`, returning its path.
pub fn init_config(
    dir: &Path,
    name: Option<&str>,
    image: Option<&str>,
    force: bool,
) -> Result<PathBuf> {
    let config_path = dir.join(CONFIG_FILENAME);

    if config_path.exists() && !force {
        return Err(Error::AlreadyExists(config_path));
    }

    let name = DeploymentName::new(name.unwrap_or("example"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;
    let image = ImageRef::parse(image.unwrap_or("gcr.io/kuar-demo/kuard-amd64:blue"))
        .map_err(|e| Error::InvalidConfig(e.to_string()))?;

    std::fs::write(&config_path, generate_template_yaml(&name, &image))?;
    Ok(config_path)
}

fn generate_template_yaml(name: &DeploymentName, image: &ImageRef) -> String {
    format!(
        r#"platform:
  kind: docker
  # host: localhost
  # socket: /var/run/docker.sock
  # For kind: kubernetes
  # kubeconfig: ~/.kube/config
  # replicas: 3
  # url_timeout: 5m

# state_dir: ~/.local/state/productionapp

deployments:
  - name: {}
    image: {}
    port: 80
"#,
        name, image
    )
}
