// ABOUTME: Configuration types and parsing for productionapp.yml.
// ABOUTME: Platform selection, state directory, and the declared set of deployments.

mod init;

pub use init::init_config;

use crate::error::{Error, Result};
use crate::platform::PlatformConfig;
use crate::resource::{DeploymentArgs, DeploymentSpec};
use crate::store::FileStateStore;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

pub const CONFIG_FILENAME: &str = "productionapp.yml";
pub const CONFIG_FILENAME_ALT: &str = "productionapp.yaml";
pub const CONFIG_FILENAME_DIR: &str = ".productionapp/config.yml";

/// Port used when neither the command line nor the config names one.
pub const DEFAULT_PORT: i64 = 80;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub platform: PlatformConfig,

    /// Where state records and lock files live.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// The declared set reconciled by `apply`.
    #[serde(default)]
    pub deployments: Vec<DeclaredDeployment>,
}

/// One entry of the `deployments:` list, unvalidated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDeployment {
    pub name: String,
    pub image: String,
    #[serde(default = "default_port")]
    pub port: i64,
}

fn default_port() -> i64 {
    DEFAULT_PORT
}

impl DeclaredDeployment {
    pub fn args(&self) -> DeploymentArgs {
        DeploymentArgs::new(self.image.clone(), self.port)
    }
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(Error::from)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn discover(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Err(Error::ConfigNotFound(dir.to_path_buf())),
        }
    }

    /// Like [`Config::discover`], but a missing file yields the defaults.
    pub fn discover_or_default(dir: &Path) -> Result<Self> {
        match Self::find(dir) {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    fn find(dir: &Path) -> Option<PathBuf> {
        [
            dir.join(CONFIG_FILENAME),
            dir.join(CONFIG_FILENAME_ALT),
            dir.join(CONFIG_FILENAME_DIR),
        ]
        .into_iter()
        .find(|path| path.exists())
    }

    /// Resolved state directory, `~` expanded.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match self.state_dir {
            Some(ref dir) => Ok(expand_home(dir)),
            None => FileStateStore::default_dir().map_err(Error::from),
        }
    }

    /// Validate the declared set.
    ///
    /// Every entry must be valid and names must be unique.
    pub fn declared(&self) -> Result<Vec<DeploymentSpec>> {
        let mut seen = HashSet::new();
        let mut specs = Vec::with_capacity(self.deployments.len());

        for entry in &self.deployments {
            let spec = DeploymentSpec::from_args(&entry.name, &entry.args()).map_err(|e| {
                Error::InvalidConfig(format!("deployment {:?}: {}", entry.name, e))
            })?;
            if !seen.insert(spec.name().clone()) {
                return Err(Error::InvalidConfig(format!(
                    "deployment {} is declared more than once",
                    spec.name()
                )));
            }
            specs.push(spec);
        }

        Ok(specs)
    }
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let mut components = path.components();
    match components.next() {
        Some(Component::Normal(first)) if first == "~" => match dirs::home_dir() {
            Some(home) => home.join(components.as_path()),
            None => path.to_path_buf(),
        },
        _ => path.to_path_buf(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformKind;
    use std::time::Duration;

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert_eq!(config.platform.kind, PlatformKind::Docker);
        assert_eq!(config.platform.host, "localhost");
        assert!(config.deployments.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let config = Config::from_yaml(
            r#"
platform:
  kind: kubernetes
  replicas: 2
  url_timeout: 90s
state_dir: /var/lib/productionapp
deployments:
  - name: example
    image: gcr.io/kuar-demo/kuard-amd64:blue
  - name: api
    image: nginx
    port: 8080
"#,
        )
        .unwrap();

        assert_eq!(config.platform.kind, PlatformKind::Kubernetes);
        assert_eq!(config.platform.replicas, 2);
        assert_eq!(config.platform.url_timeout, Duration::from_secs(90));
        assert_eq!(config.state_dir().unwrap(), PathBuf::from("/var/lib/productionapp"));
        assert_eq!(config.deployments[0].port, 80);
        assert_eq!(config.deployments[1].port, 8080);
        assert_eq!(config.declared().unwrap().len(), 2);
    }

    #[test]
    fn declared_rejects_duplicates_and_bad_ports() {
        let config = Config::from_yaml(
            "deployments:\n  - {name: web, image: nginx}\n  - {name: web, image: httpd}\n",
        )
        .unwrap();
        assert!(matches!(config.declared(), Err(Error::InvalidConfig(_))));

        let config =
            Config::from_yaml("deployments:\n  - {name: web, image: nginx, port: 0}\n").unwrap();
        let err = config.declared().unwrap_err();
        assert!(err.to_string().contains("web"));
    }

    #[test]
    fn expand_home_only_touches_leading_tilde() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand_home(Path::new("~/.kube/config")), home.join(".kube/config"));
        assert_eq!(expand_home(Path::new("/etc/x")), PathBuf::from("/etc/x"));
        assert_eq!(expand_home(Path::new("a/~/b")), PathBuf::from("a/~/b"));
    }
}
