//! Suite configuration loading.
//!
//! Every suite reads a small JSON file, `config.json`, from the working
//! directory. Values can be overridden through `CREDHUB_ACCEPTANCE_*`
//! environment variables. A missing or malformed file is fatal: there is no
//! built-in default for the service under test.

use crate::errors::{HarnessError, Result};
use crate::process::BuildTarget;
use config::{Config, Environment, File, FileFormat};
use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use validator::Validate;

/// File name of the suite config, resolved against the working directory.
pub const CONFIG_FILE_NAME: &str = "config.json";

/// Prefix for environment variable overrides, e.g. `CREDHUB_ACCEPTANCE_API_URL`.
pub const ENV_PREFIX: &str = "CREDHUB_ACCEPTANCE";

/// Program looked up on `PATH` when the config names no CLI binary.
pub const DEFAULT_CLI_PROGRAM: &str = "credhub";

fn default_username() -> String {
    "credhub_cli".to_string()
}

fn default_password() -> String {
    "credhub_cli_password".to_string()
}

/// Immutable configuration shared by every test in a suite.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder, Validate)]
#[builder(setter(into))]
pub struct TestConfig {
    /// Base URL of the credential service API.
    #[validate(url)]
    pub api_url: String,

    /// Directory holding the server-side credential material (the server CA).
    #[serde(default)]
    #[builder(default)]
    pub credential_root: Option<PathBuf>,

    /// User for `login` in the CLI suite.
    #[serde(default = "default_username")]
    #[builder(default = "default_username()")]
    pub username: String,

    #[serde(default = "default_password")]
    #[builder(default = "default_password()")]
    pub password: String,

    /// UAA client used by the API client suite.
    #[serde(default)]
    #[builder(default)]
    pub client_name: Option<String>,

    #[serde(default)]
    #[builder(default)]
    pub client_secret: Option<String>,

    /// Prebuilt CLI program: a path, or a name looked up on `PATH`.
    #[serde(default)]
    #[builder(default)]
    pub cli_binary: Option<String>,

    /// Command that builds the CLI; `{output}` is replaced with the artifact path.
    #[serde(default)]
    #[builder(default)]
    pub cli_build: Option<String>,

    /// Directory with client certificate fixtures. Defaults to `<working dir>/certs`.
    #[serde(default)]
    #[builder(default)]
    pub certs_dir: Option<PathBuf>,
}

impl TestConfig {
    /// Load `config.json` from the working directory.
    pub fn load() -> Result<Self> {
        let path = working_dir()?.join(CONFIG_FILE_NAME);
        Self::load_from(&path)
    }

    /// Load configuration from a file path, applying environment overrides.
    pub fn load_from(path: &Path) -> Result<Self> {
        ConfigLoader::new(path).load()
    }

    /// Load configuration from a JSON string. Environment overrides are not applied.
    pub fn load_from_str(json: &str) -> Result<Self> {
        let config: TestConfig = Config::builder()
            .add_source(File::from_str(json, FileFormat::Json))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// The credential root, required by suites that read the server CA.
    pub fn credential_root(&self) -> Result<&Path> {
        self.credential_root.as_deref().ok_or_else(|| {
            HarnessError::ConfigMalformed("credential_root is not set".to_string())
        })
    }

    /// Directory holding client certificate fixtures.
    pub fn certs_dir(&self) -> Result<PathBuf> {
        match &self.certs_dir {
            Some(dir) => Ok(dir.clone()),
            None => Ok(working_dir()?.join("certs")),
        }
    }

    /// How the CLI under test is obtained.
    pub fn build_target(&self) -> BuildTarget {
        match (&self.cli_build, &self.cli_binary) {
            (Some(command), _) => BuildTarget::Command {
                command: command.clone(),
                artifact: DEFAULT_CLI_PROGRAM.to_string(),
            },
            (None, Some(program)) => BuildTarget::Prebuilt(program.clone()),
            (None, None) => BuildTarget::Prebuilt(DEFAULT_CLI_PROGRAM.to_string()),
        }
    }

    /// Join a path onto the API base URL without doubling slashes.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Layered loader: JSON file first, then environment overrides.
pub struct ConfigLoader {
    path: PathBuf,
    env: Option<HashMap<String, String>>,
}

impl ConfigLoader {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            env: None,
        }
    }

    /// Use an explicit variable map instead of the process environment.
    pub fn with_env(mut self, vars: HashMap<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    pub fn load(self) -> Result<TestConfig> {
        debug!("Loading config from: {}", self.path.display());

        if !self.path.is_file() {
            return Err(HarnessError::ConfigMissing(self.path));
        }

        let environment = Environment::with_prefix(ENV_PREFIX).source(self.env);
        let config: TestConfig = Config::builder()
            .add_source(File::from(self.path.as_path()).format(FileFormat::Json))
            .add_source(environment)
            .build()
            .map_err(|e| {
                HarnessError::ConfigMalformed(format!("{}: {}", self.path.display(), e))
            })?
            .try_deserialize()
            .map_err(|e| {
                HarnessError::ConfigMalformed(format!("{}: {}", self.path.display(), e))
            })?;

        config.validate()?;
        trace!("{:?}", config);
        Ok(config)
    }
}

/// Directory fixture paths are resolved against.
///
/// Uses the process working directory; `PWD` is consulted only when that is
/// unavailable.
pub fn working_dir() -> Result<PathBuf> {
    match std::env::current_dir() {
        Ok(dir) => Ok(dir),
        Err(err) => match std::env::var_os("PWD") {
            Some(pwd) if !pwd.is_empty() => Ok(PathBuf::from(pwd)),
            _ => Err(HarnessError::Io(err)),
        },
    }
}
