//! Building and running the CLI under test.
//!
//! The binary is produced once per suite by [`SharedBuild`]: the first worker
//! to ask for it runs the build while every other worker blocks on the same
//! cell, and all of them end up with the same [`BuiltBinary`]. Each test then
//! drives the binary through a [`ProcessRunner`], which waits for exit and
//! hands back both output streams and the exit code.

use crate::errors::{HarnessError, Result};
use crate::fixture::FixtureEnvironment;
use crate::traits::CommandRunner;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use tempfile::TempDir;
use tracing::{debug, info, warn};

/// Placeholder in build commands that is replaced with the artifact path.
pub const OUTPUT_PLACEHOLDER: &str = "{output}";

/// Name of the build directory created under a persistent artifacts root.
pub const BUILD_DIR_NAME: &str = "credhub-acceptance-build";

/// How the binary under test is obtained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BuildTarget {
    /// An existing executable: a path, or a program name resolved on `PATH`.
    Prebuilt(String),
    /// A build command that writes the executable to `{output}`.
    Command { command: String, artifact: String },
}

impl std::fmt::Display for BuildTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildTarget::Prebuilt(program) => write!(f, "{program}"),
            BuildTarget::Command { command, .. } => write!(f, "{command}"),
        }
    }
}

#[derive(Debug)]
enum Artifacts {
    Temporary(TempDir),
    /// A fixed directory that outlives the process. The next build in the
    /// same root replaces it.
    Persistent(PathBuf),
}

impl Artifacts {
    fn path(&self) -> &Path {
        match self {
            Artifacts::Temporary(dir) => dir.path(),
            Artifacts::Persistent(dir) => dir,
        }
    }
}

/// The resolved executable, plus the directory it was built into (if any).
#[derive(Debug)]
pub struct BuiltBinary {
    path: PathBuf,
    artifacts: Option<Artifacts>,
}

impl BuiltBinary {
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding build output; `None` for prebuilt binaries.
    #[must_use]
    pub fn artifacts_dir(&self) -> Option<&Path> {
        self.artifacts.as_ref().map(Artifacts::path)
    }
}

/// Resolves or builds a [`BuildTarget`].
pub struct BinaryBuilder;

impl BinaryBuilder {
    pub fn build(target: &BuildTarget) -> Result<BuiltBinary> {
        Self::build_in(target, None)
    }

    /// Like [`BinaryBuilder::build`], but a build command writes into
    /// `<root>/credhub-acceptance-build`, clearing whatever an earlier run
    /// left there.
    pub fn build_in(target: &BuildTarget, root: Option<&Path>) -> Result<BuiltBinary> {
        match target {
            BuildTarget::Prebuilt(program) => Self::resolve(program),
            BuildTarget::Command { command, artifact } => {
                let artifacts = Self::artifacts_dir(command, root)?;
                Self::compile(command, artifact, artifacts)
            }
        }
    }

    fn artifacts_dir(command: &str, root: Option<&Path>) -> Result<Artifacts> {
        let fail = |e: std::io::Error| HarnessError::build(command, e.to_string());
        match root {
            None => tempfile::Builder::new()
                .prefix(BUILD_DIR_NAME)
                .tempdir()
                .map(Artifacts::Temporary)
                .map_err(fail),
            Some(root) => {
                let dir = root.join(BUILD_DIR_NAME);
                if dir.exists() {
                    debug!("Clearing stale build artifacts at {}", dir.display());
                    std::fs::remove_dir_all(&dir).map_err(fail)?;
                }
                std::fs::create_dir_all(&dir).map_err(fail)?;
                Ok(Artifacts::Persistent(dir))
            }
        }
    }

    fn resolve(program: &str) -> Result<BuiltBinary> {
        let candidate = Path::new(program);
        let path = if candidate.components().count() > 1 || candidate.is_absolute() {
            if !candidate.is_file() {
                return Err(HarnessError::build(program, "no such file"));
            }
            candidate.to_path_buf()
        } else {
            which::which(program).map_err(|e| HarnessError::build(program, e.to_string()))?
        };

        info!("Using prebuilt binary {}", path.display());
        Ok(BuiltBinary {
            path,
            artifacts: None,
        })
    }

    fn compile(command: &str, artifact: &str, artifacts: Artifacts) -> Result<BuiltBinary> {
        let output = artifacts
            .path()
            .join(format!("{}{}", artifact, std::env::consts::EXE_SUFFIX));

        let words = shlex::split(command)
            .filter(|words| !words.is_empty())
            .ok_or_else(|| HarnessError::build(command, "cannot split build command"))?;
        let output_str = output.to_string_lossy();
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.replace(OUTPUT_PLACEHOLDER, &output_str))
            .collect();

        info!("Building binary under test: {}", render_command_line(&words));
        let result = Command::new(&words[0])
            .args(&words[1..])
            .stdin(Stdio::null())
            .output()
            .map_err(|e| HarnessError::build(command, e.to_string()))?;

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            return Err(HarnessError::build(
                command,
                format!("{}: {}", result.status, stderr.trim()),
            ));
        }
        if !output.is_file() {
            return Err(HarnessError::build(
                command,
                format!("artifact {} was not produced", output.display()),
            ));
        }

        Ok(BuiltBinary {
            path: output,
            artifacts: Some(artifacts),
        })
    }
}

/// Once-per-suite build shared by every test worker.
///
/// A failed build is remembered, so every worker reports the same error
/// instead of retrying.
pub struct SharedBuild {
    target: BuildTarget,
    artifacts_root: Option<PathBuf>,
    cell: OnceLock<std::result::Result<Arc<BuiltBinary>, String>>,
    torn_down: AtomicBool,
}

impl SharedBuild {
    pub fn new(target: BuildTarget) -> Self {
        Self {
            target,
            artifacts_root: None,
            cell: OnceLock::new(),
            torn_down: AtomicBool::new(false),
        }
    }

    /// Builds under `root` instead of a fresh temporary directory. Use a
    /// directory whose lifetime the test runner owns (such as
    /// `CARGO_TARGET_TMPDIR`) when nothing is certain to call
    /// [`SharedBuild::teardown`].
    pub fn in_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.artifacts_root = Some(root.into());
        self
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// Returns the shared binary, building it on first use.
    pub fn get(&self) -> Result<Arc<BuiltBinary>> {
        if self.torn_down.load(Ordering::SeqCst) {
            return Err(HarnessError::build(
                self.target.to_string(),
                "build artifacts were already torn down",
            ));
        }
        self.cell
            .get_or_init(|| {
                BinaryBuilder::build_in(&self.target, self.artifacts_root.as_deref())
                    .map(Arc::new)
                    .map_err(|e| match e {
                        HarnessError::Build(details) => details,
                        other => other.to_string(),
                    })
            })
            .clone()
            .map_err(HarnessError::Build)
    }

    /// Removes build artifacts. Only the first call does any work.
    pub fn teardown(&self) -> Result<()> {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(Ok(binary)) = self.cell.get() {
            if let Some(dir) = binary.artifacts_dir() {
                info!("Removing build artifacts at {}", dir.display());
                std::fs::remove_dir_all(dir)
                    .map_err(|e| HarnessError::fixture(dir.display().to_string(), e.to_string()))?;
            }
        }
        Ok(())
    }
}

/// Output of one subprocess invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `-1` when the process was terminated by a signal.
    pub exit_code: i32,
}

impl ProcessResult {
    #[must_use]
    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    #[must_use]
    pub fn stderr_str(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawns the binary under test with a fixed set of environment overrides.
#[derive(Clone, Debug)]
pub struct ProcessRunner {
    program: PathBuf,
    envs: BTreeMap<String, String>,
    current_dir: Option<PathBuf>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            envs: BTreeMap::new(),
            current_dir: None,
        }
    }

    pub fn for_binary(binary: &BuiltBinary) -> Self {
        Self::new(binary.path())
    }

    /// Applies the fixture's environment overrides to every spawned process.
    pub fn with_fixture(mut self, fixture: &FixtureEnvironment) -> Self {
        self.envs.extend(
            fixture
                .env_overrides()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.insert(key.into(), value.into());
        self
    }

    pub fn with_current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.current_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Runs the program to completion. A non-zero exit is not an error.
    pub fn run<I, S>(&self, args: I) -> Result<ProcessResult>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();
        let mut line = vec![self.program.to_string_lossy().into_owned()];
        line.extend(args.iter().cloned());
        debug!("Running: {}", render_command_line(&line));

        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .envs(&self.envs)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.current_dir {
            command.current_dir(dir);
        }

        let output = command.output().map_err(|source| HarnessError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let exit_code = output.status.code().unwrap_or_else(|| {
            warn!("{} terminated by signal", self.program.display());
            -1
        });
        debug!("Exited with {}", exit_code);

        Ok(ProcessResult {
            stdout: output.stdout,
            stderr: output.stderr,
            exit_code,
        })
    }
}

impl CommandRunner for ProcessRunner {
    fn run_command(&self, args: Vec<String>) -> Result<ProcessResult> {
        self.run(args)
    }
}

/// Renders a command line for logs, quoting words the shell would split.
pub fn render_command_line(words: &[String]) -> String {
    words
        .iter()
        .map(|w| shell_escape::escape(w.as_str().into()).into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}
