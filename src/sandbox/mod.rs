//! Bounded subprocess execution.
//!
//! One [`Sandbox`] per process is sufficient. It runs pre-approved binaries
//! with captured stdio, a per-execution deadline, a deterministically
//! reconstructed environment, and Unix process-group isolation so that a
//! deadline kill takes grandchildren down too. It does **not** isolate the
//! filesystem: children see the real home directory.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use serde_json::{Value, json};
use tokio::io::AsyncReadExt;
use uuid::Uuid;

use crate::error::ToolError;
use crate::tools::context::ExecutionContext;
use crate::tools::display;

/// Prefix of script temp files, so [`Sandbox::cleanup`] can find strays.
const TEMP_PREFIX: &str = "gantry-exec-";

/// Default per-execution deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime-configurable sandbox settings. Owned by exactly one [`Sandbox`].
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Working directory for every child process.
    pub workdir: PathBuf,
    /// Wall-clock deadline per execution.
    pub timeout: Duration,
    /// Basenames of binaries that may be spawned.
    pub allowed_binaries: HashSet<String>,
    /// Directory for script temp files.
    pub tmp_dir: PathBuf,
    /// When true, `HTTP_PROXY`/`HTTPS_PROXY` are forwarded from the host.
    pub network: bool,
    /// Optional Python environment root; its `bin/` is prepended to PATH.
    pub python_env: Option<PathBuf>,
}

impl SandboxConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            timeout: DEFAULT_TIMEOUT,
            allowed_binaries: default_allowed_binaries(),
            tmp_dir: std::env::temp_dir(),
            network: false,
            python_env: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_network(mut self, network: bool) -> Self {
        self.network = network;
        self
    }

    pub fn with_python_env(mut self, root: impl Into<PathBuf>) -> Self {
        self.python_env = Some(root.into());
        self
    }

    pub fn allow_binary(mut self, name: impl Into<String>) -> Self {
        self.allowed_binaries.insert(name.into());
        self
    }
}

/// Binaries the built-in tool family relies on, shell included.
pub fn default_allowed_binaries() -> HashSet<String> {
    [
        "bash", "sh", "echo", "cat", "sed", "head", "tail", "ls", "find", "grep", "rg", "fd",
        "wc", "sort", "uniq", "diff", "env", "pwd", "which", "sleep", "true", "false", "curl",
        "git", "patch", "python3", "python", "node", "npm", "npx", "go", "gofmt",
        "golangci-lint", "cargo", "rustc", "make", "pytest", "ruff",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

// ─── Outcome ─────────────────────────────────────────────────────────────────

/// Captured result of one subprocess run.
#[derive(Debug, Clone)]
pub struct ExecOutcome {
    pub stdout: String,
    pub stderr: String,
    /// Exit code; −1 when the process was killed.
    pub exit_code: i32,
    /// True when the deadline (or cancellation) killed the process group.
    pub killed: bool,
    pub duration: Duration,
}

impl ExecOutcome {
    pub fn success(&self) -> bool {
        !self.killed && self.exit_code == 0
    }

    /// Raw output for the model: stdout, then a `[stderr]` section if any.
    pub fn combined_output(&self) -> String {
        let mut out = self.stdout.clone();
        if !self.stderr.is_empty() {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("[stderr]\n");
            out.push_str(&self.stderr);
        }
        if self.killed {
            if !out.is_empty() && !out.ends_with('\n') {
                out.push('\n');
            }
            out.push_str("[killed: deadline expired]");
        }
        out
    }

    /// Compact display form (emoji status + head/tail excerpt).
    pub fn render_display(&self, header: &str) -> String {
        display::render(header, self.success(), &self.combined_output())
    }

    pub fn metadata(&self) -> Value {
        json!({
            "exit_code": self.exit_code,
            "killed": self.killed,
            "duration_ms": self.duration.as_millis() as u64,
        })
    }
}

// ─── Sandbox ─────────────────────────────────────────────────────────────────

/// Subprocess runner. Share as `Arc<Sandbox>`.
///
/// The config mutex serializes workdir mutations against execution setup;
/// it is never held across the child's lifetime, only while snapshotting.
pub struct Sandbox {
    config: Mutex<SandboxConfig>,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self {
            config: Mutex::new(config),
        }
    }

    /// Change the working directory. Validates that the target exists and is
    /// a directory before assignment.
    pub fn set_workdir(&self, dir: impl Into<PathBuf>) -> Result<(), ToolError> {
        let dir = dir.into();
        if !dir.is_dir() {
            return Err(ToolError::InvalidArg(format!(
                "'{}' does not exist or is not a directory",
                dir.display()
            )));
        }
        let mut cfg = self.config.lock().unwrap_or_else(|e| e.into_inner());
        cfg.workdir = dir;
        Ok(())
    }

    pub fn workdir(&self) -> PathBuf {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .workdir
            .clone()
    }

    /// Snapshot the current configuration.
    pub fn config(&self) -> SandboxConfig {
        self.config.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Replace the timeout at runtime.
    pub fn set_timeout(&self, timeout: Duration) {
        self.config
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .timeout = timeout;
    }

    /// Run `command args...` with captured stdio.
    ///
    /// The command's basename must be in the allowed-binary set; violations
    /// fail with [`ToolError::NotAllowed`] before any process is spawned.
    pub async fn execute(
        &self,
        ctx: &ExecutionContext,
        command: &str,
        args: &[&str],
    ) -> Result<ExecOutcome, ToolError> {
        let cfg = self.config();

        let basename = Path::new(command)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(command);
        if !cfg.allowed_binaries.contains(basename) {
            return Err(ToolError::NotAllowed(format!("binary '{basename}'")));
        }

        let mut cmd = tokio::process::Command::new(command);
        cmd.args(args)
            .current_dir(&cfg.workdir)
            .env_clear()
            .envs(build_env(&cfg))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        cmd.process_group(0);

        let started = Instant::now();
        let mut child = cmd
            .spawn()
            .map_err(|e| ToolError::ExecutionFailure(format!("failed to spawn '{command}': {e}")))?;
        let pid = child.id();

        let mut stdout_pipe = child.stdout.take();
        let mut stderr_pipe = child.stderr.take();
        let stdout_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stdout_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(pipe) = stderr_pipe.as_mut() {
                let _ = pipe.read_to_end(&mut buf).await;
            }
            buf
        });

        let cancel = ctx.cancellation();
        let deadline = tokio::time::sleep(cfg.timeout);
        tokio::pin!(deadline);

        enum Waited {
            Done(Result<std::process::ExitStatus, std::io::Error>),
            DeadlineExpired,
            Cancelled,
        }
        let waited = tokio::select! {
            status = child.wait() => Waited::Done(status),
            _ = &mut deadline => Waited::DeadlineExpired,
            _ = cancel.cancelled() => Waited::Cancelled,
        };
        let (exit_code, killed) = match waited {
            Waited::Done(status) => {
                let status = status
                    .map_err(|e| ToolError::ExecutionFailure(format!("wait failed: {e}")))?;
                (status.code().unwrap_or(-1), false)
            }
            Waited::DeadlineExpired => {
                log::warn!("sandbox deadline expired for '{command}', killing process group");
                kill_group(pid, &mut child).await;
                (-1, true)
            }
            Waited::Cancelled => {
                log::debug!("sandbox execution of '{command}' cancelled");
                kill_group(pid, &mut child).await;
                (-1, true)
            }
        };

        let stdout = stdout_task.await.unwrap_or_default();
        let stderr = stderr_task.await.unwrap_or_default();

        Ok(ExecOutcome {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
            killed,
            duration: started.elapsed(),
        })
    }

    /// Run `bash -c <command_line>` — the entry point most built-in tools use.
    pub async fn execute_shell(
        &self,
        ctx: &ExecutionContext,
        command_line: &str,
    ) -> Result<ExecOutcome, ToolError> {
        self.execute(ctx, "bash", &["-c", command_line]).await
    }

    /// Write `body` to a temp file and run `interpreter <file>`.
    ///
    /// The temp file is removed on every exit path, including errors.
    pub async fn execute_script(
        &self,
        ctx: &ExecutionContext,
        interpreter: &str,
        body: &str,
    ) -> Result<ExecOutcome, ToolError> {
        let tmp_dir = self.config().tmp_dir;
        let path = tmp_dir.join(format!("{TEMP_PREFIX}{}", Uuid::new_v4()));
        tokio::fs::write(&path, body).await.map_err(|e| {
            ToolError::ExecutionFailure(format!("failed to write script file: {e}"))
        })?;

        let path_str = path.to_string_lossy().into_owned();
        let result = self.execute(ctx, interpreter, &[&path_str]).await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            log::warn!("failed to remove script temp file {path:?}: {e}");
        }
        result
    }

    /// Remove leftover script temp files (matched by the sentinel prefix).
    pub fn cleanup(&self) -> usize {
        let tmp_dir = self.config().tmp_dir;
        let Ok(entries) = std::fs::read_dir(&tmp_dir) else {
            return 0;
        };
        let mut removed = 0;
        for entry in entries.flatten() {
            let name = entry.file_name();
            if name.to_string_lossy().starts_with(TEMP_PREFIX)
                && std::fs::remove_file(entry.path()).is_ok()
            {
                removed += 1;
            }
        }
        removed
    }
}

// ─── Internals ───────────────────────────────────────────────────────────────

/// Deterministic child environment. Nothing from the host leaks except the
/// variables listed here.
fn build_env(cfg: &SandboxConfig) -> Vec<(String, String)> {
    let mut env = Vec::new();

    let base_path =
        std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());
    let path = match &cfg.python_env {
        Some(root) => format!("{}/bin:{base_path}", root.display()),
        None => base_path,
    };
    env.push(("PATH".to_string(), path));

    let home = std::env::var("HOME")
        .ok()
        .or_else(|| dirs::home_dir().map(|p| p.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "/tmp".to_string());
    env.push(("HOME".to_string(), home));
    env.push((
        "TMPDIR".to_string(),
        cfg.tmp_dir.to_string_lossy().into_owned(),
    ));
    env.push(("LANG".to_string(), "C.UTF-8".to_string()));
    env.push(("LC_ALL".to_string(), "C.UTF-8".to_string()));
    env.push((
        "USER".to_string(),
        std::env::var("USER").unwrap_or_else(|_| "agent".to_string()),
    ));

    if cfg.network {
        for key in ["HTTP_PROXY", "HTTPS_PROXY"] {
            if let Ok(value) = std::env::var(key) {
                env.push((key.to_string(), value));
            }
        }
    }
    env
}

/// Kill the whole process group, then reap the direct child.
async fn kill_group(pid: Option<u32>, child: &mut tokio::process::Child) {
    #[cfg(unix)]
    if let Some(pid) = pid {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(pid as i32), Signal::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = pid;
    let _ = child.kill().await;
    let _ = child.wait().await;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sandbox() -> Sandbox {
        Sandbox::new(SandboxConfig::new(std::env::temp_dir()))
    }

    #[tokio::test]
    async fn shell_roundtrip() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let out = sb.execute_shell(&ctx, "echo hello").await.unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.exit_code, 0);
        assert!(!out.killed);
    }

    #[tokio::test]
    async fn disallowed_binary_never_spawns() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let started = Instant::now();
        let err = sb.execute(&ctx, "nmap", &["-p", "80"]).await.unwrap_err();
        assert!(matches!(err, ToolError::NotAllowed(_)));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn basename_check_applies_to_paths() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let err = sb
            .execute(&ctx, "/usr/bin/nmap", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotAllowed(_)));
    }

    #[tokio::test]
    async fn timeout_kills_the_group() {
        let sb = Sandbox::new(
            SandboxConfig::new(std::env::temp_dir()).with_timeout(Duration::from_secs(1)),
        );
        let ctx = ExecutionContext::new();
        let started = Instant::now();
        let out = sb.execute(&ctx, "sleep", &["5"]).await.unwrap();
        assert!(out.killed);
        assert_eq!(out.exit_code, -1);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let cancel_ctx = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel_ctx.cancel();
        });
        let started = Instant::now();
        let out = sb.execute(&ctx, "sleep", &["5"]).await.unwrap();
        assert!(out.killed);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stderr_gets_its_own_section() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let out = sb
            .execute_shell(&ctx, "echo out; echo err >&2")
            .await
            .unwrap();
        let combined = out.combined_output();
        assert!(combined.starts_with("out\n"));
        assert!(combined.contains("[stderr]\nerr"));
    }

    #[tokio::test]
    async fn environment_is_scoped() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let out = sb.execute(&ctx, "env", &[]).await.unwrap();
        assert!(out.stdout.contains("HOME="));
        assert!(out.stdout.contains("LANG=C.UTF-8"));
        // cargo test sets CARGO_* in our env; none of it may leak through.
        assert!(!out.stdout.contains("CARGO_"));
    }

    #[tokio::test]
    async fn script_temp_file_is_removed() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let out = sb
            .execute_script(&ctx, "bash", "echo from-script")
            .await
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout, "from-script\n");
        // No stray temp files with our prefix remain.
        assert_eq!(sb.cleanup(), 0);
    }

    #[tokio::test]
    async fn workdir_setter_validates() {
        let sb = sandbox();
        assert!(sb.set_workdir("/definitely/not/here").is_err());
        let dir = tempfile::TempDir::new().unwrap();
        sb.set_workdir(dir.path()).unwrap();
        assert_eq!(sb.workdir(), dir.path());
    }

    #[tokio::test]
    async fn nonzero_exit_reported() {
        let sb = sandbox();
        let ctx = ExecutionContext::new();
        let out = sb.execute_shell(&ctx, "exit 3").await.unwrap();
        assert!(!out.success());
        assert_eq!(out.exit_code, 3);
        assert!(!out.killed);
    }
}
