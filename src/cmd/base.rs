// ============================================================================
// src/cmd/base.rs – Allowlisted external command runner (for system utilities)
// ============================================================================

use anyhow::{anyhow, Context, Result};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;

/// Tools this crate is willing to spawn. Resolution goes through `PATH`, but
/// only for these names.
pub const ALLOWED_TOOLS: &[&str] = &[
    "qemu-img",
    "cloud-localds",
    "virt-install",
    "virsh",
    "systemctl",
    "file",
    "git",
    "apt-get",
    "dnf",
    "yum",
    "zypper",
    "pacman",
    "sudo",
];

/// Safe wrapper for external process execution.
#[derive(Debug, Clone)]
pub struct Cmd {
    pub path: PathBuf,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputData {
    pub stdout: String,
    pub stderr: String,
    pub status: i32,
}

impl OutputData {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    /// Most useful diagnostic text: stderr when present, else stdout.
    pub fn detail(&self) -> String {
        let err = self.stderr.trim();
        if err.is_empty() {
            self.stdout.trim().to_string()
        } else {
            err.to_string()
        }
    }
}

impl Cmd {
    /// Resolve an allowlisted tool name through `PATH`.
    pub fn resolve(name: &str, timeout: Option<Duration>) -> Result<Self> {
        if !ALLOWED_TOOLS.contains(&name) {
            return Err(anyhow!("command '{}' not in allowlist", name));
        }
        let path = which::which(name).map_err(|_| anyhow!("binary not found: {}", name))?;
        Ok(Self { path, timeout })
    }

    /// Run command with arguments, returning `OutputData`. A non-zero exit is
    /// not an error here; callers inspect `status`.
    pub fn run(&self, args: &[&str]) -> Result<OutputData> {
        debug!(program = %self.path.display(), ?args, "spawning");
        let mut cmd = Command::new(&self.path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let child = cmd
            .spawn()
            .with_context(|| format!("spawn {}", self.path.display()))?;

        let output = match self.timeout {
            Some(timeout) => self.wait_with_timeout(child, timeout)?,
            None => {
                let out = child
                    .wait_with_output()
                    .with_context(|| format!("wait for {}", self.path.display()))?;
                OutputData {
                    stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&out.stderr).into_owned(),
                    status: out.status.code().unwrap_or(-1),
                }
            }
        };
        debug!(program = %self.path.display(), status = output.status, "exited");
        Ok(output)
    }

    fn wait_with_timeout(
        &self,
        mut child: std::process::Child,
        timeout: Duration,
    ) -> Result<OutputData> {
        // Pipes are drained while polling; a chatty child would otherwise
        // block on a full pipe and never exit.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());
        let start = Instant::now();

        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if start.elapsed() > timeout {
                terminate(&mut child);
                return Err(anyhow!(
                    "{} timed out after {:?}",
                    self.path.display(),
                    timeout
                ));
            }
            thread::sleep(Duration::from_millis(100));
        };

        Ok(OutputData {
            stdout: collect(stdout)?,
            stderr: collect(stderr)?,
            status: status.code().unwrap_or(-1),
        })
    }
}

fn drain<P: Read + Send + 'static>(pipe: Option<P>) -> thread::JoinHandle<io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            pipe.read_to_end(&mut buf)?;
        }
        Ok(buf)
    })
}

fn collect(reader: thread::JoinHandle<io::Result<Vec<u8>>>) -> Result<String> {
    let bytes = reader
        .join()
        .map_err(|_| anyhow!("output reader panicked"))?
        .context("read child output")?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// SIGTERM first, then kill after a short grace period.
fn terminate(child: &mut std::process::Child) {
    use nix::sys::signal::{kill, Signal::SIGTERM};
    use nix::unistd::Pid;
    let _ = kill(Pid::from_raw(child.id() as i32), SIGTERM);
    thread::sleep(Duration::from_millis(200));
    let _ = child.kill();
    let _ = child.wait();
}

/// The seam between workflow logic and the host. Production code uses
/// [`SystemRunner`]; tests substitute a recording fake.
pub trait Runner {
    /// Locate `program` on the host, if installed.
    fn which(&self, program: &str) -> Option<PathBuf>;

    /// Run `program` with `args` to completion.
    fn run(&self, program: &str, args: &[String]) -> Result<OutputData>;
}

#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    pub timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }
}

impl Runner for SystemRunner {
    fn which(&self, program: &str) -> Option<PathBuf> {
        which::which(program).ok()
    }

    fn run(&self, program: &str, args: &[String]) -> Result<OutputData> {
        let cmd = Cmd::resolve(program, self.timeout)?;
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        cmd.run(&argv)
    }
}

/// Render a command line for logs, quoting arguments that contain spaces.
pub fn render_command(program: &str, args: &[String]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

/// Convenience for building argument vectors from mixed sources.
pub fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
