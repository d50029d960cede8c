//! Content check for first-boot scripts.
//!
//! Only non-UTF-8 or unreadable content is a hard error. Everything else
//! (odd interpreter, risky commands, size) is reported as a warning and the
//! script is still accepted. `syntax_check` runs the interpreter's own
//! parser over the file and is likewise advisory.

use std::io;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::time::{Duration, Instant};

/// Interpreters a shebang may name without a warning.
pub const ALLOWED_INTERPRETERS: &[&str] = &["bash", "sh", "python", "python3", "perl", "ruby"];

/// Substrings (matched case-insensitively) that earn a warning.
pub const DANGEROUS_PATTERNS: &[&str] = &[
    "rm -rf /",
    "dd if=",
    "mkfs.",
    "fdisk",
    "parted",
    "eval",
    "exec",
    "> /dev/",
    "chmod 777",
];

/// Scripts above this many bytes earn a warning.
pub const LARGE_SCRIPT_BYTES: usize = 100_000;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptReport {
    /// Basename of the shebang interpreter, if there is a shebang.
    pub interpreter: Option<String>,
    pub line_count: usize,
    pub warnings: Vec<String>,
    pub errors: Vec<String>,
}

impl ScriptReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Interpreter named by a shebang line; `/usr/bin/env X` yields `X`.
fn shebang_interpreter(first_line: &str) -> Option<String> {
    let rest = first_line.strip_prefix("#!")?;
    let mut words = rest.split_whitespace();
    let program = words.next()?;
    let base = Path::new(program).file_name()?.to_string_lossy().into_owned();
    if base == "env" {
        // Skip env flags such as `-S`.
        return words
            .find(|w| !w.starts_with('-'))
            .map(|w| w.to_string());
    }
    Some(base)
}

/// Inspect script text already loaded in memory.
pub fn check_content(content: &str) -> ScriptReport {
    let mut report = ScriptReport {
        line_count: content.lines().count(),
        ..ScriptReport::default()
    };

    if let Some(interp) = content.lines().next().and_then(shebang_interpreter) {
        if !ALLOWED_INTERPRETERS.contains(&interp.as_str()) {
            report
                .warnings
                .push(format!("Unusual interpreter: {}", interp));
        }
        report.interpreter = Some(interp);
    }

    let lower = content.to_lowercase();
    for pattern in DANGEROUS_PATTERNS {
        if lower.contains(pattern) {
            report
                .warnings
                .push(format!("Potentially dangerous pattern found: {}", pattern));
        }
    }

    if content.len() > LARGE_SCRIPT_BYTES {
        report
            .warnings
            .push(format!("Script is large ({} bytes)", content.len()));
    }
    report
}

/// Read and inspect the script at `path`.
pub fn check_script(path: &Path) -> ScriptReport {
    let bytes = match std::fs::read(path) {
        Ok(b) => b,
        Err(e) => {
            return ScriptReport {
                errors: vec![format!("Error reading script: {}", e)],
                ..ScriptReport::default()
            }
        }
    };
    match String::from_utf8(bytes) {
        Ok(text) => check_content(&text),
        Err(_) => ScriptReport {
            errors: vec!["Script contains non-UTF-8 content".to_string()],
            ..ScriptReport::default()
        },
    }
}

/// Upper bound on one interpreter syntax run.
pub const SYNTAX_CHECK_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of asking the interpreter to parse a script without running it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxCheck {
    Passed,
    /// The interpreter rejected the script; holds its diagnostics.
    Failed(String),
    /// No checker for this interpreter, or the checker could not be run.
    Skipped(String),
}

/// `bash -n` for shell scripts, `<python> -m py_compile` for Python.
fn syntax_command(interpreter: &str, path: &Path) -> Option<Command> {
    match interpreter {
        "bash" | "sh" => {
            let mut cmd = Command::new("bash");
            cmd.arg("-n").arg(path);
            Some(cmd)
        }
        "python" | "python3" => {
            let mut cmd = Command::new(interpreter);
            cmd.args(["-m", "py_compile"])
                .arg(path)
                .env("PYTHONPYCACHEPREFIX", std::env::temp_dir().join("isoprep-pycache"));
            Some(cmd)
        }
        _ => None,
    }
}

/// Run `cmd`, killing it once `timeout` passes. `None` means it timed out.
fn output_within(mut cmd: Command, timeout: Duration) -> io::Result<Option<Output>> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;
    let deadline = Instant::now() + timeout;
    loop {
        if child.try_wait()?.is_some() {
            return child.wait_with_output().map(Some);
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            let _ = child.wait();
            return Ok(None);
        }
        std::thread::sleep(Duration::from_millis(20));
    }
}

/// Parse-check the script at `path` with the interpreter named by its
/// shebang. Never fails: anything that prevents the check is `Skipped`.
pub fn syntax_check(path: &Path, interpreter: Option<&str>) -> SyntaxCheck {
    let Some(interp) = interpreter else {
        return SyntaxCheck::Skipped("no interpreter declared".to_string());
    };
    let Some(cmd) = syntax_command(interp, path) else {
        return SyntaxCheck::Skipped(format!("no syntax checker for {}", interp));
    };
    match output_within(cmd, SYNTAX_CHECK_TIMEOUT) {
        Ok(Some(out)) if out.status.success() => SyntaxCheck::Passed,
        Ok(Some(out)) => {
            let stderr = String::from_utf8_lossy(&out.stderr).trim().to_string();
            SyntaxCheck::Failed(if stderr.is_empty() {
                format!("{} exited with {}", interp, out.status)
            } else {
                stderr
            })
        }
        Ok(None) => SyntaxCheck::Skipped(format!(
            "{} syntax check timed out after {:?}",
            interp, SYNTAX_CHECK_TIMEOUT
        )),
        Err(e) => SyntaxCheck::Skipped(format!("could not run {} syntax check: {}", interp, e)),
    }
}
