use std::path::PathBuf;
use std::process::Command;

use camino::Utf8Path;

use crate::error::SoundrawError;

pub trait ScriptRunner: Send + Sync {
    fn run(&self, script: &str) -> Result<String, SoundrawError>;
}

impl<T: ScriptRunner + ?Sized> ScriptRunner for std::sync::Arc<T> {
    fn run(&self, script: &str) -> Result<String, SoundrawError> {
        (**self).run(script)
    }
}

#[derive(Debug, Clone)]
pub struct OsaScriptRunner {
    program: PathBuf,
}

impl OsaScriptRunner {
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("/usr/bin/osascript"),
        }
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for OsaScriptRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptRunner for OsaScriptRunner {
    fn run(&self, script: &str) -> Result<String, SoundrawError> {
        tracing::debug!(lines = script.lines().count(), "running osascript");
        let output = Command::new(&self.program)
            .arg("-e")
            .arg(script)
            .output()
            .map_err(|err| {
                SoundrawError::Automation(format!("{}: {err}", self.program.display()))
            })?;
        if output.status.success() {
            return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
        }
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            format!("osascript exited with {}", output.status)
        } else {
            stderr
        };
        Err(SoundrawError::Automation(message))
    }
}

pub fn applescript_string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            _ => out.push(ch),
        }
    }
    out.push('"');
    out
}

pub struct Clipboard<R: ScriptRunner> {
    runner: R,
}

impl<R: ScriptRunner> Clipboard<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn copy_text(&self, text: &str) -> Result<(), SoundrawError> {
        self.runner
            .run(&format!("set the clipboard to {}", applescript_string(text)))
            .map(|_| ())
    }

    pub fn copy_file(&self, path: &Utf8Path) -> Result<(), SoundrawError> {
        self.runner
            .run(&format!(
                "set the clipboard to (POSIX file {})",
                applescript_string(path.as_str())
            ))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_backslashes_and_quotes() {
        assert_eq!(applescript_string(r#"say "hi" \o/"#), r#""say \"hi\" \\o/""#);
    }
}
