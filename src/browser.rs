use std::fmt;
use std::str::FromStr;
use std::thread;
use std::time::Duration;

use crate::automation::{ScriptRunner, applescript_string};
use crate::error::SoundrawError;

pub const DEFAULT_FOCUS_ATTEMPTS: u32 = 10;
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const RETURN_KEY_CODE: u16 = 36;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Command,
    Shift,
    Option,
    Control,
}

impl Modifier {
    fn script_name(self) -> &'static str {
        match self {
            Modifier::Command => "command down",
            Modifier::Shift => "shift down",
            Modifier::Option => "option down",
            Modifier::Control => "control down",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcut {
    pub key: String,
    pub modifiers: Vec<Modifier>,
}

impl Shortcut {
    pub fn new(key: impl Into<String>, modifiers: &[Modifier]) -> Self {
        Self {
            key: key.into(),
            modifiers: modifiers.to_vec(),
        }
    }

    pub fn script(&self) -> String {
        let keystroke = format!("keystroke {}", applescript_string(&self.key));
        if self.modifiers.is_empty() {
            return format!(r#"tell application "System Events" to {keystroke}"#);
        }
        let modifiers = self
            .modifiers
            .iter()
            .map(|modifier| modifier.script_name())
            .collect::<Vec<_>>()
            .join(", ");
        format!(r#"tell application "System Events" to {keystroke} using {{{modifiers}}}"#)
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for modifier in &self.modifiers {
            let label = match modifier {
                Modifier::Command => "cmd",
                Modifier::Shift => "shift",
                Modifier::Option => "opt",
                Modifier::Control => "ctrl",
            };
            write!(f, "{label}+")?;
        }
        write!(f, "{}", self.key)
    }
}

impl FromStr for Shortcut {
    type Err = SoundrawError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let parts = value
            .split('+')
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>();
        let Some((key, modifiers)) = parts.split_last() else {
            return Err(SoundrawError::Automation(format!(
                "empty shortcut: {value:?}"
            )));
        };
        let modifiers = modifiers
            .iter()
            .map(|part| match part.to_ascii_lowercase().as_str() {
                "cmd" | "command" => Ok(Modifier::Command),
                "shift" => Ok(Modifier::Shift),
                "opt" | "option" | "alt" => Ok(Modifier::Option),
                "ctrl" | "control" => Ok(Modifier::Control),
                other => Err(SoundrawError::Automation(format!(
                    "unknown modifier {other:?} in {value:?}"
                ))),
            })
            .collect::<Result<Vec<_>, _>>()?;
        if key.chars().count() != 1 {
            return Err(SoundrawError::Automation(format!(
                "shortcut key must be a single character: {value:?}"
            )));
        }
        Ok(Self {
            key: key.to_ascii_lowercase(),
            modifiers,
        })
    }
}

pub struct BrowserAutomation<R: ScriptRunner> {
    runner: R,
    app: String,
    focus_attempts: u32,
    poll_interval: Duration,
}

impl<R: ScriptRunner> BrowserAutomation<R> {
    pub fn new(runner: R, app: impl Into<String>) -> Self {
        Self {
            runner,
            app: app.into(),
            focus_attempts: DEFAULT_FOCUS_ATTEMPTS,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_polling(mut self, attempts: u32, interval: Duration) -> Self {
        self.focus_attempts = attempts.max(1);
        self.poll_interval = interval;
        self
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn frontmost_app(&self) -> Result<String, SoundrawError> {
        self.runner.run(
            r#"tell application "System Events" to get name of first application process whose frontmost is true"#,
        )
    }

    pub fn focus(&self) -> Result<(), SoundrawError> {
        self.runner.run(&format!(
            "tell application {} to activate",
            applescript_string(&self.app)
        ))?;
        for attempt in 1..=self.focus_attempts {
            match self.frontmost_app() {
                Ok(name) if name == self.app => {
                    tracing::debug!(app = %self.app, attempt, "application is frontmost");
                    return Ok(());
                }
                Ok(name) => tracing::debug!(app = %self.app, frontmost = %name, attempt, "waiting for focus"),
                Err(err) => tracing::debug!(error = %err, attempt, "frontmost query failed"),
            }
            if attempt < self.focus_attempts {
                thread::sleep(self.poll_interval);
            }
        }
        Err(SoundrawError::FocusTimeout {
            app: self.app.clone(),
            attempts: self.focus_attempts,
        })
    }

    pub fn send_shortcut(&self, shortcut: &Shortcut) -> Result<(), SoundrawError> {
        self.focus()?;
        self.runner.run(&shortcut.script()).map(|_| ())
    }

    pub fn open_tab(&self, url: &str) -> Result<(), SoundrawError> {
        self.focus()?;
        self.runner
            .run(&Shortcut::new("t", &[Modifier::Command]).script())?;
        self.runner
            .run(&format!("set the clipboard to {}", applescript_string(url)))?;
        self.runner
            .run(&Shortcut::new("v", &[Modifier::Command]).script())?;
        self.runner
            .run(&format!(
                r#"tell application "System Events" to key code {RETURN_KEY_CODE}"#
            ))
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_shortcut() {
        let shortcut: Shortcut = "cmd+shift+T".parse().unwrap();
        assert_eq!(shortcut.key, "t");
        assert_eq!(shortcut.modifiers, vec![Modifier::Command, Modifier::Shift]);
        assert_eq!(shortcut.to_string(), "cmd+shift+t");
        assert_eq!(
            shortcut.script(),
            r#"tell application "System Events" to keystroke "t" using {command down, shift down}"#
        );
    }

    #[test]
    fn parse_shortcut_rejects_unknown_modifier() {
        assert!("hyper+t".parse::<Shortcut>().is_err());
        assert!("cmd+tab".parse::<Shortcut>().is_err());
        assert!("".parse::<Shortcut>().is_err());
    }
}
