use camino::Utf8Path;

use crate::automation::{ScriptRunner, applescript_string};
use crate::error::SoundrawError;

pub trait Player: Send + 'static {
    fn open_and_loop(&self, path: &Utf8Path) -> Result<(), SoundrawError>;
    fn close(&self) -> Result<(), SoundrawError>;
}

pub struct QuickTimePlayer<R: ScriptRunner> {
    runner: R,
}

impl<R: ScriptRunner> QuickTimePlayer<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub fn open_script(path: &Utf8Path) -> String {
        format!(
            r#"tell application "QuickTime Player"
    set sampleDoc to open POSIX file {}
    set looping of sampleDoc to true
    play sampleDoc
end tell"#,
            applescript_string(path.as_str())
        )
    }

    pub fn close_script() -> &'static str {
        r#"tell application "QuickTime Player"
    if (count of documents) > 0 then close front document saving no
end tell"#
    }
}

impl<R: ScriptRunner + 'static> Player for QuickTimePlayer<R> {
    fn open_and_loop(&self, path: &Utf8Path) -> Result<(), SoundrawError> {
        self.runner.run(&Self::open_script(path)).map(|_| ())
    }

    fn close(&self) -> Result<(), SoundrawError> {
        self.runner.run(Self::close_script()).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::OsaScriptRunner;

    #[test]
    fn open_script_quotes_path() {
        let script =
            QuickTimePlayer::<OsaScriptRunner>::open_script(Utf8Path::new("/tmp/My \"Beat\".m4a"));
        assert!(script.contains(r#"open POSIX file "/tmp/My \"Beat\".m4a""#));
        assert!(script.contains("set looping of sampleDoc to true"));
    }
}
