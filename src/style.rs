/*!
Colors for the diagnostics recur writes to stderr.

Only log lines are colored. Sequences written to stdout are always plain,
since they are meant to be piped into other programs.
*/

use std::{ffi::OsString, fmt::Display, io::IsTerminal, sync::LazyLock};

use anstyle::{AnsiColor, Style};

/// The styles used for each component of a log line.
///
/// Every style is plain when stderr isn't a terminal, when `NO_COLOR` is
/// set to a non-empty value or when `TERM` is `dumb`.
#[derive(Clone, Copy, Debug)]
pub struct Theme {
    time: Style,
    target: Style,
    error: Style,
    warn: Style,
    quiet: Style,
}

impl Theme {
    /// Returns the theme for stderr, which is computed once.
    pub fn stderr() -> &'static Theme {
        static THEME: LazyLock<Theme> = LazyLock::new(|| {
            let tty = std::io::stderr().is_terminal();
            if wants_color(tty, |name| std::env::var_os(name)) {
                Theme::colored()
            } else {
                Theme::plain()
            }
        });
        &THEME
    }

    const fn plain() -> Theme {
        Theme {
            time: Style::new(),
            target: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            quiet: Style::new(),
        }
    }

    fn colored() -> Theme {
        let fg = |color: AnsiColor| Style::new().fg_color(Some(color.into()));
        Theme {
            time: Style::new().dimmed(),
            target: fg(AnsiColor::Cyan),
            error: fg(AnsiColor::Red).bold(),
            warn: fg(AnsiColor::Yellow).bold(),
            quiet: fg(AnsiColor::BrightBlack),
        }
    }

    pub fn time<T: Display>(&self, time: T) -> Paint<T> {
        Paint { style: self.time, value: time }
    }

    /// The module a log line comes from.
    pub fn target<T: Display>(&self, target: T) -> Paint<T> {
        Paint { style: self.target, value: target }
    }

    /// Errors and warnings stand out, while debug and trace levels recede.
    pub fn level(&self, level: log::Level) -> Paint<log::Level> {
        let style = match level {
            log::Level::Error => self.error,
            log::Level::Warn => self.warn,
            log::Level::Info => Style::new(),
            log::Level::Debug | log::Level::Trace => self.quiet,
        };
        Paint { style, value: level }
    }
}

/// A value rendered with a style. A plain style renders just the value.
#[derive(Clone, Debug)]
pub struct Paint<T> {
    style: Style,
    value: T,
}

impl<T: Display> Display for Paint<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.style == Style::new() {
            return self.value.fmt(f);
        }
        write!(f, "{}{}{:#}", self.style, self.value, self.style)
    }
}

/// Decides whether output to a terminal (or not) should be colored, given
/// a way to read environment variables.
fn wants_color(
    tty: bool,
    var: impl Fn(&str) -> Option<OsString>,
) -> bool {
    if !tty {
        return false;
    }
    if var("NO_COLOR").is_some_and(|v| !v.is_empty()) {
        return false;
    }
    var("TERM").is_none_or(|term| term != "dumb")
}
