//! Terminal logging with colored module prefixes.
//!
//! ```ignore
//! log!("process"; "restarting dev server at {}", url);
//! debug!("reload"; "reloaded {} of {} clients", sent, total);
//! ```
//!
//! `error` and `warning` lines go to stderr, everything else to stdout.

use crossterm::{
    execute,
    terminal::{Clear, ClearType},
};
use owo_colors::{AnsiColors, OwoColorize};
use std::{
    io::{self, Write},
    sync::atomic::{AtomicBool, Ordering},
};

/// Set from `-v/--verbose`.
static VERBOSE: AtomicBool = AtomicBool::new(false);

pub fn set_verbose(v: bool) {
    VERBOSE.store(v, Ordering::SeqCst);
}

pub fn is_verbose() -> bool {
    VERBOSE.load(Ordering::SeqCst)
}

/// Log a message with a colored module prefix
///
/// ```ignore
/// log!("module"; "message with {} formatting", args);
/// ```
#[macro_export]
macro_rules! log {
    ($module:expr; $($arg:tt)*) => {{
        $crate::logger::log($module, &format!($($arg)*))
    }};
}

/// Like `log!`, but only with `--verbose`.
#[macro_export]
macro_rules! debug {
    ($module:expr; $($arg:tt)*) => {{
        if $crate::logger::is_verbose() {
            $crate::logger::log($module, &format!($($arg)*))
        }
    }};
}

pub fn log(module: &str, message: &str) {
    let prefix = format!("[{module}]");
    let color = prefix_color(module);
    let line = format!("{} {message}", prefix.color(color).bold());

    if is_diagnostic(module) {
        write_line(&mut io::stderr().lock(), &line);
    } else {
        write_line(&mut io::stdout().lock(), &line);
    }
}

/// Clear the rest of the terminal line first so a shorter line never
/// leaves the tail of a longer one behind.
fn write_line(out: &mut impl Write, line: &str) {
    execute!(out, Clear(ClearType::UntilNewLine)).ok();
    writeln!(out, "{line}").ok();
    out.flush().ok();
}

fn is_diagnostic(module: &str) -> bool {
    module.eq_ignore_ascii_case("error") || module.eq_ignore_ascii_case("warning")
}

fn prefix_color(module: &str) -> AnsiColors {
    match module.to_ascii_lowercase().as_str() {
        "serve" | "aux" => AnsiColors::BrightBlue,
        "watch" => AnsiColors::BrightGreen,
        "process" | "probe" => AnsiColors::BrightCyan,
        "reload" | "ws" => AnsiColors::BrightMagenta,
        "warning" => AnsiColors::BrightYellow,
        "error" => AnsiColors::BrightRed,
        _ => AnsiColors::BrightWhite,
    }
}
