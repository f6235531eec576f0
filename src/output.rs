use std::borrow::Cow;
use std::cell::RefCell;

use colored::{ColoredString, Colorize};

/// Print a diagnostic line to stderr.
///
/// ```ignore
/// dprintln!(Always, Error, "Memory read out of bounds: 0x{:04X}", addr);
/// ```
#[macro_export]
macro_rules! dprintln {
    ( $cond:expr, $kind:expr, $fmt:literal $($tt:tt)* ) => {{
        #[allow(unused_imports)]
        use $crate::output::{Condition::*, Kind::*};
        let s = format!(
            concat!($fmt, "\n")
            $($tt)*
        );
        $crate::output::Output::Diagnostic($cond, $kind).print_str(&s);
    }};
    // Trigger type error if missing condition or kind
    ( $fmt:literal $($tt:tt)* ) => {{
        $crate::output::Output::Diagnostic($fmt);
    }};
}

/// Side channel for everything which is not program output.
///
/// Program output goes through a [`Console`](crate::console::Console), so everything printed
/// here goes to stderr.
#[derive(Clone, Copy, Debug)]
pub enum Output {
    /// Right-aligned progress line, eg. `     Loading target hello.obj`.
    Status,
    Diagnostic(Condition, Kind),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Condition {
    /// Printed even with `--minimal`, without color.
    Always,
    /// Dropped with `--minimal`.
    Sometimes,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Kind {
    Error,
    Warning,
}

impl Output {
    thread_local! {
        static IS_MINIMAL: RefCell<bool> = const { RefCell::new(false) };
        static IS_RAW: RefCell<bool> = const { RefCell::new(false) };
    }

    pub fn set_minimal(new_value: bool) -> bool {
        if new_value {
            colored::control::set_override(false);
        }
        Self::IS_MINIMAL.with(|value| value.replace(new_value))
    }
    pub fn is_minimal() -> bool {
        Self::IS_MINIMAL.with(|value| *value.borrow())
    }

    /// Terminal is in raw mode, so line feeds need an explicit carriage return.
    pub fn set_raw(new_value: bool) -> bool {
        Self::IS_RAW.with(|value| value.replace(new_value))
    }
    pub fn is_raw() -> bool {
        Self::IS_RAW.with(|value| *value.borrow())
    }

    pub fn print_str(&self, string: &str) {
        let condition = match self {
            Self::Status => Condition::Sometimes,
            Self::Diagnostic(condition, _) => *condition,
        };
        if Self::is_minimal() && condition == Condition::Sometimes {
            return;
        }

        let string = raw_newlines(string, Self::is_raw());
        match self {
            Self::Status => eprint!("{}", string),
            Self::Diagnostic(_, kind) => {
                let colored = ColoredString::from(&*string);
                let colored = match kind {
                    Kind::Error => colored.red(),
                    Kind::Warning => colored.yellow(),
                };
                eprint!("{}", colored);
            }
        }
    }

    /// Print `left` right-aligned in a 12-column gutter, followed by `right`.
    pub fn print_status(&self, left: ColoredString, right: &str) {
        self.print_str(&format!("{left:>12} {right}\n"));
    }
}

/// Expand `\n` to `\r\n` if `raw` is set.
pub fn raw_newlines(string: &str, raw: bool) -> Cow<'_, str> {
    if raw && string.contains('\n') {
        Cow::Owned(string.replace('\n', "\r\n"))
    } else {
        Cow::Borrowed(string)
    }
}
