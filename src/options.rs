//! Process-wide preferences for human-readable output.
//!
//! A single [`Options`] value lives behind a `parking_lot::RwLock`. It is
//! meant to be configured once at program start and read everywhere else;
//! nothing in the library mutates it.

use parking_lot::RwLock;

/// Formatting preferences consulted when rendering schemas and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Suppress ANSI colour codes in rendered output. Defaults to `true`;
    /// colouring is opt-in so that `to_string` output round-trips through
    /// the grammars.
    pub no_color: bool,
    /// Spaces per indent level in multi-line renderings.
    pub indent_size: usize,
}

impl Options {
    const fn initial() -> Self {
        Options {
            no_color: true,
            indent_size: 4,
        }
    }
}

impl Default for Options {
    fn default() -> Self {
        Options::initial()
    }
}

static OPTIONS: RwLock<Options> = RwLock::new(Options::initial());

/// Read a copy of the current options.
pub fn options() -> Options {
    *OPTIONS.read()
}

/// Update the global options in place.
///
/// ```
/// bitloom::update_options(|o| o.no_color = true);
/// ```
pub fn update_options(f: impl FnOnce(&mut Options)) {
    f(&mut OPTIONS.write());
}

/// ANSI codes used by `Display` implementations, empty when colour is off.
pub(crate) struct Colour {
    pub name: &'static str,
    pub dtype: &'static str,
    pub value: &'static str,
    pub const_value: &'static str,
    pub keyword: &'static str,
    pub off: &'static str,
}

impl Colour {
    pub(crate) fn current() -> Colour {
        if options().no_color {
            Colour {
                name: "",
                dtype: "",
                value: "",
                const_value: "",
                keyword: "",
                off: "",
            }
        } else {
            Colour {
                name: "\x1b[32m",
                dtype: "\x1b[35m",
                value: "\x1b[36m",
                const_value: "\x1b[36;4m",
                keyword: "\x1b[33m",
                off: "\x1b[0m",
            }
        }
    }
}
