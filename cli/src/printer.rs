use std::env::{self, VarError};
use std::fmt::Display;
use std::io::{stdout, Stdout, Write};

use crossterm::queue;
use crossterm::style::{
    Attribute, Color, ContentStyle, Print, PrintStyledContent, StyledContent, Stylize,
};
use crossterm::tty::IsTty;

pub(crate) fn no_color_set() -> bool {
    !matches!(env::var("NO_COLOR"), Err(VarError::NotPresent))
}

#[cfg(feature = "unicode")]
pub static LINE_CHARACTER: &str = "⎯";

#[cfg(not(feature = "unicode"))]
pub static LINE_CHARACTER: &str = "=";

/// A Printer allows for printing styled content to stdout
///
/// Note that the printer doesn't use a mutex on stdout!
pub struct Printer {
    is_tty: bool,
    style_enabled: bool,
}

impl Drop for Printer {
    fn drop(&mut self) {
        // Ensure we've flushed everything
        self.flush()
    }
}

pub mod color {
    use crossterm::style::Color;

    // Colorscheme credit to Paul Tol https://personal.sron.nl/~pault/#sec:qualitative

    pub const YELLOW: Color = Color::Rgb {
        r: 0xCC,
        g: 0xBB,
        b: 0x44,
    };
    pub const CYAN: Color = Color::Rgb {
        r: 0x66,
        g: 0xCC,
        b: 0xEE,
    };
    pub const RED: Color = Color::Rgb {
        r: 0xEE,
        g: 0x66,
        b: 0x77,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0x22,
        g: 0x88,
        b: 0x33,
    };
    pub const GREY: Color = Color::Rgb {
        r: 0xBB,
        g: 0xBB,
        b: 0xBB,
    };

    pub const INTERESTING: Color = YELLOW;
    pub const SUSPICIOUS: Color = RED;
    pub const ERROR: Color = RED;
    pub const OK: Color = GREEN;
}

impl Printer {
    pub fn new() -> Self {
        let is_tty = stdout().is_tty();
        let style_enabled = !no_color_set();
        Self {
            is_tty,
            style_enabled,
        }
    }

    pub fn println(&self, content: impl Display) {
        self.println_styled(content, ContentStyle::default())
    }

    pub fn print(&self, content: impl Display) {
        self.print_styled(content, ContentStyle::default())
    }

    pub fn println_colored(&self, content: impl Display, color: Color) {
        let style = ContentStyle::default().with(color);
        self.println_styled(content, style)
    }

    pub fn print_colored(&self, content: impl Display, color: Color) {
        let style = ContentStyle::default().with(color);
        self.print_styled(content, style)
    }

    pub fn println_bold(&self, content: impl Display) {
        let mut style = ContentStyle::default();
        style.attributes.set(Attribute::Bold);
        self.println_styled(content, style)
    }

    pub fn println_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, true)
    }

    pub fn print_styled(&self, content: impl Display, style: ContentStyle) {
        self.do_styled_print(content, style, false)
    }

    pub fn print_divider(&self, width: usize) {
        self.println_colored(LINE_CHARACTER.repeat(width), color::GREY)
    }

    fn should_style(&self) -> bool {
        self.is_tty && self.style_enabled
    }

    fn do_styled_print(&self, content: impl Display, style: ContentStyle, with_nl: bool) {
        let should_style = self.should_style();
        with_stdout(|s| {
            if should_style {
                _ = queue!(s, PrintStyledContent(StyledContent::new(style, content)));
            } else {
                _ = queue!(s, Print(content));
            }
            if with_nl {
                _ = queue!(s, Print("\n"));
            }
        });
    }

    pub fn flush(&self) {
        with_stdout(|s| {
            _ = s.flush();
        })
    }
}

#[inline]
fn with_stdout<F: FnOnce(&mut Stdout)>(func: F) {
    let mut stdout = stdout();
    func(&mut stdout);
}
