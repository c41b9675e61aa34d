//! Terminal text layout: escape stripping, display width, truncation and
//! padding, plus the few escape sequences the tool emits itself.
//!
//! Width measurement is a fixed approximation (emoji and pictograph ranges
//! count as two columns) rather than a full Unicode width algorithm, so
//! table columns line up the same way on every run.

use std::io::{self, IsTerminal};

const ESC: char = '\x1b';
const BEL: char = '\x07';

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const DIM_GRAY: &str = "\x1b[90m";

pub const ELLIPSIS: &str = "...";

/// Output capabilities, decided once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Style {
    pub color: bool,
    pub hyperlinks: bool,
}

impl Style {
    pub const PLAIN: Style = Style {
        color: false,
        hyperlinks: false,
    };

    /// Colour and OSC-8 links are used only when stdout is a terminal and
    /// neither `--no-color` nor `NO_COLOR` asks otherwise.
    pub fn detect(no_color: bool) -> Self {
        let no_color_env = std::env::var("NO_COLOR").is_ok_and(|v| !v.is_empty());
        let enabled = !no_color && !no_color_env && io::stdout().is_terminal();
        Self {
            color: enabled,
            hyperlinks: enabled,
        }
    }
}

fn is_final_byte(c: char) -> bool {
    ('\x40'..='\x7e').contains(&c)
}

/// `ESC` followed by one of these is a complete two-byte sequence.
fn is_two_byte_escape(c: char) -> bool {
    c != '[' && ('\x30'..='\x7e').contains(&c)
}

/// Removes CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ESC \`) sequences.
/// Two-byte escapes such as `ESC M` drop only the introducer.
///
/// Unterminated sequences are dropped up to the end of input. A lone `ESC`
/// at the very end is kept.
pub fn strip_escape_sequences(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();

    while let Some(c) = chars.next() {
        if c != ESC {
            out.push(c);
            continue;
        }

        match chars.next() {
            None => out.push(ESC),
            Some(']') => {
                while let Some(c) = chars.next() {
                    if c == BEL {
                        break;
                    }
                    if c == ESC && chars.peek() == Some(&'\\') {
                        chars.next();
                        break;
                    }
                }
            }
            Some(c) if is_two_byte_escape(c) => {}
            // CSI, or an escape with intermediate bytes: skip to the final byte.
            Some(_) => {
                for c in chars.by_ref() {
                    if is_final_byte(c) {
                        break;
                    }
                }
            }
        }
    }

    out
}

/// Column width of a single code point under the layout approximation.
pub fn char_width(c: char) -> usize {
    match c as u32 {
        0x1F600..=0x1F64F // emoticons
        | 0x1F300..=0x1F5FF // symbols and pictographs
        | 0x1F680..=0x1F6FF // transport and map
        | 0x1F7E0..=0x1F7EB // coloured circles and squares
        | 0x1F1E0..=0x1F1FF // regional indicators
        | 0x2600..=0x26FF // misc symbols
        | 0x2700..=0x27BF // dingbats
        | 0x200D // zero-width joiner
        | 0xFE0F => 2,
        0x09 => 1,
        cp if cp < 0x20 => 0,
        _ => 1,
    }
}

/// Number of terminal columns `s` occupies once escapes are removed.
pub fn display_width(s: &str) -> usize {
    strip_escape_sequences(s).chars().map(char_width).sum()
}

/// Shortens `s` to at most `max_width` columns, ending in `...`.
///
/// Widths of three or less keep the first `max_width` code points and add no
/// ellipsis.
pub fn truncate(s: &str, max_width: usize) -> String {
    if display_width(s) <= max_width {
        return s.to_string();
    }

    if max_width <= ELLIPSIS.len() {
        return s.chars().take(max_width).collect();
    }

    let target = max_width - ELLIPSIS.len();
    let mut out = String::new();
    let mut width = 0;
    for c in s.chars() {
        let w = char_width(c);
        if width + w > target {
            break;
        }
        width += w;
        out.push(c);
    }
    out.push_str(ELLIPSIS);
    out
}

/// Right-pads `s` with spaces to `width` columns. Never shortens.
pub fn pad(s: &str, width: usize) -> String {
    let current = display_width(s);
    if current >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - current))
}

/// Renders `#N`, wrapped in an OSC-8 hyperlink to `url` when enabled.
pub fn format_pr_link(url: &str, pr_number: u64, style: Style) -> String {
    if !style.hyperlinks {
        return format!("#{pr_number}");
    }
    format!("\x1b]8;;{url}\x1b\\#{pr_number}\x1b]8;;\x1b\\")
}

pub fn bold(s: &str, style: Style) -> String {
    paint(s, BOLD, style)
}

pub fn red(s: &str, style: Style) -> String {
    paint(s, RED, style)
}

pub fn green(s: &str, style: Style) -> String {
    paint(s, GREEN, style)
}

pub fn yellow(s: &str, style: Style) -> String {
    paint(s, YELLOW, style)
}

fn paint(s: &str, code: &str, style: Style) -> String {
    if style.color {
        format!("{code}{s}{RESET}")
    } else {
        s.to_string()
    }
}

fn diff_line_color(line: &str) -> Option<&'static str> {
    let color = if line.starts_with("diff --git") {
        "\x1b[1m\x1b[37m"
    } else if line.starts_with("index ") {
        DIM_GRAY
    } else if line.starts_with("--- ") {
        RED
    } else if line.starts_with("+++ ") {
        GREEN
    } else if line.starts_with("@@") {
        CYAN
    } else if line.starts_with('+') {
        GREEN
    } else if line.starts_with('-') {
        RED
    } else if line.starts_with("new file mode") {
        GREEN
    } else if line.starts_with("deleted file mode") {
        RED
    } else if line.starts_with("rename from") || line.starts_with("rename to") {
        YELLOW
    } else if line.starts_with("similarity index") || line.starts_with("dissimilarity index") {
        DIM_GRAY
    } else {
        return None;
    };
    Some(color)
}

/// Applies git-style colours to a unified diff, line by line.
pub fn colorize_diff(diff: &str) -> String {
    diff.split('\n')
        .map(|line| match diff_line_color(line) {
            Some(color) => format!("{color}{line}{RESET}"),
            None => line.to_string(),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Human-friendly age of an ISO-8601 timestamp ("3 days ago").
pub fn format_relative_time(timestamp: &str) -> Option<String> {
    use chrono::{DateTime, Utc};
    use chrono_humanize::HumanTime;

    let time = DateTime::parse_from_rfc3339(timestamp)
        .ok()?
        .with_timezone(&Utc);
    Some(HumanTime::from(time).to_string())
}

/// Title column width for a terminal of `columns` columns.
pub fn title_width_for(columns: Option<usize>, fixed_columns: usize) -> usize {
    const DEFAULT: usize = 41;
    const MIN: usize = 20;
    const MAX: usize = 80;

    match columns {
        Some(columns) => columns.saturating_sub(fixed_columns).clamp(MIN, MAX),
        None => DEFAULT,
    }
}

/// Terminal width in columns when stdout is a terminal.
pub fn terminal_columns() -> Option<usize> {
    if io::stdout().is_terminal() {
        terminal_size::terminal_size().map(|(w, _)| w.0 as usize)
    } else {
        None
    }
}
