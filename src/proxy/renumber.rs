//! Channel renumbering policy

use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use crate::config::RenumberMode;

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("leading number regex")
});

/// New channel number for the channel at `position` (zero-based, per document)
///
/// `None` means the channel has no number and none was assigned.
pub fn renumber(mode: &RenumberMode, current: Option<&str>, position: usize) -> Option<String> {
    match mode {
        RenumberMode::None => current.map(str::to_string),
        RenumberMode::StartingIndex { start_from } => {
            Some(format_number(start_from + position as f64))
        }
        RenumberMode::Addition { add_value } => {
            let current = current?;
            match parse_leading_number(current) {
                Some(number) => Some(format_number(number + add_value)),
                None => {
                    trace!("Channel number '{}' is not numeric, leaving as is", current);
                    Some(current.to_string())
                }
            }
        }
    }
}

/// Parse the numeric prefix of a channel number, so "5" and "5.1 HD" both yield a value
pub fn parse_leading_number(value: &str) -> Option<f64> {
    let found = LEADING_NUMBER.find(value.trim_start())?;
    found.as_str().parse::<f64>().ok()
}

/// Render a channel number the way it is written in playlists: no trailing ".0"
pub fn format_number(value: f64) -> String {
    if value == 0.0 {
        "0".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else {
        value.to_string()
    }
}
