// Locate the transaction table inside a raw statement export

use encoding_rs::WINDOWS_1252;

use super::HeaderRule;
use crate::utils::normalize_text;

/// Decode a raw export into lines.
///
/// Exports are Windows-1252; NUL padding is dropped and form feeds (page
/// breaks in printed statements) become line breaks. Undecodable bytes are
/// replaced, never rejected.
pub fn decode_export(bytes: &[u8]) -> Vec<String> {
    let cleaned: Vec<u8> = bytes
        .iter()
        .filter(|&&b| b != 0x00)
        .map(|&b| if b == 0x0c { b'\n' } else { b })
        .collect();

    let (text, _, had_errors) = WINDOWS_1252.decode(&cleaned);
    if had_errors {
        tracing::debug!("Statement contained undecodable bytes; replaced");
    }

    text.lines().map(|l| l.to_string()).collect()
}

/// Index of the first line satisfying `rule`
pub fn find_header_row(lines: &[String], rule: &HeaderRule) -> Option<usize> {
    lines
        .iter()
        .position(|line| rule.matches(&normalize_text(line)))
}
