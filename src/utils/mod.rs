//! Locale-aware parsing and formatting helpers
//!
//! Bank and POS exports in Portugal write amounts with comma decimals, dot
//! thousands separators and assorted spreadsheet artifacts. Everything that
//! turns those strings into exact decimals or dates lives here, together with
//! the display formatting used by the CLI.

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;
use unicode_normalization::{char::is_combining_mark, UnicodeNormalization};

/// Parse a free-form Portuguese-locale amount into an exact decimal.
///
/// Returns `None` for anything that does not resolve to a number; callers
/// treat that as missing data, never as a fatal error. No rounding happens
/// here, see [`round_money`].
///
/// # Examples
/// ```
/// use conciliador::utils::parse_locale_amount;
/// use rust_decimal_macros::dec;
///
/// assert_eq!(parse_locale_amount("1.736,10"), Some(dec!(1736.10)));
/// assert_eq!(parse_locale_amount("771\",15"), Some(dec!(771.15)));
/// assert_eq!(parse_locale_amount("123 45"), Some(dec!(123.45)));
/// assert_eq!(parse_locale_amount("-45,30"), Some(dec!(-45.30)));
/// assert_eq!(parse_locale_amount("abc"), None);
/// ```
pub fn parse_locale_amount(raw: &str) -> Option<Decimal> {
    let cleaned: String = raw
        .replace("EUR", "")
        .replace("R$", "")
        .chars()
        .filter(|c| !matches!(c, '€' | '"' | '=' | '\''))
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();

    let trimmed = cleaned.trim();
    if trimmed.is_empty() {
        return None;
    }

    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, trimmed),
    };

    // Tabs and runs of spaces collapse to a single space
    let collapsed = body.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut s = collapsed.replace(',', ".");

    // 1.736.10 -> 1736.10: every dot but the last is a thousands separator
    if s.matches('.').count() > 1 {
        if let Some((integer, decimals)) = s.rsplit_once('.') {
            s = format!("{}.{}", integer.replace('.', ""), decimals);
        }
    }

    // 123 45 -> 123.45 (decimal rendered as a stray space or tab)
    if let Some((integer, decimals)) = space_decimal_parts(&s) {
        s = format!("{}.{}", integer.replace('.', ""), decimals);
    }

    let s = s.replace(' ', "");
    let value = Decimal::from_str(&s).ok()?;

    Some(if negative { -value } else { value })
}

/// Split `digits SPACE 1-2digits`, allowing dot thousands on the left side.
fn space_decimal_parts(s: &str) -> Option<(&str, &str)> {
    let (integer, decimals) = s.split_once(' ')?;
    let integer_ok = integer.starts_with(|c: char| c.is_ascii_digit())
        && integer.chars().all(|c| c.is_ascii_digit() || c == '.');
    let decimals_ok =
        (1..=2).contains(&decimals.len()) && decimals.chars().all(|c| c.is_ascii_digit());

    (integer_ok && decimals_ok).then_some((integer, decimals))
}

/// Round to two fractional digits for persistence.
pub fn round_money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// Tolerance used when comparing amounts that went through repeated conversions
pub fn amounts_match(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() < Decimal::new(1, 2)
}

/// Field order of a textual date
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum DateOrder {
    DayFirst,
    YearFirst,
}

/// Parse a date written as `dd-mm-yyyy`, `dd/mm/yy`, `dd.mm.yyyy` or ISO.
///
/// A four-digit leading field is always read as the year, whatever the
/// configured order; two-digit years are taken as 20xx. A trailing time
/// component (`05-01-2025 00:00:00`) is ignored.
pub fn parse_date(raw: &str, order: DateOrder) -> Option<NaiveDate> {
    let token = raw.split_whitespace().next()?;
    let token = token.trim_matches('"');
    let parts: Vec<&str> = token.split(['-', '/', '.']).collect();
    if parts.len() != 3 || parts.iter().any(|p| p.is_empty()) {
        return None;
    }

    let numbers: Vec<u32> = parts
        .iter()
        .map(|p| p.parse::<u32>().ok())
        .collect::<Option<Vec<_>>>()?;

    let (year_raw, year_len, month, day) = if parts[0].len() == 4 || order == DateOrder::YearFirst
    {
        (numbers[0], parts[0].len(), numbers[1], numbers[2])
    } else {
        (numbers[2], parts[2].len(), numbers[1], numbers[0])
    };

    let year = match year_len {
        2 => 2000 + year_raw as i32,
        4 => year_raw as i32,
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

/// Case-fold, strip diacritics and drop everything but ASCII letters/digits.
///
/// Used to compare header rows and descriptions across export encodings:
/// `"Descrição"` and `"DESCRICAO"` both normalize to `"descricao"`.
pub fn normalize_text(input: &str) -> String {
    input
        .to_lowercase()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .filter(|ch| ch.is_ascii_alphanumeric())
        .collect()
}

/// Case-fold and strip diacritics like [`normalize_text`], but keep word
/// boundaries: `"TRF SDT-PAGAMENTO"` becomes `["trf", "sdt", "pagamento"]`.
pub fn normalize_words(input: &str) -> Vec<String> {
    let folded: String = input
        .to_lowercase()
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .collect();
    folded
        .split(|ch: char| !ch.is_ascii_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `phrase` occurs in `words` as consecutive whole words.
///
/// A word may carry a trailing run of digits (`tpa0000992577` matches
/// `tpa`). An empty phrase never matches.
pub fn contains_phrase(words: &[String], phrase: &[String]) -> bool {
    if phrase.is_empty() || phrase.len() > words.len() {
        return false;
    }
    words.windows(phrase.len()).any(|window| {
        window.iter().zip(phrase).all(|(word, expected)| {
            word.strip_prefix(expected.as_str())
                .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit()))
        })
    })
}

/// Currency symbol options for formatting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CurrencySymbol {
    /// Append " €"
    Eur,
    /// No currency symbol (table cells)
    None,
}

/// Format a decimal using Portuguese conventions: `1.234,56 €`.
///
/// # Examples
/// ```
/// use conciliador::utils::{format_currency_with_width, CurrencySymbol};
/// use rust_decimal_macros::dec;
///
/// assert_eq!(
///     format_currency_with_width(dec!(1234.56), 0, CurrencySymbol::Eur),
///     "1.234,56 €"
/// );
/// assert_eq!(
///     format_currency_with_width(dec!(1234), 12, CurrencySymbol::None),
///     "    1.234,00"
/// );
/// ```
pub fn format_currency_with_width(value: Decimal, width: usize, symbol: CurrencySymbol) -> String {
    let is_negative = value < Decimal::ZERO;
    let formatted = round_money(value.abs()).to_string();
    let (integer_part, decimal_part) = formatted.split_once('.').unwrap_or((&formatted, "00"));

    let with_separators: String = integer_part
        .chars()
        .rev()
        .enumerate()
        .flat_map(|(i, c)| {
            if i > 0 && i % 3 == 0 {
                vec![c, '.']
            } else {
                vec![c]
            }
        })
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    let sign = if is_negative { "-" } else { "" };
    let suffix = match symbol {
        CurrencySymbol::Eur => " €",
        CurrencySymbol::None => "",
    };

    let result = format!("{}{},{}{}", sign, with_separators, decimal_part, suffix);

    let visible = result.chars().count();
    if width > visible {
        format!("{}{}", " ".repeat(width - visible), result)
    } else {
        result
    }
}

/// Format as euro: "1.234,56 €"
pub fn format_currency(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::Eur)
}

/// Format number only: "1.234,56"
pub fn format_decimal_pt(value: Decimal) -> String {
    format_currency_with_width(value, 0, CurrencySymbol::None)
}
