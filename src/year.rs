//! Publication-year extraction.
//!
//! Years are recognized in four notations, tried in a fixed order with the
//! first match winning:
//! 1. relative terms (`재작년`, `작년`, `올해`)
//! 2. ranges (`2023~2025`, `23-25`, `2021년 → 2023년`, `2020 to 2022`)
//! 3. a four-digit year (`2024`, `2024년`, `2024.03.15`, `2024-03`, `20240315`, `202403`)
//! 4. a two-digit year (`24년`, `'24`, or a bare `24` as a whole input)
//!
//! Two-digit years are expanded with a rolling window around the reference
//! year, see [`expand_two_digit`].

use std::fmt;
use std::ops::RangeInclusive;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Smallest year accepted anywhere in the crate.
pub const MIN_YEAR: i32 = 1900;

/// Largest year accepted anywhere in the crate.
pub const MAX_YEAR: i32 = 2100;

/// How far past the reference year a two-digit year may land.
const WINDOW_AHEAD: i32 = 20;

/// Relative terms, longest first since `재작년` contains `작년`.
const RELATIVE_TERMS: [(&str, i32); 3] = [("재작년", 2), ("작년", 1), ("올해", 0)];

const CONNECTOR_CHARS: [char; 7] = ['-', '–', '—', '~', '～', '〜', '→'];

const DATE_SEPARATORS: [char; 3] = ['-', '.', '/'];

/// A publication year or an inclusive range of years.
///
/// # Examples
///
/// ```
/// use doclens::YearSpec;
///
/// let spec = YearSpec::ordered(2025, 2023).unwrap();
/// assert_eq!(spec.to_string(), "2023-2025");
/// assert!(spec.contains(2024));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum YearSpec {
    /// A single year.
    Single(i32),
    /// An inclusive range with `low < high`.
    Range {
        /// First year of the range.
        low: i32,
        /// Last year of the range.
        high: i32,
    },
}

impl YearSpec {
    /// Creates a single-year spec.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::YearOutOfRange` outside `[MIN_YEAR, MAX_YEAR]`.
    pub fn single(year: i32) -> Result<Self, ValidationError> {
        check_bounds(year)?;
        Ok(Self::Single(year))
    }

    /// Creates a range spec. Equal endpoints collapse to a single year.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidYearRange` if `low > high`, or
    /// `YearOutOfRange` if either endpoint is out of bounds.
    pub fn range(low: i32, high: i32) -> Result<Self, ValidationError> {
        check_bounds(low)?;
        check_bounds(high)?;
        match low.cmp(&high) {
            std::cmp::Ordering::Greater => Err(ValidationError::InvalidYearRange { low, high }),
            std::cmp::Ordering::Equal => Ok(Self::Single(low)),
            std::cmp::Ordering::Less => Ok(Self::Range { low, high }),
        }
    }

    /// Creates a range from two endpoints given in any order.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::YearOutOfRange` if either endpoint is out of bounds.
    pub fn ordered(a: i32, b: i32) -> Result<Self, ValidationError> {
        Self::range(a.min(b), a.max(b))
    }

    /// First year covered.
    #[must_use]
    pub const fn low(&self) -> i32 {
        match *self {
            Self::Single(y) => y,
            Self::Range { low, .. } => low,
        }
    }

    /// Last year covered.
    #[must_use]
    pub const fn high(&self) -> i32 {
        match *self {
            Self::Single(y) => y,
            Self::Range { high, .. } => high,
        }
    }

    /// Check if `year` falls within this spec.
    #[must_use]
    pub const fn contains(&self, year: i32) -> bool {
        year >= self.low() && year <= self.high()
    }

    /// Every year covered, ascending.
    #[must_use]
    pub const fn years(&self) -> RangeInclusive<i32> {
        self.low()..=self.high()
    }

    /// True for a range of more than one year.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        matches!(self, Self::Range { .. })
    }
}

impl fmt::Display for YearSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(y) => write!(f, "{y}"),
            Self::Range { low, high } => write!(f, "{low}-{high}"),
        }
    }
}

impl From<YearSpec> for String {
    fn from(value: YearSpec) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for YearSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        let parse = |s: &str| {
            s.trim()
                .parse::<i32>()
                .map_err(|_| format!("invalid year: {s}"))
        };
        let spec = match value.split_once('-') {
            Some((low, high)) => Self::range(parse(low)?, parse(high)?),
            None => Self::single(parse(value)?),
        };
        spec.map_err(|e| e.to_string())
    }
}

fn check_bounds(year: i32) -> Result<(), ValidationError> {
    if (MIN_YEAR..=MAX_YEAR).contains(&year) {
        Ok(())
    } else {
        Err(ValidationError::YearOutOfRange {
            year,
            min: MIN_YEAR,
            max: MAX_YEAR,
        })
    }
}

/// Expand a two-digit year against `reference_year`.
///
/// The result lands in the century of the reference year, moved back one
/// century if it would be more than 20 years ahead, and forward one century
/// if it would precede `MIN_YEAR`.
///
/// ```
/// use doclens::year::expand_two_digit;
///
/// assert_eq!(expand_two_digit(24, 2025), 2024);
/// assert_eq!(expand_two_digit(45, 2025), 2045);
/// assert_eq!(expand_two_digit(46, 2025), 1946);
/// ```
#[must_use]
pub const fn expand_two_digit(yy: u32, reference_year: i32) -> i32 {
    let century = reference_year.div_euclid(100) * 100;
    #[allow(clippy::cast_possible_wrap)]
    let mut candidate = century + (yy % 100) as i32;
    if candidate > reference_year + WINDOW_AHEAD {
        candidate -= 100;
    }
    if candidate < MIN_YEAR {
        candidate += 100;
    }
    candidate
}

/// Maximal run of ASCII digits at `[start, end)` in a char buffer.
#[derive(Debug, Clone, Copy)]
struct DigitRun {
    start: usize,
    end: usize,
    value: u32,
}

impl DigitRun {
    const fn len(&self) -> usize {
        self.end - self.start
    }
}

fn digit_runs(chars: &[char]) -> Vec<DigitRun> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        if !chars[i].is_ascii_digit() {
            i += 1;
            continue;
        }
        let start = i;
        let mut value: u32 = 0;
        while i < chars.len() && chars[i].is_ascii_digit() {
            let digit = chars[i].to_digit(10).unwrap_or(0);
            value = value.saturating_mul(10).saturating_add(digit);
            i += 1;
        }
        runs.push(DigitRun {
            start,
            end: i,
            value,
        });
    }
    runs
}

/// Extracts a [`YearSpec`] from normalized query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearResolver {
    reference_year: i32,
}

impl YearResolver {
    /// Creates a resolver anchored at `reference_year` (the "current" year).
    #[must_use]
    pub const fn new(reference_year: i32) -> Self {
        Self { reference_year }
    }

    /// The year relative terms and two-digit windowing resolve against.
    #[must_use]
    pub const fn reference_year(&self) -> i32 {
        self.reference_year
    }

    /// Resolve the first year expression in `text`.
    #[must_use]
    pub fn resolve(&self, text: &str) -> Option<YearSpec> {
        let chars: Vec<char> = text.chars().collect();
        let runs = digit_runs(&chars);

        self.resolve_relative(text)
            .or_else(|| self.resolve_range(&chars, &runs))
            .or_else(|| resolve_four_digit(&chars, &runs))
            .or_else(|| self.resolve_two_digit(&chars, &runs))
    }

    fn resolve_relative(&self, text: &str) -> Option<YearSpec> {
        RELATIVE_TERMS
            .iter()
            .find(|(term, _)| text.contains(term))
            .and_then(|(_, back)| YearSpec::single(self.reference_year - back).ok())
    }

    fn expand_token(&self, run: DigitRun) -> Option<i32> {
        match run.len() {
            #[allow(clippy::cast_possible_wrap)]
            4 => Some(run.value as i32),
            2 => Some(expand_two_digit(run.value, self.reference_year)),
            _ => None,
        }
    }

    fn resolve_range(&self, chars: &[char], runs: &[DigitRun]) -> Option<YearSpec> {
        for pair in runs.windows(2) {
            let (left, right) = (pair[0], pair[1]);
            if !matches!(left.len(), 2 | 4) || !matches!(right.len(), 2 | 4) {
                continue;
            }
            if is_date_continuation_before(chars, left.start)
                || is_date_continuation_after(chars, right.end)
                || is_year_month(chars, left, right)
            {
                continue;
            }
            if !joined_by_connector(chars, left.end, right.start) {
                continue;
            }
            let (Some(a), Some(b)) = (self.expand_token(left), self.expand_token(right)) else {
                continue;
            };
            if let Ok(spec) = YearSpec::ordered(a, b) {
                return Some(spec);
            }
        }
        None
    }

    fn resolve_two_digit(&self, chars: &[char], runs: &[DigitRun]) -> Option<YearSpec> {
        let trimmed_len = chars.iter().filter(|c| !c.is_whitespace()).count();
        runs.iter()
            .filter(|run| run.len() == 2)
            .find(|run| {
                let followed_by_year = chars.get(run.end) == Some(&'년');
                let after_apostrophe = run
                    .start
                    .checked_sub(1)
                    .is_some_and(|i| matches!(chars[i], '\'' | '’'));
                followed_by_year || after_apostrophe || trimmed_len == 2
            })
            .and_then(|run| YearSpec::single(expand_two_digit(run.value, self.reference_year)).ok())
    }
}

fn resolve_four_digit(chars: &[char], runs: &[DigitRun]) -> Option<YearSpec> {
    runs.iter().find_map(|run| match run.len() {
        4 => year_digits(&chars[run.start..run.end]).and_then(|y| YearSpec::single(y).ok()),
        // YYYYMM, unless it is an amount.
        6 if chars.get(run.end) != Some(&'원') => {
            let month = digits_value(&chars[run.start + 4..run.end]);
            year_digits(&chars[run.start..run.start + 4])
                .filter(|_| (1..=12).contains(&month))
                .and_then(|y| YearSpec::single(y).ok())
        }
        8 => {
            let digits: String = chars[run.start..run.end].iter().collect();
            NaiveDate::parse_from_str(&digits, "%Y%m%d")
                .ok()
                .and_then(|date| YearSpec::single(chrono::Datelike::year(&date)).ok())
        }
        _ => None,
    })
}

/// Four digits starting `19` or `20`, or exactly `2100`.
fn year_digits(digits: &[char]) -> Option<i32> {
    let value = digits_value(digits);
    let is_year = matches!(digits, ['1', '9', ..] | ['2', '0', ..]) || value == 2100;
    #[allow(clippy::cast_possible_wrap)]
    let year = value as i32;
    is_year.then_some(year)
}

fn digits_value(digits: &[char]) -> u32 {
    digits
        .iter()
        .filter_map(|c| c.to_digit(10))
        .fold(0, |acc, d| acc * 10 + d)
}

/// `2024-03`: a four-digit year, a date separator with no spacing, and a
/// two-digit month.
fn is_year_month(chars: &[char], left: DigitRun, right: DigitRun) -> bool {
    left.len() == 4
        && right.len() == 2
        && right.start == left.end + 1
        && DATE_SEPARATORS.contains(&chars[left.end])
        && (1..=12).contains(&right.value)
}

/// Whether `chars[from..to]` is an optional `년`, optional whitespace, one
/// connector, and optional whitespace.
fn joined_by_connector(chars: &[char], from: usize, to: usize) -> bool {
    let between: String = chars[from..to].iter().collect();
    let between = between.strip_prefix('년').unwrap_or(&between).trim();
    if between == "->" || between.eq_ignore_ascii_case("to") {
        return true;
    }
    let mut it = between.chars();
    matches!((it.next(), it.next()), (Some(c), None) if CONNECTOR_CHARS.contains(&c))
}

/// `2024-03-15`: the run at `end` is followed by a separator and a digit.
fn is_date_continuation_after(chars: &[char], end: usize) -> bool {
    matches!(
        (chars.get(end), chars.get(end + 1)),
        (Some(sep), Some(d)) if DATE_SEPARATORS.contains(sep) && d.is_ascii_digit()
    )
}

/// `03-15` inside `2024-03-15`: the run at `start` is preceded by a digit and
/// a separator.
fn is_date_continuation_before(chars: &[char], start: usize) -> bool {
    start >= 2 && DATE_SEPARATORS.contains(&chars[start - 1]) && chars[start - 2].is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at_2025(text: &str) -> Option<YearSpec> {
        YearResolver::new(2025).resolve(text)
    }

    #[test]
    fn test_every_four_digit_year_with_suffix() {
        for year in MIN_YEAR..=MAX_YEAR {
            assert_eq!(
                at_2025(&format!("{year}년")),
                Some(YearSpec::Single(year)),
                "year {year}"
            );
        }
    }

    #[test]
    fn test_two_digit_window_at_2025() {
        assert_eq!(expand_two_digit(24, 2025), 2024);
        assert_eq!(expand_two_digit(96, 2025), 1996);
        assert_eq!(expand_two_digit(45, 2025), 2045);
        assert_eq!(expand_two_digit(46, 2025), 1946);
        assert_eq!(expand_two_digit(0, 2025), 2000);
    }

    #[test]
    fn test_two_digit_window_low_reference() {
        // 1905 + 20 = 1925: 30 falls back to 1830 and is lifted to 1930.
        assert_eq!(expand_two_digit(30, 1905), 1930);
    }

    #[test]
    fn test_two_digit_notations() {
        assert_eq!(at_2025("24년 보고서"), Some(YearSpec::Single(2024)));
        assert_eq!(at_2025("'96 archive"), Some(YearSpec::Single(1996)));
        assert_eq!(at_2025("24"), Some(YearSpec::Single(2024)));
        assert_eq!(at_2025("문서 24 건"), None);
    }

    #[test]
    fn test_range_is_ordered() {
        assert_eq!(
            at_2025("2025~23"),
            Some(YearSpec::Range {
                low: 2023,
                high: 2025
            })
        );
        assert_eq!(
            at_2025("2021년 → 2023년 기안"),
            Some(YearSpec::Range {
                low: 2021,
                high: 2023
            })
        );
        assert_eq!(
            at_2025("from 2019 to 2020"),
            Some(YearSpec::Range {
                low: 2019,
                high: 2020
            })
        );
        assert_eq!(
            at_2025("22 -> 24"),
            Some(YearSpec::Range {
                low: 2022,
                high: 2024
            })
        );
    }

    #[test]
    fn test_range_out_of_bounds_is_rejected() {
        // 1000 is not a year, and neither side qualifies on its own.
        assert_eq!(at_2025("1000-1500"), None);
    }

    #[test]
    fn test_calendar_dates_yield_single_year() {
        assert_eq!(at_2025("2024-03-15 회의록"), Some(YearSpec::Single(2024)));
        assert_eq!(at_2025("2023.11.02"), Some(YearSpec::Single(2023)));
        assert_eq!(at_2025("20220704"), Some(YearSpec::Single(2022)));
    }

    #[test]
    fn test_year_month_is_a_single_year() {
        assert_eq!(at_2025("2024-03 보고서"), Some(YearSpec::Single(2024)));
        assert_eq!(at_2025("2024/11 결산"), Some(YearSpec::Single(2024)));
        assert_eq!(at_2025("202403 보고서"), Some(YearSpec::Single(2024)));
        // Not a month, so still a range.
        assert_eq!(
            at_2025("2022-23"),
            Some(YearSpec::Range {
                low: 2022,
                high: 2023
            })
        );
        assert_eq!(at_2025("202413 보고서"), None);
    }

    #[test]
    fn test_amounts_are_not_years() {
        assert_eq!(at_2025("2000000원 지출"), None);
        assert_eq!(at_2025("201005원 지출"), None);
    }

    #[test]
    fn test_relative_terms_use_reference_year() {
        let resolver = YearResolver::new(2030);
        assert_eq!(resolver.resolve("올해 예산"), Some(YearSpec::Single(2030)));
        assert_eq!(resolver.resolve("작년 예산"), Some(YearSpec::Single(2029)));
        assert_eq!(resolver.resolve("재작년 예산"), Some(YearSpec::Single(2028)));
    }

    #[test]
    fn test_relative_term_wins_over_digits() {
        assert_eq!(at_2025("작년 2020년"), Some(YearSpec::Single(2024)));
    }

    #[test]
    fn test_year_spec_validation() {
        assert!(YearSpec::single(1899).is_err());
        assert!(YearSpec::range(2025, 2023).is_err());
        assert_eq!(YearSpec::range(2024, 2024), Ok(YearSpec::Single(2024)));
        assert_eq!(YearSpec::ordered(2025, 2023).unwrap().years().count(), 3);
    }

    #[test]
    fn test_year_spec_serde() {
        let spec = YearSpec::ordered(2023, 2025).unwrap();
        let json = serde_json::to_string(&spec).unwrap();
        assert_eq!(json, "\"2023-2025\"");
        let back: YearSpec = serde_json::from_str(&json).unwrap();
        assert_eq!(back, spec);
        assert!(serde_json::from_str::<YearSpec>("\"2500\"").is_err());
    }
}
