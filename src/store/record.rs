//! Typed metadata records and per-field validation.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::normalize::{is_name_shaped, normalize_identity, normalize_text};
use crate::year::{YearSpec, MAX_YEAR, MIN_YEAR};

/// A metadata field.
///
/// Known fields are validated and stored typed; any other name becomes an
/// [`Field::Extension`] holding normalized text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    /// Document drafter (identity).
    Drafter,
    /// Approver (identity).
    Approver,
    /// Owning department.
    Department,
    /// Document title.
    Title,
    /// Document type, e.g. 품의서.
    DocType,
    /// Monetary amount in won.
    Amount,
    /// Drafting date.
    Date,
    /// Publication year.
    Year,
    /// Any other field, by lowercased name.
    Extension(String),
}

/// How a field's values are validated and canonicalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldClass {
    /// Person names, stored in normalized form.
    Identity,
    /// Free text, NFC-normalized and trimmed.
    Text,
    /// Unsigned amount.
    Monetary,
    /// Calendar date.
    Date,
    /// Four-digit year.
    Year,
}

const FIELD_NAMES: &[(Field, &[&str])] = &[
    (Field::Drafter, &["drafter", "author", "기안자"]),
    (Field::Approver, &["approver", "결재자"]),
    (Field::Department, &["department", "dept", "부서"]),
    (Field::Title, &["title", "제목"]),
    (Field::DocType, &["doc_type", "type", "문서종류"]),
    (Field::Amount, &["amount", "금액"]),
    (Field::Date, &["date", "기안일"]),
    (Field::Year, &["year", "연도"]),
];

impl Field {
    /// Resolve a field name or alias (case-insensitive).
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let key = normalize_text(name).to_lowercase();
        FIELD_NAMES
            .iter()
            .find(|(_, names)| names.contains(&key.as_str()))
            .map_or(Self::Extension(key), |(field, _)| field.clone())
    }

    /// Canonical name.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Drafter => "drafter",
            Self::Approver => "approver",
            Self::Department => "department",
            Self::Title => "title",
            Self::DocType => "doc_type",
            Self::Amount => "amount",
            Self::Date => "date",
            Self::Year => "year",
            Self::Extension(name) => name,
        }
    }

    /// Validation class.
    #[must_use]
    pub const fn class(&self) -> FieldClass {
        match self {
            Self::Drafter | Self::Approver => FieldClass::Identity,
            Self::Amount => FieldClass::Monetary,
            Self::Date => FieldClass::Date,
            Self::Year => FieldClass::Year,
            Self::Department | Self::Title | Self::DocType | Self::Extension(_) => {
                FieldClass::Text
            }
        }
    }

    /// Validate `raw` and convert it to this field's typed value.
    ///
    /// # Errors
    ///
    /// Returns the `ValidationError` for the field's class.
    pub fn canonicalize(
        &self,
        raw: &str,
        name_bounds: (usize, usize),
    ) -> Result<FieldValue, ValidationError> {
        let field = self.name().to_string();
        if field.is_empty() {
            return Err(ValidationError::EmptyValue {
                field: "<unnamed>".to_string(),
            });
        }
        let text = normalize_text(raw);
        if text.is_empty() {
            return Err(ValidationError::EmptyValue { field });
        }

        match self.class() {
            FieldClass::Text => Ok(FieldValue::Text(text)),
            FieldClass::Identity => {
                let normalized = normalize_identity(&text);
                if is_name_shaped(&normalized, name_bounds) {
                    Ok(FieldValue::Text(normalized))
                } else {
                    Err(ValidationError::InvalidName { field, value: text })
                }
            }
            FieldClass::Monetary => parse_amount(&text)
                .map(FieldValue::Amount)
                .ok_or(ValidationError::InvalidAmount { field, value: text }),
            FieldClass::Date => parse_date(&text)
                .map(FieldValue::Date)
                .ok_or(ValidationError::InvalidDate { field, value: text }),
            FieldClass::Year => {
                if text.len() != 4 || !text.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(ValidationError::InvalidDate { field, value: text });
                }
                let year: i32 = text
                    .parse()
                    .map_err(|_| ValidationError::InvalidDate {
                        field: field.clone(),
                        value: text.clone(),
                    })?;
                YearSpec::single(year)?;
                Ok(FieldValue::Year(year))
            }
        }
    }
}

impl From<String> for Field {
    fn from(name: String) -> Self {
        Self::parse(&name)
    }
}

impl From<&str> for Field {
    fn from(name: &str) -> Self {
        Self::parse(name)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.name().to_string()
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated field value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Text or normalized identity.
    Text(String),
    /// Amount in won.
    Amount(u64),
    /// Calendar date.
    Date(NaiveDate),
    /// Four-digit year.
    Year(i32),
}

impl FieldValue {
    /// The string this value is indexed under.
    #[must_use]
    pub fn index_key(&self) -> String {
        match self {
            Self::Text(s) => s.clone(),
            Self::Amount(n) => n.to_string(),
            Self::Date(d) => d.format("%Y-%m-%d").to_string(),
            Self::Year(y) => y.to_string(),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.index_key())
    }
}

/// Strip separators and currency marks, then parse as `u64`.
fn parse_amount(text: &str) -> Option<u64> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('₩').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('원').unwrap_or(trimmed);
    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '_') && !c.is_whitespace())
        .collect();
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Accepts `YYYY-MM-DD`, `YYYY.MM.DD`, `YYYY/MM/DD`, `YYYYMMDD` and
/// `YYYY년 M월 D일`, within the supported year range.
fn parse_date(text: &str) -> Option<NaiveDate> {
    let s = text.trim();
    let date = if s.len() == 8 && s.bytes().all(|b| b.is_ascii_digit()) {
        ymd(&s[..4], &s[4..6], &s[6..])
    } else if s.contains('년') {
        let compact: String = s.chars().filter(|c| !c.is_whitespace()).collect();
        let rest = compact.strip_suffix('일')?;
        let (y, rest) = rest.split_once('년')?;
        let (m, d) = rest.split_once('월')?;
        ymd(y, m, d)
    } else {
        ['-', '.', '/'].iter().find_map(|&sep| {
            let mut parts = s.split(sep);
            let (y, m, d) = (parts.next()?, parts.next()?, parts.next()?);
            if parts.next().is_some() {
                return None;
            }
            ymd(y, m, d)
        })
    }?;
    (MIN_YEAR..=MAX_YEAR).contains(&date.year()).then_some(date)
}

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    if y.len() != 4 || !(1..=2).contains(&m.len()) || !(1..=2).contains(&d.len()) {
        return None;
    }
    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !(all_digits(y) && all_digits(m) && all_digits(d)) {
        return None;
    }
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Metadata for one document, keyed by filename.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Primary key (document filename).
    pub key: String,
    /// Normalized drafter identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drafter: Option<String>,
    /// Normalized approver identity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver: Option<String>,
    /// Owning department.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    /// Document title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Document type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<String>,
    /// Amount in won.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    /// Drafting date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    /// Publication year, from `year` or derived from `date`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// Fields outside the known set, by lowercased name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extensions: BTreeMap<String, String>,
    /// Time of the last write to this record.
    pub last_updated: DateTime<Utc>,
}

impl MetadataRecord {
    /// An empty record for `key`.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            drafter: None,
            approver: None,
            department: None,
            title: None,
            doc_type: None,
            amount: None,
            date: None,
            year: None,
            extensions: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }

    /// Typed value of `field`, if set.
    #[must_use]
    pub fn value(&self, field: &Field) -> Option<FieldValue> {
        match field {
            Field::Drafter => self.drafter.clone().map(FieldValue::Text),
            Field::Approver => self.approver.clone().map(FieldValue::Text),
            Field::Department => self.department.clone().map(FieldValue::Text),
            Field::Title => self.title.clone().map(FieldValue::Text),
            Field::DocType => self.doc_type.clone().map(FieldValue::Text),
            Field::Amount => self.amount.map(FieldValue::Amount),
            Field::Date => self.date.map(FieldValue::Date),
            Field::Year => self.year.map(FieldValue::Year),
            Field::Extension(name) => self.extensions.get(name).cloned().map(FieldValue::Text),
        }
    }

    /// Index key of `field`, if set.
    #[must_use]
    pub fn get(&self, field: &Field) -> Option<String> {
        self.value(field).map(|v| v.index_key())
    }

    /// Store a validated value. Returns the previous index key.
    pub(crate) fn set(&mut self, field: &Field, value: FieldValue) -> Option<String> {
        let previous = self.get(field);
        match (field, value) {
            (Field::Drafter, FieldValue::Text(s)) => self.drafter = Some(s),
            (Field::Approver, FieldValue::Text(s)) => self.approver = Some(s),
            (Field::Department, FieldValue::Text(s)) => self.department = Some(s),
            (Field::Title, FieldValue::Text(s)) => self.title = Some(s),
            (Field::DocType, FieldValue::Text(s)) => self.doc_type = Some(s),
            (Field::Amount, FieldValue::Amount(n)) => self.amount = Some(n),
            (Field::Date, FieldValue::Date(d)) => self.date = Some(d),
            (Field::Year, FieldValue::Year(y)) => self.year = Some(y),
            (Field::Extension(name), value) => {
                self.extensions.insert(name.clone(), value.index_key());
            }
            // canonicalize never pairs a field with another class's value
            _ => return previous,
        }
        previous
    }

    /// Every set field with its index key.
    #[must_use]
    pub fn fields(&self) -> Vec<(Field, String)> {
        let known = FIELD_NAMES
            .iter()
            .filter_map(|(field, _)| self.get(field).map(|v| (field.clone(), v)));
        let extensions = self
            .extensions
            .iter()
            .map(|(name, v)| (Field::Extension(name.clone()), v.clone()));
        known.chain(extensions).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BOUNDS: (usize, usize) = (2, 4);

    #[test]
    fn test_field_names_and_aliases() {
        assert_eq!(Field::parse("Author"), Field::Drafter);
        assert_eq!(Field::parse(" 기안자 "), Field::Drafter);
        assert_eq!(Field::parse("dept"), Field::Department);
        assert_eq!(Field::parse("문서종류"), Field::DocType);
        assert_eq!(Field::parse("Project"), Field::Extension("project".to_string()));
        assert_eq!(Field::DocType.to_string(), "doc_type");
    }

    #[test]
    fn test_identity_fields_store_normalized_names() {
        let value = Field::Drafter.canonicalize("최새름 님", BOUNDS).unwrap();
        assert_eq!(value, FieldValue::Text("최새름".to_string()));
        let value = Field::Approver.canonicalize("Jay", BOUNDS).unwrap();
        assert_eq!(value, FieldValue::Text("jay".to_string()));

        let err = Field::Drafter.canonicalize("최새름 2팀", BOUNDS).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidName { .. }));
        assert_eq!(err.field(), Some("drafter"));
    }

    #[test]
    fn test_amounts() {
        let parse = |s: &str| Field::Amount.canonicalize(s, BOUNDS);
        assert_eq!(parse("1,200,000원").unwrap(), FieldValue::Amount(1_200_000));
        assert_eq!(parse("₩ 3_500").unwrap(), FieldValue::Amount(3500));
        assert_eq!(parse("42").unwrap().index_key(), "42");
        assert!(matches!(parse("-5"), Err(ValidationError::InvalidAmount { .. })));
        assert!(matches!(parse("12.5"), Err(ValidationError::InvalidAmount { .. })));
        assert!(matches!(parse("원"), Err(ValidationError::InvalidAmount { .. })));
    }

    #[test]
    fn test_dates() {
        let iso = |s: &str| Field::Date.canonicalize(s, BOUNDS).map(|v| v.index_key());
        assert_eq!(iso("2024-03-05").unwrap(), "2024-03-05");
        assert_eq!(iso("2024.3.5").unwrap(), "2024-03-05");
        assert_eq!(iso("2024/12/31").unwrap(), "2024-12-31");
        assert_eq!(iso("20240229").unwrap(), "2024-02-29");
        assert_eq!(iso("2024년 3월 5일").unwrap(), "2024-03-05");
        assert!(iso("2023-02-29").is_err());
        assert!(iso("2024-13-01").is_err());
        assert!(iso("1850-01-01").is_err());
        assert!(iso("next tuesday").is_err());
    }

    #[test]
    fn test_years() {
        assert_eq!(Field::Year.canonicalize("2024", BOUNDS).unwrap(), FieldValue::Year(2024));
        assert!(matches!(
            Field::Year.canonicalize("2150", BOUNDS),
            Err(ValidationError::YearOutOfRange { .. })
        ));
        assert!(Field::Year.canonicalize("24", BOUNDS).is_err());
    }

    #[test]
    fn test_empty_values_rejected() {
        let err = Field::Title.canonicalize("   ", BOUNDS).unwrap_err();
        assert_eq!(err, ValidationError::EmptyValue { field: "title".to_string() });
        assert!(Field::parse("").canonicalize("x", BOUNDS).is_err());
    }

    #[test]
    fn test_record_set_and_fields() {
        let mut record = MetadataRecord::new("a.hwp");
        assert_eq!(record.set(&Field::Title, FieldValue::Text("예산안".into())), None);
        assert_eq!(
            record.set(&Field::Title, FieldValue::Text("수정 예산안".into())),
            Some("예산안".to_string())
        );
        record.set(&Field::Extension("project".into()), FieldValue::Text("알파".into()));
        record.set(&Field::Year, FieldValue::Year(2024));

        let fields = record.fields();
        assert_eq!(fields.len(), 3);
        assert!(fields.contains(&(Field::Year, "2024".to_string())));
        assert!(fields.contains(&(Field::Extension("project".into()), "알파".to_string())));
    }

    #[test]
    fn test_record_serde_roundtrip() {
        let mut record = MetadataRecord::new("b.pdf");
        record.set(&Field::Date, FieldValue::Date(NaiveDate::from_ymd_opt(2023, 7, 1).unwrap()));
        record.set(&Field::Amount, FieldValue::Amount(5000));
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"date\":\"2023-07-01\""));
        let back: MetadataRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
