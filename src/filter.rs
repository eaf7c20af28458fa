//! Query filter extraction.
//!
//! [`QueryParser::parse_filters`] turns a free-text query into a
//! [`FilterResult`]: an optional year, an optional drafter identity, and the
//! path that produced the identity.

use std::fmt;

use chrono::{Datelike, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::ParserConfig;
use crate::directive::DirectiveScanner;
use crate::error::LensResult;
use crate::identity::IdentityResolver;
use crate::normalize::normalize_text;
use crate::year::{YearResolver, YearSpec};

/// How a filter was obtained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    /// An explicit `key:value` directive.
    Token,
    /// Exact match against the known identity set.
    ClosedWorld,
    /// Fuzzy match against the known identity set.
    Fuzzy,
    /// No identity was resolved.
    #[default]
    None,
}

impl Provenance {
    /// Wire name, as serialized.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::ClosedWorld => "closed_world",
            Self::Fuzzy => "fuzzy",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters extracted from one query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Year or year range, if the query names one.
    pub year: Option<YearSpec>,
    /// Canonical drafter identity, if one was resolved.
    pub identity: Option<String>,
    /// How the filter was obtained.
    pub provenance: Provenance,
}

impl FilterResult {
    /// True when the query carries no filter at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.year.is_none() && self.identity.is_none()
    }
}

/// Extracts year and identity filters from free-text queries.
///
/// # Examples
///
/// ```
/// use chrono::NaiveDate;
/// use doclens::{ParserConfig, Provenance, QueryParser, YearSpec};
///
/// let parser = QueryParser::new(["최새름", "김민수"], ParserConfig::default())
///     .unwrap()
///     .with_reference_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());
///
/// let filters = parser.parse_filters("2024년 최새름 기안 문서");
/// assert_eq!(filters.year, Some(YearSpec::Single(2024)));
/// assert_eq!(filters.identity.as_deref(), Some("최새름"));
/// assert_eq!(filters.provenance, Provenance::ClosedWorld);
/// ```
#[derive(Debug, Clone)]
pub struct QueryParser {
    identities: IdentityResolver,
    directives: DirectiveScanner,
    reference_date: Option<NaiveDate>,
}

impl QueryParser {
    /// Build a parser over a closed set of canonical identities.
    ///
    /// # Errors
    ///
    /// Returns a validation error if `config` is out of range or a directive
    /// override does not compile.
    pub fn new<I, S>(identities: I, config: ParserConfig) -> LensResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let config = config.validate()?;
        let directives = DirectiveScanner::new(&config.token_patterns)?;
        let identities = IdentityResolver::new(identities, &config);
        debug!(identities = identities.len(), "query parser ready");
        Ok(Self {
            identities,
            directives,
            reference_date: None,
        })
    }

    /// Pin the date relative years resolve against. Without it, today's
    /// local date is used on every call.
    #[must_use]
    pub const fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    /// The identity resolver backing this parser.
    #[must_use]
    pub const fn identities(&self) -> &IdentityResolver {
        &self.identities
    }

    /// Extract filters from `query`.
    #[must_use]
    pub fn parse_filters(&self, query: &str) -> FilterResult {
        let date = self
            .reference_date
            .unwrap_or_else(|| Local::now().date_naive());
        self.parse_filters_at(query, date)
    }

    /// Extract filters from `query`, resolving relative years against `date`.
    #[must_use]
    pub fn parse_filters_at(&self, query: &str, date: NaiveDate) -> FilterResult {
        let text = normalize_text(query);
        if text.is_empty() {
            return FilterResult::default();
        }
        let years = YearResolver::new(date.year());

        let token = self.directives.scan(&text, &years, &self.identities);
        if !token.is_empty() {
            debug!(query = %text, year = ?token.year, identity = ?token.identity, "filters from directive");
            return FilterResult {
                year: token.year,
                identity: token.identity,
                provenance: Provenance::Token,
            };
        }

        let year = years.resolve(&text);
        let (identity, provenance) = self.identities.resolve(&text);
        debug!(query = %text, ?year, ?identity, %provenance, "filters resolved");
        FilterResult {
            year,
            identity,
            provenance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> QueryParser {
        QueryParser::new(
            ["최새름", "김민수", "남궁민수", "Jay"],
            ParserConfig::default(),
        )
        .unwrap()
        .with_reference_date(NaiveDate::from_ymd_opt(2025, 6, 15).unwrap())
    }

    #[test]
    fn test_year_and_identity_closed_world() {
        let result = parser().parse_filters("2024년 최새름 기안 문서");
        assert_eq!(
            result,
            FilterResult {
                year: Some(YearSpec::Single(2024)),
                identity: Some("최새름".to_string()),
                provenance: Provenance::ClosedWorld,
            }
        );
    }

    #[test]
    fn test_directive_short_circuits() {
        let result = parser().parse_filters("year:24 drafter:최새름");
        assert_eq!(result.year, Some(YearSpec::Single(2024)));
        assert_eq!(result.identity.as_deref(), Some("최새름"));
        assert_eq!(result.provenance, Provenance::Token);
    }

    #[test]
    fn test_malformed_year_directive_is_not_a_filter() {
        for query in ["year:20245", "year:123"] {
            let result = parser().parse_filters(query);
            assert_eq!(result.year, None, "query {query}");
            assert_eq!(result.provenance, Provenance::None, "query {query}");
        }
    }

    #[test]
    fn test_year_directive_alone_skips_identity_resolution() {
        let result = parser().parse_filters("yr=2023 김민수 보고서");
        assert_eq!(result.year, Some(YearSpec::Single(2023)));
        assert_eq!(result.identity, None);
        assert_eq!(result.provenance, Provenance::Token);
    }

    #[test]
    fn test_unknown_identity_directive_falls_through() {
        // The directive misses, so the heuristic path runs on the same text.
        let result = parser().parse_filters("drafter:홍길동 2022년 자료");
        assert_eq!(result.year, Some(YearSpec::Single(2022)));
        assert_eq!(result.identity, None);
        assert_eq!(result.provenance, Provenance::None);
    }

    #[test]
    fn test_relative_year_uses_reference_date() {
        let p = parser();
        assert_eq!(p.parse_filters("작년 김민수 품의서").year, Some(YearSpec::Single(2024)));
        let at = NaiveDate::from_ymd_opt(2030, 1, 2).unwrap();
        assert_eq!(p.parse_filters_at("작년 품의서", at).year, Some(YearSpec::Single(2029)));
    }

    #[test]
    fn test_fuzzy_identity() {
        let result = parser().parse_filters("남궁민소 계약서");
        assert_eq!(result.identity.as_deref(), Some("남궁민수"));
        assert_eq!(result.provenance, Provenance::Fuzzy);
    }

    #[test]
    fn test_year_without_identity() {
        let result = parser().parse_filters("2023~2025 예산 자료");
        assert_eq!(result.year, Some(YearSpec::Range { low: 2023, high: 2025 }));
        assert_eq!(result.identity, None);
        assert_eq!(result.provenance, Provenance::None);
    }

    #[test]
    fn test_empty_query() {
        let result = parser().parse_filters("   ");
        assert!(result.is_empty());
        assert_eq!(result.provenance, Provenance::None);
    }

    #[test]
    fn test_invalid_override_fails_construction() {
        let mut config = ParserConfig::default();
        config.token_patterns.identity = Some("[".to_string());
        let err = QueryParser::new(["최새름"], config).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_serialized_shape() {
        let result = parser().parse_filters("2023-2025 Jay memo");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "year": "2023-2025",
                "identity": "Jay",
                "provenance": "closed_world",
            })
        );

        let empty = serde_json::to_value(FilterResult::default()).unwrap();
        assert_eq!(
            empty,
            serde_json::json!({"year": null, "identity": null, "provenance": "none"})
        );
    }
}
