//! Explicit `key:value` directives embedded in a query.
//!
//! A directive such as `year:24` or `drafter:최새름` states a filter outright
//! and short-circuits the heuristic resolvers.

use regex::{Regex, RegexBuilder};

use crate::config::TokenPatterns;
use crate::error::ValidationError;
use crate::identity::IdentityResolver;
use crate::year::{YearResolver, YearSpec};

/// Built-in year directive. Group 1 is a year or a year range; digit runs
/// are captured whole so the year rules can reject malformed values.
pub const DEFAULT_YEAR_PATTERN: &str = r"(?:^|[^\p{L}\p{N}_])(?:year|yr|연도|년도)\s*[:=]\s*([0-9]+(?:\s*(?:->|-|~|～|〜|–|—|→|to)\s*[0-9]+)?)";

/// Built-in identity directive. Group 1 is the name.
pub const DEFAULT_IDENTITY_PATTERN: &str =
    r"(?:^|[^\p{L}\p{N}_])(?:drafter|author|writer|기안자|작성자|담당자)\s*[:=]\s*([^\s,;]+)";

/// Filters stated explicitly in a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectiveMatch {
    /// Year from a year directive, if it parsed.
    pub year: Option<YearSpec>,
    /// Identity from an identity directive, if it is a known identity.
    pub identity: Option<String>,
}

impl DirectiveMatch {
    /// True when neither directive produced a filter.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.year.is_none() && self.identity.is_none()
    }
}

/// Case-insensitive scanner for year and identity directives.
#[derive(Debug, Clone)]
pub struct DirectiveScanner {
    year: Regex,
    identity: Regex,
}

impl DirectiveScanner {
    /// Compile the built-in patterns, replaced by any overrides in `patterns`.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError::InvalidPattern` if an override does not compile.
    pub fn new(patterns: &TokenPatterns) -> Result<Self, ValidationError> {
        let year = compile("year", patterns.year.as_deref().unwrap_or(DEFAULT_YEAR_PATTERN))?;
        let identity = compile(
            "identity",
            patterns
                .identity
                .as_deref()
                .unwrap_or(DEFAULT_IDENTITY_PATTERN),
        )?;
        Ok(Self { year, identity })
    }

    /// Raw value of the first year directive.
    #[must_use]
    pub fn year_value<'t>(&self, text: &'t str) -> Option<&'t str> {
        capture(&self.year, text)
    }

    /// Raw value of the first identity directive.
    #[must_use]
    pub fn identity_value<'t>(&self, text: &'t str) -> Option<&'t str> {
        capture(&self.identity, text)
    }

    /// Resolve both directives.
    ///
    /// The year value goes through the regular year rules; the identity
    /// value must match a known identity exactly, and a miss is dropped.
    #[must_use]
    pub fn scan(
        &self,
        text: &str,
        years: &YearResolver,
        identities: &IdentityResolver,
    ) -> DirectiveMatch {
        let year = self.year_value(text).and_then(|v| years.resolve(v));
        let identity = self
            .identity_value(text)
            .and_then(|v| identities.resolve_exact(v))
            .map(str::to_string);
        DirectiveMatch { year, identity }
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, ValidationError> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ValidationError::InvalidPattern {
            name: name.to_string(),
            reason: e.to_string(),
        })
}

fn capture<'t>(re: &Regex, text: &'t str) -> Option<&'t str> {
    let caps = re.captures(text)?;
    caps.get(1)
        .or_else(|| caps.get(0))
        .map(|m| m.as_str().trim())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn fixtures() -> (DirectiveScanner, YearResolver, IdentityResolver) {
        let scanner = DirectiveScanner::new(&TokenPatterns::default()).unwrap();
        let identities = IdentityResolver::new(["최새름", "김민수"], &ParserConfig::default());
        (scanner, YearResolver::new(2025), identities)
    }

    #[test]
    fn test_year_and_identity_directives() {
        let (scanner, years, ids) = fixtures();
        let found = scanner.scan("year:24 drafter:최새름", &years, &ids);
        assert_eq!(found.year, Some(YearSpec::Single(2024)));
        assert_eq!(found.identity.as_deref(), Some("최새름"));
    }

    #[test]
    fn test_directives_are_case_insensitive() {
        let (scanner, years, ids) = fixtures();
        let found = scanner.scan("YEAR = 2023~2025 Author:김민수", &years, &ids);
        assert_eq!(found.year, Some(YearSpec::Range { low: 2023, high: 2025 }));
        assert_eq!(found.identity.as_deref(), Some("김민수"));
    }

    #[test]
    fn test_korean_identifiers() {
        let (scanner, years, ids) = fixtures();
        let found = scanner.scan("연도:2022 기안자=최새름님", &years, &ids);
        assert_eq!(found.year, Some(YearSpec::Single(2022)));
        assert_eq!(found.identity.as_deref(), Some("최새름"));
    }

    #[test]
    fn test_unknown_identity_directive_is_dropped() {
        let (scanner, years, ids) = fixtures();
        // One syllable off; directives never fall back to fuzzy matching.
        let found = scanner.scan("drafter:최세름", &years, &ids);
        assert_eq!(found.identity, None);
        assert!(found.is_empty());
    }

    #[test]
    fn test_malformed_year_values_are_dropped() {
        let (scanner, years, ids) = fixtures();
        assert_eq!(scanner.year_value("year:20245"), Some("20245"));
        assert!(scanner.scan("year:20245", &years, &ids).is_empty());
        assert!(scanner.scan("year:123", &years, &ids).is_empty());
        assert_eq!(
            scanner.scan("year:2024 drafter:최새름", &years, &ids).year,
            Some(YearSpec::Single(2024))
        );
    }

    #[test]
    fn test_identifier_must_start_a_word() {
        let (scanner, _, _) = fixtures();
        assert_eq!(scanner.year_value("fiscalyear:2024"), None);
        assert_eq!(scanner.year_value("fiscal year:2024"), Some("2024"));
    }

    #[test]
    fn test_override_patterns() {
        let patterns = TokenPatterns {
            year: Some(r"y(\d{4})".to_string()),
            identity: Some(r"@(\S+)".to_string()),
        };
        let scanner = DirectiveScanner::new(&patterns).unwrap();
        let ids = IdentityResolver::new(["최새름"], &ParserConfig::default());
        let found = scanner.scan("y2021 @최새름", &YearResolver::new(2025), &ids);
        assert_eq!(found.year, Some(YearSpec::Single(2021)));
        assert_eq!(found.identity.as_deref(), Some("최새름"));
        assert_eq!(scanner.year_value("year:2024"), None);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let patterns = TokenPatterns {
            year: Some("(unclosed".to_string()),
            identity: None,
        };
        let err = DirectiveScanner::new(&patterns).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidPattern { ref name, .. } if name == "year"));
    }
}
