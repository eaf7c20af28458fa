//! End-to-end query filter extraction.
//!
//! These tests drive `QueryParser` through the public API only, with a
//! pinned reference date so relative years are deterministic.

use chrono::NaiveDate;
use doclens::{
    FilterResult, IdentityResolver, ParserConfig, Provenance, QueryParser, TokenPatterns,
    YearSpec, MAX_YEAR, MIN_YEAR,
};

const STAFF: &[&str] = &[
    "최새름", "김민수", "이도현", "남궁민수", "박지훈", "정하늘", "황보영", "Jay",
];

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn parser() -> QueryParser {
    QueryParser::new(STAFF.iter().copied(), ParserConfig::default())
        .unwrap()
        .with_reference_date(date(2025, 4, 10))
}

fn single(year: i32) -> Option<YearSpec> {
    Some(YearSpec::Single(year))
}

#[test]
fn test_every_year_in_bounds_resolves_with_suffix() {
    let p = parser();
    for year in MIN_YEAR..=MAX_YEAR {
        assert_eq!(p.parse_filters(&format!("{year}년")).year, single(year), "{year}년");
    }
}

#[test]
fn test_two_digit_window_at_2025() {
    let p = parser();
    assert_eq!(p.parse_filters("24년 보고서").year, single(2024));
    assert_eq!(p.parse_filters("96년 보고서").year, single(1996));
    assert_eq!(p.parse_filters("45년 보고서").year, single(2045));
    assert_eq!(p.parse_filters("46년 보고서").year, single(1946));
    assert_eq!(p.parse_filters("'19 결산").year, single(2019));
}

#[test]
fn test_reversed_range_is_ordered() {
    assert_eq!(
        parser().parse_filters("2025~23 품의서").year,
        Some(YearSpec::Range { low: 2023, high: 2025 })
    );
}

#[test]
fn test_range_notations() {
    let p = parser();
    let expected = Some(YearSpec::Range { low: 2022, high: 2024 });
    for query in ["2022-2024", "2022 ~ 2024", "2022년~2024년", "2022 to 2024", "22->24", "2022→2024"] {
        assert_eq!(p.parse_filters(query).year, expected, "{query}");
    }
}

#[test]
fn test_dates_and_amounts_are_not_ranges() {
    let p = parser();
    assert_eq!(p.parse_filters("2024-03-15 회의록").year, single(2024));
    assert_eq!(p.parse_filters("20230704 계약서").year, single(2023));
    assert_eq!(p.parse_filters("2000000원 이상 지출").year, None);
}

#[test]
fn test_relative_terms_follow_reference_date() {
    let p = parser();
    assert_eq!(p.parse_filters("올해 예산").year, single(2025));
    assert_eq!(p.parse_filters("작년 예산").year, single(2024));
    assert_eq!(p.parse_filters("재작년 예산").year, single(2023));
    assert_eq!(p.parse_filters_at("작년 예산", date(2031, 1, 1)).year, single(2030));
}

#[test]
fn test_every_identity_resolves_closed_world() {
    let resolver = IdentityResolver::new(STAFF.iter().copied(), &ParserConfig::default());
    assert_eq!(resolver.len(), STAFF.len());
    for name in STAFF {
        assert_eq!(
            resolver.resolve(name),
            (Some((*name).to_string()), Provenance::ClosedWorld),
            "{name}"
        );
    }
}

#[test]
fn test_year_and_identity_from_sentence() {
    assert_eq!(
        parser().parse_filters("2024년 최새름 기안 문서"),
        FilterResult {
            year: single(2024),
            identity: Some("최새름".to_string()),
            provenance: Provenance::ClosedWorld,
        }
    );
}

#[test]
fn test_directives_win() {
    assert_eq!(
        parser().parse_filters("year:24 drafter:최새름"),
        FilterResult {
            year: single(2024),
            identity: Some("최새름".to_string()),
            provenance: Provenance::Token,
        }
    );
}

#[test]
fn test_honorifics_and_spacing() {
    let p = parser();
    assert_eq!(p.parse_filters("이도현 과장님 보고서").identity.as_deref(), Some("이도현"));
    assert_eq!(p.parse_filters("박지훈팀장 결재 문서").identity.as_deref(), Some("박지훈"));
    assert_eq!(p.parse_filters("정 하늘 작성 자료").identity.as_deref(), Some("정하늘"));
}

#[test]
fn test_fuzzy_threshold_boundary() {
    let p = parser();

    let accepted = p.parse_filters("남궁민소 결재 문서");
    assert_eq!(accepted.identity.as_deref(), Some("남궁민수"));
    assert_eq!(accepted.provenance, Provenance::Fuzzy);

    let rejected = p.parse_filters("최세름 결재 문서");
    assert_eq!(rejected.identity, None);
    assert_eq!(rejected.provenance, Provenance::None);
}

#[test]
fn test_unknown_names_are_never_invented() {
    let result = parser().parse_filters("홍길동 보고서 2021년");
    assert_eq!(result.identity, None);
    assert_eq!(result.year, single(2021));
}

#[test]
fn test_custom_directive_patterns() {
    let config = ParserConfig {
        token_patterns: TokenPatterns {
            year: Some(r"fy(\d{2,4})".to_string()),
            identity: Some(r"by\s+(\S+)".to_string()),
        },
        ..ParserConfig::default()
    };
    let p = QueryParser::new(STAFF.iter().copied(), config)
        .unwrap()
        .with_reference_date(date(2025, 1, 1));

    let result = p.parse_filters("FY24 budget by Jay");
    assert_eq!(result.year, single(2024));
    assert_eq!(result.identity.as_deref(), Some("Jay"));
    assert_eq!(result.provenance, Provenance::Token);
}

#[test]
fn test_custom_stopwords() {
    let mut config = ParserConfig::default();
    config.stopwords.insert("정하늘".to_string());
    let p = QueryParser::new(STAFF.iter().copied(), config).unwrap();
    assert_eq!(p.parse_filters("정하늘 자료").identity, None);
}
