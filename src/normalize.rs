//! Text canonicalization.
//!
//! `normalize_text` is applied to every query and stored value; the stricter
//! `normalize_identity` produces the key used to compare person names.

use unicode_normalization::UnicodeNormalization;

/// Honorific and role suffixes removed from the end of a name.
///
/// Order does not matter here; `strip_suffixes` tries longer entries first.
pub const DEFAULT_NAME_SUFFIXES: &[&str] = &[
    "님", "씨", "군", "양", "선생님", "선생", "교수님", "교수", "박사님", "박사", "사원",
    "주임", "대리", "과장", "차장", "부장", "팀장", "팀장님", "실장", "실장님", "본부장",
    "본부장님", "이사", "이사님", "상무", "전무", "사장", "사장님", "대표", "대표님", "담당",
    "담당자",
];

const BRACKETS: &[char] = &[
    '(', ')', '[', ']', '{', '}', '<', '>', '（', '）', '「', '」', '『', '』', '【', '】', '〈',
    '〉', '《', '》',
];

/// Canonical composition plus trim. Never fails.
#[must_use]
pub fn normalize_text(s: &str) -> String {
    s.nfc().collect::<String>().trim().to_string()
}

/// Normalize a person name for comparison.
///
/// Strips brackets and whitespace, then trailing honorifics, then any other
/// punctuation, and finally case-folds.
#[must_use]
pub fn normalize_identity(s: &str) -> String {
    let compact: String = normalize_text(s)
        .chars()
        .filter(|c| !c.is_whitespace() && !BRACKETS.contains(c))
        .collect();
    let stripped = strip_suffixes(&compact, DEFAULT_NAME_SUFFIXES);
    stripped
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Repeatedly remove the longest matching suffix while at least two
/// characters would remain.
fn strip_suffixes<'a>(s: &'a str, suffixes: &[&str]) -> &'a str {
    let mut ordered: Vec<&str> = suffixes.to_vec();
    ordered.sort_by_key(|suffix| std::cmp::Reverse(char_len(suffix)));

    let mut current = s;
    'outer: loop {
        for suffix in &ordered {
            if let Some(rest) = current.strip_suffix(suffix) {
                if char_len(rest) >= 2 {
                    current = rest;
                    continue 'outer;
                }
            }
        }
        return current;
    }
}

/// Number of Unicode scalar values in `s`.
#[must_use]
pub fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Precomposed Hangul syllable (U+AC00..=U+D7A3).
#[must_use]
pub const fn is_hangul_syllable(c: char) -> bool {
    matches!(c, '\u{ac00}'..='\u{d7a3}')
}

/// Character that may appear in a name: a Hangul syllable or an ASCII letter.
#[must_use]
pub const fn is_name_char(c: char) -> bool {
    is_hangul_syllable(c) || c.is_ascii_alphabetic()
}

/// True when an already normalized name is made of one script only and its
/// length lies within `bounds` (inclusive).
#[must_use]
pub fn is_name_shaped(normalized: &str, bounds: (usize, usize)) -> bool {
    let len = char_len(normalized);
    if len < bounds.0 || len > bounds.1 {
        return false;
    }
    normalized.chars().all(is_hangul_syllable) || normalized.chars().all(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_composes_and_trims() {
        // U+1112 U+1161 U+11AB = decomposed "한"
        let decomposed = "  \u{1112}\u{1161}\u{11ab}글 ";
        assert_eq!(normalize_text(decomposed), "한글");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_normalize_identity_strips_honorifics() {
        assert_eq!(normalize_identity("최새름 님"), "최새름");
        assert_eq!(normalize_identity("김민수 팀장님"), "김민수");
        assert_eq!(normalize_identity("(이도현) 과장"), "이도현");
        assert_eq!(normalize_identity("박 지 훈"), "박지훈");
    }

    #[test]
    fn test_normalize_identity_never_shortens_below_two() {
        assert_eq!(normalize_identity("대표"), "대표");
        assert_eq!(normalize_identity("김양"), "김양");
        assert_eq!(normalize_identity("님"), "님");
    }

    #[test]
    fn test_normalize_identity_case_folds_latin() {
        assert_eq!(normalize_identity(" Kim, Jay "), "kimjay");
    }

    #[test]
    fn test_strip_prefers_longest_suffix() {
        // "팀장님" must win over "님" so the whole role is removed in one pass.
        assert_eq!(strip_suffixes("정하늘팀장님", DEFAULT_NAME_SUFFIXES), "정하늘");
    }

    #[test]
    fn test_name_shape() {
        assert!(is_name_shaped("최새름", (2, 4)));
        assert!(is_name_shaped("lee", (2, 4)));
        assert!(!is_name_shaped("최", (2, 4)));
        assert!(!is_name_shaped("최새름abc", (2, 10)));
        assert!(!is_name_shaped("최2름", (2, 4)));
    }
}
