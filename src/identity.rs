//! Closed-world identity resolution.
//!
//! The resolver knows a finite set of canonical identities (document
//! drafters). A query resolves to one of them or to nothing: names outside
//! the set are never invented.
//!
//! Resolution runs in two stages:
//! 1. **Exact**: every candidate name found in the query is normalized and
//!    looked up in a reverse index. The first hit wins.
//! 2. **Fuzzy**: only when the exact stage finds nothing. Candidates are
//!    compared to known identities of similar length; pairs whose consonant
//!    skeletons differ too much are rejected before scoring, and the whole
//!    stage stops after a fixed number of comparisons.

use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::ParserConfig;
use crate::filter::Provenance;
use crate::normalize::{char_len, is_hangul_syllable, is_name_shaped, normalize_identity, normalize_text};
use crate::phonetic::phonetic_skeleton;
use crate::similarity::similarity;

/// Words that look like names but never are.
pub const DEFAULT_STOPWORDS: &[&str] = &[
    "문서", "기안", "기안서", "보고서", "자료", "검색", "관련", "내용", "파일", "결재", "공문",
    "회의록", "계약서", "품의서", "제안서", "견적서", "기획서", "찾아", "찾아줘", "보여줘",
    "알려줘", "주세요", "최근", "올해", "작년", "재작년", "연도", "년도", "기안자", "작성자",
    "담당자", "결재자", "부서", "예산", "지출", "구매", "정리", "목록", "전체", "문서들",
];

/// Outcome of a traced resolution, with fuzzy-stage instrumentation.
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityMatch {
    /// Resolved canonical identity, if any.
    pub identity: Option<String>,
    /// Which stage produced `identity` (`None` when unresolved).
    pub provenance: Provenance,
    /// Fuzzy comparisons performed (pairs within the length window).
    pub comparisons: usize,
    /// Best fuzzy score seen, accepted or not.
    pub best_score: Option<f64>,
}

impl IdentityMatch {
    const fn unresolved(comparisons: usize, best_score: Option<f64>) -> Self {
        Self {
            identity: None,
            provenance: Provenance::None,
            comparisons,
            best_score,
        }
    }
}

#[derive(Debug, Clone)]
struct KnownIdentity {
    canonical: String,
    normalized: String,
    len: usize,
    skeleton: String,
}

#[derive(Debug, Clone)]
struct Candidate {
    normalized: String,
    len: usize,
}

/// Resolves free text against a finite set of canonical identities.
#[derive(Debug, Clone)]
pub struct IdentityResolver {
    /// normalized form -> canonical identity
    reverse: BTreeMap<String, String>,
    /// Sorted by normalized form.
    known: Vec<KnownIdentity>,
    stopwords: HashSet<String>,
    bounds: (usize, usize),
    fuzzy_threshold: f64,
    skeleton_threshold: f64,
    comparison_budget: usize,
}

impl IdentityResolver {
    /// Build the resolver from a set of canonical identities.
    ///
    /// Entries that normalize to nothing, or to something that is not
    /// name-shaped within the configured bounds, are discarded. When two
    /// entries share a normalized form the longer original is kept.
    #[must_use]
    pub fn new<I, S>(identities: I, config: &ParserConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bounds = config.name_length_bounds;
        let mut reverse: BTreeMap<String, String> = BTreeMap::new();

        for raw in identities {
            let canonical = normalize_text(raw.as_ref());
            let normalized = normalize_identity(&canonical);
            if canonical.is_empty() || !is_name_shaped(&normalized, bounds) {
                debug!(identity = %raw.as_ref(), "discarding malformed identity");
                continue;
            }
            match reverse.get(&normalized) {
                Some(existing) if !prefer_collision(&canonical, existing) => {}
                _ => {
                    reverse.insert(normalized, canonical);
                }
            }
        }

        let known = reverse
            .iter()
            .map(|(normalized, canonical)| KnownIdentity {
                canonical: canonical.clone(),
                normalized: normalized.clone(),
                len: char_len(normalized),
                skeleton: phonetic_skeleton(normalized),
            })
            .collect();

        let stopwords = config
            .stopwords
            .iter()
            .map(|w| normalize_text(w).to_lowercase())
            .filter(|w| !w.is_empty())
            .collect();

        Self {
            reverse,
            known,
            stopwords,
            bounds,
            fuzzy_threshold: config.fuzzy_threshold,
            skeleton_threshold: config.skeleton_threshold,
            comparison_budget: config.fuzzy_comparison_budget,
        }
    }

    /// Number of identities in the closed world.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reverse.len()
    }

    /// Whether the closed world is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reverse.is_empty()
    }

    /// Canonical identities, ordered by normalized form.
    pub fn identities(&self) -> impl Iterator<Item = &str> {
        self.known.iter().map(|k| k.canonical.as_str())
    }

    /// Whether `name` normalizes to a known identity.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.resolve_exact(name).is_some()
    }

    /// Exact lookup of a single name. No fuzzy fallback.
    #[must_use]
    pub fn resolve_exact(&self, name: &str) -> Option<&str> {
        let normalized = normalize_identity(name);
        self.reverse.get(&normalized).map(String::as_str)
    }

    /// Resolve the first identity mentioned in `text`.
    #[must_use]
    pub fn resolve(&self, text: &str) -> (Option<String>, Provenance) {
        let traced = self.resolve_traced(text);
        (traced.identity, traced.provenance)
    }

    /// Like [`resolve`](Self::resolve) but reports fuzzy-stage counters.
    #[must_use]
    pub fn resolve_traced(&self, text: &str) -> IdentityMatch {
        let candidates = self.candidates(text);
        if candidates.is_empty() || self.known.is_empty() {
            return IdentityMatch::unresolved(0, None);
        }

        if let Some(hit) = candidates
            .iter()
            .find_map(|c| self.reverse.get(&c.normalized))
        {
            debug!(identity = %hit, "identity resolved by exact lookup");
            return IdentityMatch {
                identity: Some(hit.clone()),
                provenance: Provenance::ClosedWorld,
                comparisons: 0,
                best_score: Some(1.0),
            };
        }

        self.resolve_fuzzy(&candidates)
    }

    fn resolve_fuzzy(&self, candidates: &[Candidate]) -> IdentityMatch {
        let mut comparisons = 0usize;
        let mut best: Option<(f64, &KnownIdentity)> = None;

        // The budget is shared by all candidates, not granted per candidate.
        'candidates: for candidate in candidates {
            let skeleton = phonetic_skeleton(&candidate.normalized);
            for known in &self.known {
                if known.len.abs_diff(candidate.len) > 1 {
                    continue;
                }
                if comparisons >= self.comparison_budget {
                    break 'candidates;
                }
                comparisons += 1;

                let skeleton_score = similarity(&skeleton, &known.skeleton);
                if skeleton_score < self.skeleton_threshold {
                    continue;
                }
                let score = 0.5 * similarity(&candidate.normalized, &known.normalized)
                    + 0.5 * skeleton_score;
                if best.map_or(true, |(top, _)| score > top) {
                    best = Some((score, known));
                }
            }
        }

        match best {
            Some((score, known)) if score >= self.fuzzy_threshold => {
                debug!(identity = %known.canonical, score, comparisons, "identity resolved by fuzzy match");
                IdentityMatch {
                    identity: Some(known.canonical.clone()),
                    provenance: Provenance::Fuzzy,
                    comparisons,
                    best_score: Some(score),
                }
            }
            other => {
                debug!(best = ?other.map(|(s, _)| s), comparisons, "no identity above fuzzy threshold");
                IdentityMatch::unresolved(comparisons, other.map(|(s, _)| s))
            }
        }
    }

    /// Stopwords are stored lowercased; Hangul is unaffected.
    fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(&word.to_lowercase())
    }

    /// Candidate names in order of appearance, deduplicated and filtered.
    /// Candidates starting at the same offset keep their generation order.
    fn candidates(&self, text: &str) -> Vec<Candidate> {
        let mut raw = self.contiguous_runs(text);
        raw.extend(self.spaced_runs(text));
        raw.sort_by_key(|(offset, _)| *offset);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, word) in raw {
            if self.is_stopword(&word) {
                continue;
            }
            let normalized = normalize_identity(&word);
            let len = char_len(&normalized);
            if len < self.bounds.0 || len > self.bounds.1 || self.is_stopword(&normalized) {
                continue;
            }
            if seen.insert(normalized.clone()) {
                out.push(Candidate { normalized, len });
            }
        }
        out
    }

    /// Maximal single-script runs of name characters. Runs longer than the
    /// upper bound are kept whole (honorific stripping may shorten them) and
    /// followed by their prefixes, longest first.
    fn contiguous_runs(&self, text: &str) -> Vec<(usize, String)> {
        let (min, max) = self.bounds;
        let mut out = Vec::new();
        for (offset, run) in script_runs(text) {
            let len = run.len();
            if len < min {
                continue;
            }
            out.push((offset, run.iter().collect()));
            if len > max {
                for prefix in (min..=max).rev() {
                    out.push((offset, run[..prefix].iter().collect()));
                }
            }
        }
        out
    }

    /// Deliberately spaced names: 2-4 consecutive whitespace-separated
    /// Hangul tokens of 1-2 syllables each, joined.
    fn spaced_runs(&self, text: &str) -> Vec<(usize, String)> {
        let tokens = whitespace_tokens(text);
        let qualifies = |(_, t): &(usize, &str)| {
            let t = *t;
            let len = char_len(t);
            (1..=2).contains(&len) && t.chars().all(is_hangul_syllable) && !self.is_stopword(t)
        };

        let mut out = Vec::new();
        let mut i = 0;
        while i < tokens.len() {
            if !qualifies(&tokens[i]) {
                i += 1;
                continue;
            }
            let start = i;
            while i < tokens.len() && qualifies(&tokens[i]) {
                i += 1;
            }
            let group = &tokens[start..i];
            for from in 0..group.len() {
                let longest = (group.len() - from).min(4);
                for take in (2..=longest).rev() {
                    let joined: String = group[from..from + take].iter().map(|(_, t)| *t).collect();
                    out.push((group[from].0, joined));
                }
            }
        }
        out
    }
}

/// Whether `candidate` should replace `existing` for the same normalized form.
fn prefer_collision(candidate: &str, existing: &str) -> bool {
    let (c, e) = (char_len(candidate), char_len(existing));
    c > e || (c == e && candidate < existing)
}

/// Whitespace-separated tokens with their starting char offsets.
fn whitespace_tokens(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut start: Option<(usize, usize)> = None;
    for (pos, (byte, c)) in text.char_indices().enumerate() {
        match (c.is_whitespace(), start) {
            (true, Some((offset, from))) => {
                out.push((offset, &text[from..byte]));
                start = None;
            }
            (false, None) => start = Some((pos, byte)),
            _ => {}
        }
    }
    if let Some((offset, from)) = start {
        out.push((offset, &text[from..]));
    }
    out
}

/// Split text into maximal runs of Hangul syllables or of ASCII letters,
/// each with the char offset where it starts.
fn script_runs(text: &str) -> Vec<(usize, Vec<char>)> {
    #[derive(PartialEq, Eq, Clone, Copy)]
    enum Script {
        Hangul,
        Latin,
    }

    let script_of = |c: char| {
        if is_hangul_syllable(c) {
            Some(Script::Hangul)
        } else if c.is_ascii_alphabetic() {
            Some(Script::Latin)
        } else {
            None
        }
    };

    let mut runs = Vec::new();
    let mut current: Vec<char> = Vec::new();
    let mut current_start = 0;
    let mut current_script = None;
    for (pos, c) in text.chars().enumerate() {
        let script = script_of(c);
        if script.is_none() || script != current_script {
            if !current.is_empty() {
                runs.push((current_start, std::mem::take(&mut current)));
            }
            current_script = script;
            current_start = pos;
        }
        if script.is_some() {
            current.push(c);
        }
    }
    if !current.is_empty() {
        runs.push((current_start, current));
    }
    runs
}
