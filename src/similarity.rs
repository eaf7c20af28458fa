//! Normalized string similarity used by fuzzy name matching.

/// Indel similarity: `2 * LCS(a, b) / (|a| + |b|)` over chars.
///
/// Returns 1.0 for two empty strings and 0.0 when exactly one is empty.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    (2 * lcs_len(&a, &b)) as f64 / total as f64
}

/// Length of the longest common subsequence, two-row dynamic programming.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for &ca in a {
        for (j, &cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_and_empty() {
        assert!(close(similarity("최새름", "최새름"), 1.0));
        assert!(close(similarity("", ""), 1.0));
        assert!(close(similarity("", "abc"), 0.0));
    }

    #[test]
    fn test_single_substitution() {
        // 3 chars, one substituted: 2*2/6
        assert!(close(similarity("최새름", "최세름"), 2.0 / 3.0));
        // 4 chars, one substituted: 2*3/8
        assert!(close(similarity("남궁민수", "남궁민소"), 0.75));
    }

    #[test]
    fn test_symmetric_with_length_difference() {
        let ab = similarity("kitten", "sitting");
        let ba = similarity("sitting", "kitten");
        assert!(close(ab, ba));
        // LCS("kitten", "sitting") = "ittn" = 4
        assert!(close(ab, 8.0 / 13.0));
    }
}
