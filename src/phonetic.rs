//! Phonetic skeletons for approximate name matching.
//!
//! A skeleton keeps the consonants of a name in order and drops everything
//! else. Two names with different skeletons almost never refer to the same
//! person, which makes the skeleton a cheap pre-filter before scoring.

use crate::normalize::is_hangul_syllable;

const SYLLABLE_BASE: u32 = 0xac00;
const MEDIAL_COUNT: u32 = 21;
const FINAL_COUNT: u32 = 28;

const INITIALS: [char; 19] = [
    'ㄱ', 'ㄲ', 'ㄴ', 'ㄷ', 'ㄸ', 'ㄹ', 'ㅁ', 'ㅂ', 'ㅃ', 'ㅅ', 'ㅆ', 'ㅇ', 'ㅈ', 'ㅉ', 'ㅊ', 'ㅋ',
    'ㅌ', 'ㅍ', 'ㅎ',
];

// Index 0 is "no final consonant".
const FINALS: [Option<char>; 28] = [
    None,
    Some('ㄱ'),
    Some('ㄲ'),
    Some('ㄳ'),
    Some('ㄴ'),
    Some('ㄵ'),
    Some('ㄶ'),
    Some('ㄷ'),
    Some('ㄹ'),
    Some('ㄺ'),
    Some('ㄻ'),
    Some('ㄼ'),
    Some('ㄽ'),
    Some('ㄾ'),
    Some('ㄿ'),
    Some('ㅀ'),
    Some('ㅁ'),
    Some('ㅂ'),
    Some('ㅄ'),
    Some('ㅅ'),
    Some('ㅆ'),
    Some('ㅇ'),
    Some('ㅈ'),
    Some('ㅊ'),
    Some('ㅋ'),
    Some('ㅌ'),
    Some('ㅍ'),
    Some('ㅎ'),
];

const SILENT_INITIAL: usize = 11;

/// Reduce `s` to its consonant skeleton.
///
/// Hangul syllables contribute their initial consonant (unless it is the
/// silent `ㅇ`) and their final consonant. Standalone consonant jamo pass
/// through. ASCII letters keep consonants other than `h`, `w` and `y`.
#[must_use]
pub fn phonetic_skeleton(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if is_hangul_syllable(c) {
            let offset = c as u32 - SYLLABLE_BASE;
            let initial = (offset / (MEDIAL_COUNT * FINAL_COUNT)) as usize;
            let fin = (offset % FINAL_COUNT) as usize;
            if initial != SILENT_INITIAL {
                out.push(INITIALS[initial]);
            }
            if let Some(f) = FINALS[fin] {
                out.push(f);
            }
        } else if matches!(c, '\u{3131}'..='\u{314e}') {
            out.push(c);
        } else if c.is_ascii_alphabetic() {
            let lower = c.to_ascii_lowercase();
            if !matches!(lower, 'a' | 'e' | 'i' | 'o' | 'u' | 'h' | 'w' | 'y') {
                out.push(lower);
            }
        }
    }
    out
}
