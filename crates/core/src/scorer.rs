//! Confidence scoring between a converted object's file name and the base
//! name of the original document.
//!
//! The converter names its output `{HHMMSS}_{server}_{original}_{YYYYMMDDhhmmss}.pdf`,
//! and occasionally truncates or decorates `{original}`. Scores run 0..=100;
//! the thresholds below were tuned against real listings and their relative
//! order decides which of two plausible candidates wins, so they are kept
//! verbatim.

use regex::Regex;
use std::sync::OnceLock;

pub const SCORE_EXACT: u8 = 100;
pub const SCORE_LIGHT_EQUAL: u8 = 98;
pub const SCORE_LOOSE_EQUAL: u8 = 95;
pub const SCORE_LIGHT_CONTAINS_TARGET: u8 = 90;
pub const SCORE_LIGHT_WITHIN_TARGET: u8 = 88;
pub const SCORE_LOOSE_CONTAINS_TARGET: u8 = 85;
pub const SCORE_RATIO_HIGH: u8 = 80;
pub const SCORE_RATIO_MID: u8 = 70;
pub const SCORE_RATIO_LOW: u8 = 50;
pub const SCORE_LCS_STRONG_BASE: u8 = 50;
pub const SCORE_LCS_STRONG_BONUS: u8 = 30;
pub const SCORE_LCS_WEAK_BASE: u8 = 40;
pub const SCORE_LCS_WEAK_BONUS: u8 = 20;
pub const PREFIX_CODE_BONUS: u8 = 10;

/// Ceiling for anything that is not an exact match, so bonuses never let a
/// near match tie with an exact one.
pub const MAX_NON_EXACT_SCORE: u8 = 99;

/// Shortest extracted name the length-ratio rule will consider.
pub const MIN_CONTAINMENT_CHARS: usize = 5;

const RATIO_HIGH: f64 = 0.8;
const RATIO_MID: f64 = 0.5;
const LCS_STRONG_MIN_CHARS: usize = 8;
const LCS_STRONG_COVERAGE: f64 = 0.7;
const LCS_WEAK_MIN_CHARS: usize = 5;
const LCS_WEAK_COVERAGE: f64 = 0.5;

pub const DEFAULT_PREVIEW_EXTENSION: &str = "pdf";

const GENERATED_SUFFIX_PATTERN: &str = r"[_-]?\d{10,}$";
const CONVERTER_PREFIX_PATTERN: &str = r"^\d{4,8}_[A-Za-z][A-Za-z0-9-]*_";
const PREFIX_CODE_PATTERN: &str = r"^[A-Za-z0-9]+_\d+_";

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn generated_suffix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, GENERATED_SUFFIX_PATTERN)
}

fn converter_prefix() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, CONVERTER_PREFIX_PATTERN)
}

fn prefix_code() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    cached(&RE, PREFIX_CODE_PATTERN)
}

#[derive(Debug, Clone)]
pub struct SimilarityScorer {
    preview_extension: String,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(DEFAULT_PREVIEW_EXTENSION)
    }
}

impl SimilarityScorer {
    pub fn new(preview_extension: impl AsRef<str>) -> Self {
        Self {
            preview_extension: preview_extension
                .as_ref()
                .trim_start_matches('.')
                .to_ascii_lowercase(),
        }
    }

    pub fn score(&self, candidate_file_name: &str, target_base_name: &str) -> u8 {
        let extracted = self.extract_original_name(candidate_file_name);
        score_names(&extracted, target_base_name)
    }

    /// Recovers `{original}` from a converter-generated file name.
    pub fn extract_original_name(&self, candidate_file_name: &str) -> String {
        let mut name = candidate_file_name;

        if let Some((stem, ext)) = name.rsplit_once('.') {
            if !stem.is_empty() && ext.eq_ignore_ascii_case(&self.preview_extension) {
                name = stem;
            }
        }

        if let Some(found) = generated_suffix().and_then(|re| re.find(name)) {
            if found.start() > 0 {
                name = &name[..found.start()];
            }
        }

        if let Some(found) = converter_prefix().and_then(|re| re.find(name)) {
            if found.end() < name.len() {
                name = &name[found.end()..];
            }
        }

        name.to_string()
    }
}

/// Convenience wrapper using the default preview extension.
pub fn score(candidate_file_name: &str, target_base_name: &str) -> u8 {
    SimilarityScorer::default().score(candidate_file_name, target_base_name)
}

/// Scores an already-extracted name against the target.
pub fn score_names(extracted: &str, target: &str) -> u8 {
    if extracted.is_empty() || target.is_empty() {
        return 0;
    }
    if extracted == target {
        return SCORE_EXACT;
    }

    let base = base_score(extracted, target);
    if base == 0 {
        return 0;
    }

    let bonus = if shares_prefix_code(extracted, target) {
        PREFIX_CODE_BONUS
    } else {
        0
    };
    base.saturating_add(bonus).min(MAX_NON_EXACT_SCORE)
}

fn base_score(extracted: &str, target: &str) -> u8 {
    let light_extracted = light(extracted);
    let light_target = light(target);
    if light_extracted == light_target {
        return SCORE_LIGHT_EQUAL;
    }

    let loose_extracted = loose(&light_extracted);
    let loose_target = loose(&light_target);
    if loose_extracted == loose_target {
        return SCORE_LOOSE_EQUAL;
    }

    if loose_extracted.is_empty() || loose_target.is_empty() {
        return 0;
    }
    if light_extracted.contains(&light_target) {
        return SCORE_LIGHT_CONTAINS_TARGET;
    }
    if light_target.contains(&light_extracted) {
        return SCORE_LIGHT_WITHIN_TARGET;
    }
    if loose_extracted.contains(&loose_target) {
        return SCORE_LOOSE_CONTAINS_TARGET;
    }
    if contains_substantial(&loose_target, &loose_extracted) {
        return ratio_score(&loose_extracted, &loose_target);
    }

    lcs_score(&loose_extracted, &loose_target)
}

fn ratio_score(left: &str, right: &str) -> u8 {
    let (left_len, right_len) = (char_len(left), char_len(right));
    let ratio = left_len.min(right_len) as f64 / left_len.max(right_len) as f64;
    if ratio >= RATIO_HIGH {
        SCORE_RATIO_HIGH
    } else if ratio >= RATIO_MID {
        SCORE_RATIO_MID
    } else {
        SCORE_RATIO_LOW
    }
}

fn lcs_score(left: &str, right: &str) -> u8 {
    let longer = char_len(left).max(char_len(right));
    if longer == 0 {
        return 0;
    }
    let common = longest_common_substring(left, right);
    let coverage = common as f64 / longer as f64;

    if common >= LCS_STRONG_MIN_CHARS && coverage >= LCS_STRONG_COVERAGE {
        SCORE_LCS_STRONG_BASE + proportional(coverage, LCS_STRONG_COVERAGE, SCORE_LCS_STRONG_BONUS)
    } else if common >= LCS_WEAK_MIN_CHARS && coverage >= LCS_WEAK_COVERAGE {
        SCORE_LCS_WEAK_BASE + proportional(coverage, LCS_WEAK_COVERAGE, SCORE_LCS_WEAK_BONUS)
    } else {
        0
    }
}

fn proportional(coverage: f64, floor: f64, max_bonus: u8) -> u8 {
    let span = 1.0 - floor;
    let fraction = ((coverage - floor) / span).clamp(0.0, 1.0);
    (fraction * f64::from(max_bonus)).round() as u8
}

/// `haystack` contains `needle` and `needle` is long enough to mean something.
fn contains_substantial(haystack: &str, needle: &str) -> bool {
    char_len(needle) >= MIN_CONTAINMENT_CHARS && haystack.contains(needle)
}

fn shares_prefix_code(extracted: &str, target: &str) -> bool {
    let Some(code) = prefix_code().and_then(|re| re.find(target)) else {
        return false;
    };
    extracted
        .to_lowercase()
        .starts_with(&code.as_str().to_lowercase())
}

const BRACKETS: &str = "()[]{}<>（）［］｛｝【】「」『』〔〕＜＞";

fn is_bracket(c: char) -> bool {
    BRACKETS.contains(c)
}

fn is_separator(c: char) -> bool {
    matches!(c, '_' | '-' | '＿' | '－' | '‐')
}

/// Case-folded, without brackets or whitespace.
pub fn light(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace() && !is_bracket(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// `light` minus underscores and hyphens.
pub fn loose(value: &str) -> String {
    light(value).chars().filter(|c| !is_separator(*c)).collect()
}

fn char_len(value: &str) -> usize {
    value.chars().count()
}

fn longest_common_substring(left: &str, right: &str) -> usize {
    let left: Vec<char> = left.chars().collect();
    let right: Vec<char> = right.chars().collect();
    if left.is_empty() || right.is_empty() {
        return 0;
    }

    let mut previous = vec![0usize; right.len() + 1];
    let mut current = vec![0usize; right.len() + 1];
    let mut best = 0;

    for l in &left {
        for (j, r) in right.iter().enumerate() {
            current[j + 1] = if l == r { previous[j] + 1 } else { 0 };
            best = best.max(current[j + 1]);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    best
}
