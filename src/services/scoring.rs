//! Fixed scoring tables and score arithmetic. Everything here is
//! deterministic; the same inputs must re-produce the same scores during
//! later audits, so no floating-point shortcuts beyond the final rounding.

use crate::db::types::{CefrBand, ExamTrack, SectionKind};

/// Score per correct-answer count, index 0 = one correct answer.
const LISTENING_TABLE: [u32; 35] = [
    23, 26, 28, 30, 33, 34, 36, 38, 39, 41, 42, 44, 45, 47, 48, 50, 51, 53, 54, 55, 57, 58, 60,
    61, 63, 65, 66, 68, 70, 72, 73, 74, 75, 75, 75,
];

const READING_TABLE: [u32; 35] = [
    20, 24, 27, 29, 32, 34, 36, 38, 39, 41, 42, 44, 45, 46, 48, 49, 51, 52, 54, 55, 57, 58, 60,
    61, 63, 65, 66, 68, 70, 71, 73, 74, 75, 75, 75,
];

/// The tys track compresses the same sections onto a 0-25 band so that four
/// section scores sum to at most 100.
const TYS_LISTENING_TABLE: [u32; 35] = [
    8, 9, 9, 10, 11, 11, 12, 13, 13, 14, 14, 15, 15, 16, 16, 17, 17, 18, 18, 18, 19, 19, 20, 20,
    21, 22, 22, 23, 23, 24, 24, 25, 25, 25, 25,
];

const TYS_READING_TABLE: [u32; 35] = [
    7, 8, 9, 10, 11, 11, 12, 13, 13, 14, 14, 15, 15, 15, 16, 16, 17, 17, 18, 18, 19, 19, 20, 20,
    21, 22, 22, 23, 23, 24, 24, 25, 25, 25, 25,
];

fn table_for(kind: SectionKind, track: ExamTrack) -> Option<&'static [u32; 35]> {
    match (kind, track) {
        (SectionKind::Listening, ExamTrack::Tys) => Some(&TYS_LISTENING_TABLE),
        (SectionKind::Reading, ExamTrack::Tys) => Some(&TYS_READING_TABLE),
        (SectionKind::Listening, _) => Some(&LISTENING_TABLE),
        (SectionKind::Reading, _) => Some(&READING_TABLE),
        _ => None,
    }
}

/// Table lookup for answer-key sections. Counts at or below zero score 0;
/// counts past the table domain saturate at the table maximum. Kinds without
/// a table (manually reviewed ones) score 0.
pub(crate) fn score_from_correct_count(
    kind: SectionKind,
    correct_count: i64,
    track: ExamTrack,
) -> f64 {
    let Some(table) = table_for(kind, track) else {
        return 0.0;
    };

    if correct_count <= 0 {
        return 0.0;
    }

    let index = (correct_count as usize).min(table.len()) - 1;
    f64::from(table[index])
}

/// Step function over the 0-75 scale; total over all reals.
pub(crate) fn level_from_score(score: f64) -> CefrBand {
    if score >= 65.0 {
        CefrBand::C1
    } else if score >= 51.0 {
        CefrBand::B2
    } else if score >= 38.0 {
        CefrBand::B1
    } else {
        CefrBand::BelowB1
    }
}

pub(crate) fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WordRequirement {
    pub(crate) min_words: usize,
    pub(crate) target_words: usize,
    pub(crate) max_score: u32,
}

/// Two-part writing rubric. A submission below `min_words` scores 0 without
/// a grader call.
pub(crate) fn writing_word_requirement(part: i32) -> WordRequirement {
    match part {
        1 => WordRequirement { min_words: 70, target_words: 150, max_score: 25 },
        _ => WordRequirement { min_words: 110, target_words: 250, max_score: 50 },
    }
}

/// Linear rescale of a grader verdict (0..=raw_max) onto a section maximum.
/// Out-of-range raw values clamp rather than error; the grader is not
/// trusted to stay in band.
pub(crate) fn normalize_grader_score(raw: f64, raw_max: f64, target_max: f64) -> f64 {
    if raw_max <= 0.0 || target_max <= 0.0 {
        return 0.0;
    }

    let clamped = raw.clamp(0.0, raw_max);
    clamped / raw_max * target_max
}

/// Highest score a single section can contribute, per track.
pub(crate) fn section_max(track: ExamTrack) -> f64 {
    match track {
        ExamTrack::Tys => 25.0,
        _ => 75.0,
    }
}

/// Final certified score for a fully-scored attempt. The tys track sums its
/// section scores (each within 0..=25); every other track averages.
pub(crate) fn final_score(track: ExamTrack, section_total: f64, section_count: usize) -> f64 {
    match track {
        ExamTrack::Tys => round2(section_total),
        _ if section_count == 0 => 0.0,
        _ => round2(section_total / section_count as f64),
    }
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listening_table_known_values() {
        assert_eq!(score_from_correct_count(SectionKind::Listening, 1, ExamTrack::Multilevel), 23.0);
        assert_eq!(score_from_correct_count(SectionKind::Listening, 17, ExamTrack::Multilevel), 51.0);
        assert_eq!(score_from_correct_count(SectionKind::Listening, 30, ExamTrack::Multilevel), 72.0);
        assert_eq!(score_from_correct_count(SectionKind::Listening, 35, ExamTrack::Multilevel), 75.0);
    }

    #[test]
    fn reading_table_known_values() {
        assert_eq!(score_from_correct_count(SectionKind::Reading, 1, ExamTrack::Multilevel), 20.0);
        assert_eq!(score_from_correct_count(SectionKind::Reading, 14, ExamTrack::Multilevel), 46.0);
        assert_eq!(score_from_correct_count(SectionKind::Reading, 30, ExamTrack::Multilevel), 71.0);
    }

    #[test]
    fn zero_and_negative_counts_score_zero() {
        assert_eq!(score_from_correct_count(SectionKind::Listening, 0, ExamTrack::Multilevel), 0.0);
        assert_eq!(score_from_correct_count(SectionKind::Reading, -3, ExamTrack::Tys), 0.0);
    }

    #[test]
    fn counts_past_table_domain_saturate() {
        assert_eq!(score_from_correct_count(SectionKind::Listening, 40, ExamTrack::Multilevel), 75.0);
        assert_eq!(score_from_correct_count(SectionKind::Reading, 99, ExamTrack::Tys), 25.0);
    }

    #[test]
    fn manually_reviewed_kinds_have_no_table() {
        assert_eq!(score_from_correct_count(SectionKind::Writing, 10, ExamTrack::Multilevel), 0.0);
        assert_eq!(score_from_correct_count(SectionKind::Speaking, 10, ExamTrack::Tys), 0.0);
    }

    #[test]
    fn all_tables_are_monotonic() {
        for kind in [SectionKind::Listening, SectionKind::Reading] {
            for track in [ExamTrack::Multilevel, ExamTrack::Tys] {
                let mut previous = 0.0;
                for count in 1..=35 {
                    let score = score_from_correct_count(kind, count, track);
                    assert!(
                        score >= previous,
                        "{kind:?}/{track:?} decreased at count {count}: {previous} -> {score}"
                    );
                    previous = score;
                }
            }
        }
    }

    #[test]
    fn tys_tables_stay_within_quarter_band() {
        for kind in [SectionKind::Listening, SectionKind::Reading] {
            for count in 1..=35 {
                let score = score_from_correct_count(kind, count, ExamTrack::Tys);
                assert!((0.0..=25.0).contains(&score));
            }
        }
    }

    #[test]
    fn level_thresholds() {
        assert_eq!(level_from_score(0.0), CefrBand::BelowB1);
        assert_eq!(level_from_score(37.99), CefrBand::BelowB1);
        assert_eq!(level_from_score(38.0), CefrBand::B1);
        assert_eq!(level_from_score(50.99), CefrBand::B1);
        assert_eq!(level_from_score(51.0), CefrBand::B2);
        assert_eq!(level_from_score(61.25), CefrBand::B2);
        assert_eq!(level_from_score(64.99), CefrBand::B2);
        assert_eq!(level_from_score(65.0), CefrBand::C1);
        assert_eq!(level_from_score(75.0), CefrBand::C1);
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("one  two\nthree\tfour"), 4);
    }

    #[test]
    fn writing_requirements_per_part() {
        let part1 = writing_word_requirement(1);
        assert_eq!(part1.min_words, 70);
        assert_eq!(part1.target_words, 150);
        assert_eq!(part1.max_score, 25);

        let part2 = writing_word_requirement(2);
        assert_eq!(part2.min_words, 110);
        assert_eq!(part2.target_words, 250);
        assert_eq!(part2.max_score, 50);
    }

    #[test]
    fn grader_score_normalization() {
        assert_eq!(normalize_grader_score(80.0, 100.0, 25.0), 20.0);
        assert_eq!(normalize_grader_score(100.0, 100.0, 50.0), 50.0);
        assert_eq!(normalize_grader_score(150.0, 100.0, 75.0), 75.0);
        assert_eq!(normalize_grader_score(-10.0, 100.0, 25.0), 0.0);
        assert_eq!(normalize_grader_score(50.0, 0.0, 25.0), 0.0);
    }

    #[test]
    fn section_max_per_track() {
        assert_eq!(section_max(ExamTrack::Tys), 25.0);
        assert_eq!(section_max(ExamTrack::Multilevel), 75.0);
        assert_eq!(section_max(ExamTrack::B2), 75.0);
    }

    #[test]
    fn rounding_to_two_decimals() {
        assert_eq!(round2(61.2549), 61.25);
        assert_eq!(round2(61.256), 61.26);
        assert_eq!(round2(245.0 / 4.0), 61.25);
    }

    #[test]
    fn final_score_sums_for_tys_and_averages_otherwise() {
        let total = 65.0 + 58.0 + 62.0 + 60.0;
        assert_eq!(final_score(ExamTrack::Multilevel, total, 4), 61.25);
        assert_eq!(level_from_score(final_score(ExamTrack::Multilevel, total, 4)), CefrBand::B2);

        assert_eq!(final_score(ExamTrack::Tys, 25.0 + 20.0 + 18.0 + 22.0, 4), 85.0);
        assert_eq!(final_score(ExamTrack::B1, 0.0, 0), 0.0);
    }
}
