//! Typing metrics.
//!
//! Two WPM conventions exist in the wild and both are used here, in fixed
//! roles:
//!
//! - the final/submitted WPM counts whitespace-separated words in the typed
//!   text and divides by the elapsed minutes;
//! - the live tracker uses the classic chars/5 convention, which behaves
//!   sensibly mid-word.
//!
//! Final accuracy divides correct positions by the reference length; live
//! accuracy divides by the typed length (a running statistic over what has
//! been typed so far). An empty reference yields 0.0 accuracy; an empty
//! live snapshot yields 100.0.

/// One finished measurement over a typing attempt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Metrics {
    pub wpm: f64,
    pub accuracy: f64,
    pub mistakes: usize,
    pub duration: f64,
}

impl Metrics {
    pub fn zero() -> Self {
        Self {
            wpm: 0.0,
            accuracy: 0.0,
            mistakes: 0,
            duration: 0.0,
        }
    }
}

/// Round to two decimal places, the precision carried by stored results.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Non-empty whitespace-separated tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Positions where typed and reference agree, compared up to the shorter
/// of the two. Trailing unmatched characters on either side are neither
/// correct nor double-counted; the length difference is accounted for in
/// the mistake count.
pub fn correct_chars(typed: &str, reference: &str) -> usize {
    typed
        .chars()
        .zip(reference.chars())
        .filter(|(t, r)| t == r)
        .count()
}

/// Compute the final metrics for an attempt.
///
/// Total over its whole input domain: degenerate inputs (zero or negative
/// duration, empty texts) resolve to zeros rather than failing. Pure and
/// deterministic.
pub fn compute(start_secs: f64, end_secs: f64, typed: &str, reference: &str) -> Metrics {
    let duration = round2(end_secs - start_secs);

    let wpm = if duration > 0.0 {
        round2(word_count(typed) as f64 / duration * 60.0)
    } else {
        0.0
    };

    let reference_len = reference.chars().count();
    let correct = correct_chars(typed, reference);

    let accuracy = if reference_len > 0 {
        round2(correct as f64 / reference_len as f64 * 100.0)
    } else {
        0.0
    };

    Metrics {
        wpm,
        accuracy,
        mistakes: reference_len.saturating_sub(correct),
        duration,
    }
}

/// Gross WPM over a partial snapshot: chars/5 per elapsed minute.
pub fn live_wpm(chars_typed: usize, elapsed_secs: f64) -> f64 {
    if elapsed_secs <= 0.0 {
        return 0.0;
    }
    round2((chars_typed as f64 / 5.0) / (elapsed_secs / 60.0))
}

/// Running accuracy over a partial snapshot, against the typed length.
pub fn live_accuracy(typed: &str, reference: &str) -> f64 {
    let typed_len = typed.chars().count();
    if typed_len == 0 {
        return 100.0;
    }
    round2(correct_chars(typed, reference) as f64 / typed_len as f64 * 100.0)
}

pub fn mean(data: &[f64]) -> Option<f64> {
    if data.is_empty() {
        return None;
    }
    Some(data.iter().sum::<f64>() / data.len() as f64)
}

pub fn std_dev(data: &[f64]) -> Option<f64> {
    let m = mean(data)?;
    let variance = data.iter().map(|v| (m - v) * (m - v)).sum::<f64>() / data.len() as f64;
    Some(variance.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_minute_four_words() {
        let m = compute(0.0, 60.0, "the quick brown fox", "the quick brown fox");
        assert_eq!(m.duration, 60.0);
        assert_eq!(m.wpm, 4.0);
        assert_eq!(m.accuracy, 100.0);
        assert_eq!(m.mistakes, 0);
    }

    #[test]
    fn test_single_typo() {
        // "hello world" is 11 chars including the space
        let m = compute(0.0, 10.0, "hxllo world", "hello world");
        assert_eq!(correct_chars("hxllo world", "hello world"), 10);
        assert_eq!(m.accuracy, 90.91);
        assert_eq!(m.mistakes, 1);
    }

    #[test]
    fn test_exact_match_is_perfect() {
        let m = compute(1.0, 4.5, "abc def", "abc def");
        assert_eq!(m.accuracy, 100.0);
        assert_eq!(m.mistakes, 0);
    }

    #[test]
    fn test_zero_and_negative_duration_give_zero_wpm() {
        assert_eq!(compute(5.0, 5.0, "words here", "words here").wpm, 0.0);
        assert_eq!(compute(9.0, 3.0, "words here", "words here").wpm, 0.0);
    }

    #[test]
    fn test_empty_reference_pins_zero_accuracy() {
        let m = compute(0.0, 2.0, "anything", "");
        assert_eq!(m.accuracy, 0.0);
        assert_eq!(m.mistakes, 0);
    }

    #[test]
    fn test_typed_longer_than_reference() {
        // excess characters are not extra mistakes, only the reference
        // length is accounted
        let m = compute(0.0, 1.0, "hiya", "hi");
        assert_eq!(m.accuracy, 100.0);
        assert_eq!(m.mistakes, 0);
    }

    #[test]
    fn test_typed_shorter_than_reference() {
        let m = compute(0.0, 1.0, "hi", "hi there");
        assert_eq!(m.mistakes, 6);
        assert!(m.accuracy > 0.0 && m.accuracy < 100.0);
    }

    #[test]
    fn test_bounds_hold_on_garbage() {
        let m = compute(0.0, 3.0, "zzzzzzzz", "hello");
        assert!(m.accuracy >= 0.0 && m.accuracy <= 100.0);
        assert!(m.mistakes <= "hello".len());
        assert!(m.wpm >= 0.0);
    }

    #[test]
    fn test_compute_is_pure() {
        let a = compute(2.0, 17.0, "some typed text", "some reference text");
        let b = compute(2.0, 17.0, "some typed text", "some reference text");
        assert_eq!(a, b);
    }

    #[test]
    fn test_word_count_splits_on_whitespace_runs() {
        assert_eq!(word_count("one  two\tthree\nfour"), 4);
        assert_eq!(word_count("   "), 0);
        assert_eq!(word_count(""), 0);
    }

    #[test]
    fn test_duration_rounding() {
        let m = compute(0.0, 1.23456, "x", "x");
        assert_eq!(m.duration, 1.23);
    }

    #[test]
    fn test_live_wpm_chars_over_five() {
        // 50 chars in 60s = 10 "words" per minute
        assert_eq!(live_wpm(50, 60.0), 10.0);
        // 25 chars in 30s = 5 words / half minute = 10 wpm
        assert_eq!(live_wpm(25, 30.0), 10.0);
        assert_eq!(live_wpm(100, 0.0), 0.0);
    }

    #[test]
    fn test_live_accuracy_is_against_typed_length() {
        assert_eq!(live_accuracy("he", "hello world"), 100.0);
        assert_eq!(live_accuracy("hx", "hello world"), 50.0);
        // nothing typed yet: nothing has been wrong yet
        assert_eq!(live_accuracy("", "hello world"), 100.0);
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean(&[10.0, 20.0, 30.0]), Some(20.0));
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_std_dev() {
        assert_eq!(std_dev(&[5.0, 5.0, 5.0]), Some(0.0));
        assert_eq!(std_dev(&[]), None);
        let sd = std_dev(&[100.0, 120.0, 90.0, 102.0, 94.0]).unwrap();
        assert!((sd - 10.322790320451151).abs() < 1e-9);
    }
}
