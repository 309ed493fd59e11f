//! SM-2 scheduling.
//!
//! A review takes the card's current state plus a recall rating and yields the
//! next state. Ratings 3 to 5 move the card up the interval ladder
//! (1 day, 6 days, then previous interval times ease factor); ratings 0 to 2
//! are lapses and send it back to the bottom.

use crate::error::InvalidInputError;
use crate::models::{
    FlashcardSchedulingState, MAX_INTERVAL_DAYS, MIN_EASE_FACTOR, MIN_INTERVAL_DAYS,
};
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::str::FromStr;

/// Lowest rating that still counts as a correct recall.
pub const PASSING_QUALITY: u8 = 3;

/// Recall rating, 0 (blackout) to 5 (perfect, effortless recall).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Quality(u8);

impl Quality {
    pub const MAX: Quality = Quality(5);

    pub fn new(value: i64) -> Result<Quality, InvalidInputError> {
        match u8::try_from(value) {
            Ok(q) if q <= Self::MAX.0 => Ok(Quality(q)),
            _ => Err(InvalidInputError::QualityOutOfRange(value)),
        }
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_passing(self) -> bool {
        self.0 >= PASSING_QUALITY
    }
}

impl TryFrom<i64> for Quality {
    type Error = InvalidInputError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Quality::new(value)
    }
}

impl FromStr for Quality {
    type Err = InvalidInputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: i64 = s
            .trim()
            .parse()
            .map_err(|_| InvalidInputError::QualityNotAnInteger(s.to_string()))?;
        Quality::new(value)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the state that follows a review rated `quality` at time `now`.
pub fn compute_next_state(
    current: &FlashcardSchedulingState,
    quality: Quality,
    now: DateTime<Utc>,
) -> FlashcardSchedulingState {
    let (ease_factor, interval, review_count) = if quality.is_passing() {
        let interval = match current.review_count {
            0 => 1.0,
            1 => 6.0,
            _ => (current.interval_days as f64 * current.ease_factor).round(),
        };
        let q = (5 - quality.value()) as f64;
        let ease_factor = current.ease_factor + (0.1 - q * (0.08 + q * 0.02));
        (ease_factor, interval, current.review_count.saturating_add(1))
    } else {
        // Lapses leave the ease factor alone
        (current.ease_factor, 1.0, 0)
    };

    let ease_factor = ease_factor.max(MIN_EASE_FACTOR);
    let interval_days = interval.clamp(MIN_INTERVAL_DAYS as f64, MAX_INTERVAL_DAYS as f64) as u32;

    FlashcardSchedulingState {
        ease_factor,
        interval_days,
        review_count,
        next_review_at: now + TimeDelta::days(interval_days as i64),
        last_reviewed_at: now,
    }
}

#[cfg(test)]
use crate::models::at;

#[cfg(test)]
fn state(ease_factor: f64, interval_days: u32, review_count: u32) -> FlashcardSchedulingState {
    let then = at(2025, 5, 1);
    FlashcardSchedulingState::new(ease_factor, interval_days, review_count, then, then).unwrap()
}

#[cfg(test)]
fn all_qualities() -> impl Iterator<Item = Quality> {
    (0..=5).map(|q| Quality::new(q).unwrap())
}

#[test]
fn test_quality_rejects_out_of_range() {
    assert_eq!(Quality::new(-1), Err(InvalidInputError::QualityOutOfRange(-1)));
    assert_eq!(Quality::new(6), Err(InvalidInputError::QualityOutOfRange(6)));
    assert_eq!(Quality::try_from(300), Err(InvalidInputError::QualityOutOfRange(300)));
    assert_eq!(Quality::new(0).unwrap().value(), 0);
    assert_eq!(Quality::new(5).unwrap(), Quality::MAX);
}

#[test]
fn test_quality_rejects_non_integer() {
    assert_eq!(
        "3.5".parse::<Quality>(),
        Err(InvalidInputError::QualityNotAnInteger(String::from("3.5")))
    );
    assert!("good".parse::<Quality>().is_err());
    assert!("".parse::<Quality>().is_err());
    assert_eq!("-1".parse::<Quality>(), Err(InvalidInputError::QualityOutOfRange(-1)));
    assert_eq!(" 4\n".parse::<Quality>().unwrap().value(), 4);
}

#[test]
fn test_first_review_with_quality_four_keeps_ease() {
    let now = at(2025, 5, 10);
    let next = compute_next_state(&state(2.5, 1, 0), Quality::new(4).unwrap(), now);
    assert_eq!(next.interval_days(), 1);
    assert_eq!(next.review_count(), 1);
    assert!((next.ease_factor() - 2.5).abs() < 1e-9);
    assert_eq!(next.next_review_at(), at(2025, 5, 11));
    assert_eq!(next.last_reviewed_at(), now);
}

#[test]
fn test_interval_ladder() {
    let five = Quality::MAX;
    let first = compute_next_state(&state(2.5, 1, 0), five, at(2025, 5, 10));
    assert_eq!((first.interval_days(), first.review_count()), (1, 1));

    let second = compute_next_state(&first, five, at(2025, 5, 11));
    assert_eq!((second.interval_days(), second.review_count()), (6, 2));
    assert_eq!(second.next_review_at(), at(2025, 5, 17));

    let third = compute_next_state(&second, five, at(2025, 5, 17));
    let expected = (6.0 * second.ease_factor()).round() as u32;
    assert_eq!(expected, 16);
    assert_eq!((third.interval_days(), third.review_count()), (expected, 3));
}

#[test]
fn test_lapse_resets_ladder_and_keeps_ease() {
    let now = at(2025, 5, 10);
    for q in 0..3 {
        let prior = state(2.2, 40, 6);
        let next = compute_next_state(&prior, Quality::new(q).unwrap(), now);
        assert_eq!(next.interval_days(), 1);
        assert_eq!(next.review_count(), 0);
        assert_eq!(next.ease_factor(), 2.2);
        assert_eq!(next.next_review_at(), at(2025, 5, 11));
    }
}

#[test]
fn test_barely_passing_lowers_ease() {
    let next = compute_next_state(&state(2.5, 6, 2), Quality::new(3).unwrap(), at(2025, 5, 10));
    // 0.1 - 2 * (0.08 + 2 * 0.02) = -0.14
    assert!((next.ease_factor() - 2.36).abs() < 1e-9);
    assert_eq!(next.interval_days(), 15);
}

#[test]
fn test_ease_never_drops_below_floor() {
    let now = at(2025, 5, 10);
    let mut current = state(1.3, 10, 4);
    for _ in 0..10 {
        current = compute_next_state(&current, Quality::new(3).unwrap(), now);
        assert!(current.ease_factor() >= MIN_EASE_FACTOR);
    }
    assert_eq!(current.ease_factor(), MIN_EASE_FACTOR);
}

#[test]
fn test_interval_is_capped_at_one_year() {
    let next = compute_next_state(&state(2.8, 300, 9), Quality::MAX, at(2025, 5, 10));
    assert_eq!(next.interval_days(), 365);
    assert_eq!(next.next_review_at(), at(2026, 5, 10));
}

#[test]
fn test_invariants_hold_for_every_rating() {
    let now = at(2025, 5, 10);
    for ease in [1.3, 1.7, 2.5, 3.4] {
        for interval in [1, 2, 6, 30, 200, 365] {
            for count in [0, 1, 2, 12] {
                for q in all_qualities() {
                    let next = compute_next_state(&state(ease, interval, count), q, now);
                    assert!(next.ease_factor() >= 1.3);
                    assert!((1..=365).contains(&next.interval_days()));
                }
            }
        }
    }
}

#[test]
fn test_higher_quality_never_lowers_ease() {
    let now = at(2025, 5, 10);
    for ease in [1.3, 2.0, 2.5, 3.1] {
        let prior = state(ease, 20, 3);
        let eases: Vec<f64> = (3..=5)
            .map(|q| compute_next_state(&prior, Quality::new(q).unwrap(), now).ease_factor())
            .collect();
        assert!(eases.windows(2).all(|w| w[0] <= w[1]), "{:?}", eases);
    }
}

#[test]
fn test_review_count_saturates_instead_of_wrapping() {
    let next = compute_next_state(&state(2.5, 10, u32::MAX), Quality::MAX, at(2025, 5, 10));
    assert_eq!(next.review_count(), u32::MAX);
    assert_eq!(next.interval_days(), 25);
}

#[test]
fn test_same_input_same_output() {
    let now = at(2025, 5, 10);
    let prior = state(2.36, 15, 3);
    for q in all_qualities() {
        let a = compute_next_state(&prior, q, now);
        let b = compute_next_state(&prior, q, now);
        assert_eq!(a.ease_factor().to_bits(), b.ease_factor().to_bits());
        assert_eq!(a, b);
    }
}
