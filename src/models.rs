use crate::error::InvalidInputError;
use crate::utils::check_length;
use chrono::{DateTime, TimeDelta, Utc};
use log::warn;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use struct_field_names_as_array::FieldNamesAsArray;

/// Floor below which review spacing stops growing in a useful way.
pub const MIN_EASE_FACTOR: f64 = 1.3;
pub const INITIAL_EASE_FACTOR: f64 = 2.5;
pub const MIN_INTERVAL_DAYS: u32 = 1;
pub const MAX_INTERVAL_DAYS: u32 = 365;
pub const TAG_MAX_LEN: usize = 50;

/// Scheduling state of a single card.
///
/// Always satisfies `ease_factor >= 1.3` and `1 <= interval_days <= 365`.
/// It is a plain value: the card box owns it, the scheduler takes a copy and
/// hands back a replacement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlashcardSchedulingState {
    pub(crate) ease_factor: f64,
    pub(crate) interval_days: u32,
    pub(crate) review_count: u32,
    pub(crate) next_review_at: DateTime<Utc>,
    pub(crate) last_reviewed_at: DateTime<Utc>,
}

impl FlashcardSchedulingState {
    /// State of a freshly authored card: due again one day after `now`.
    pub fn initial(now: DateTime<Utc>) -> Self {
        FlashcardSchedulingState {
            ease_factor: INITIAL_EASE_FACTOR,
            interval_days: MIN_INTERVAL_DAYS,
            review_count: 0,
            next_review_at: now + TimeDelta::days(MIN_INTERVAL_DAYS as i64),
            last_reviewed_at: now,
        }
    }

    /// Builds a state, rejecting values that break the invariants.
    pub fn new(
        ease_factor: f64,
        interval_days: u32,
        review_count: u32,
        next_review_at: DateTime<Utc>,
        last_reviewed_at: DateTime<Utc>,
    ) -> Result<Self, InvalidInputError> {
        // Written this way round so NaN is rejected too
        if !(ease_factor >= MIN_EASE_FACTOR) {
            return Err(InvalidInputError::EaseFactorTooLow(ease_factor));
        }
        if !(MIN_INTERVAL_DAYS..=MAX_INTERVAL_DAYS).contains(&interval_days) {
            return Err(InvalidInputError::IntervalOutOfRange(interval_days));
        }
        Ok(FlashcardSchedulingState {
            ease_factor,
            interval_days,
            review_count,
            next_review_at,
            last_reviewed_at,
        })
    }

    /// Builds a state from possibly corrupted stored values, pulling them back
    /// into range instead of failing.
    pub fn clamped(
        ease_factor: f64,
        interval_days: u32,
        review_count: u32,
        next_review_at: DateTime<Utc>,
        last_reviewed_at: DateTime<Utc>,
    ) -> Self {
        let state = FlashcardSchedulingState {
            ease_factor: ease_factor.max(MIN_EASE_FACTOR),
            interval_days: interval_days.clamp(MIN_INTERVAL_DAYS, MAX_INTERVAL_DAYS),
            review_count,
            next_review_at,
            last_reviewed_at,
        };
        if state.ease_factor != ease_factor || state.interval_days != interval_days {
            warn!(
                "Repaired scheduling state: ease {} -> {}, interval {} -> {}",
                ease_factor, state.ease_factor, interval_days, state.interval_days
            );
        }
        state
    }

    pub fn ease_factor(&self) -> f64 {
        self.ease_factor
    }

    pub fn interval_days(&self) -> u32 {
        self.interval_days
    }

    pub fn review_count(&self) -> u32 {
        self.review_count
    }

    pub fn next_review_at(&self) -> DateTime<Utc> {
        self.next_review_at
    }

    pub fn last_reviewed_at(&self) -> DateTime<Utc> {
        self.last_reviewed_at
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

#[derive(clap::ValueEnum, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// Free-form labels on a card, stored as one comma-separated column.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tags(pub Vec<String>);

impl Tags {
    /// Checks each tag: 1 to 50 characters, and no comma since that separates
    /// tags on disk.
    pub fn new(tags: Vec<String>) -> Result<Tags, InvalidInputError> {
        for tag in &tags {
            check_length("tag", tag, 1, TAG_MAX_LEN)?;
            if tag.contains(',') {
                return Err(InvalidInputError::TagSeparator(tag.clone()));
            }
        }
        Ok(Tags(tags))
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.iter().any(|t| t == tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Serialize for Tags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.join(","))
    }
}

impl<'de> Deserialize<'de> for Tags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let column = String::deserialize(deserializer)?;
        Ok(Tags(
            column
                .split(',')
                .filter(|t| !t.is_empty())
                .map(String::from)
                .collect(),
        ))
    }
}

/// One row of a card box.
#[derive(Deserialize, Serialize, FieldNamesAsArray, Debug, Clone, PartialEq)]
pub struct Card {
    pub id: u64,
    pub user_id: u64,
    pub lesson_id: Option<u64>,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Tags,
    pub created_at: DateTime<Utc>,
    pub ease_factor: f64,
    pub interval_days: u32,
    pub review_count: u32,
    pub last_reviewed_at: DateTime<Utc>,
    pub next_review_at: DateTime<Utc>,
}

impl Card {
    /// Reads the scheduling columns. Out-of-range values are repaired, not
    /// rejected, so one bad row cannot block a review session.
    pub fn state(&self) -> FlashcardSchedulingState {
        FlashcardSchedulingState::clamped(
            self.ease_factor,
            self.interval_days,
            self.review_count,
            self.next_review_at,
            self.last_reviewed_at,
        )
    }

    /// Replaces all scheduling columns at once.
    pub fn set_state(&mut self, state: FlashcardSchedulingState) {
        self.ease_factor = state.ease_factor;
        self.interval_days = state.interval_days;
        self.review_count = state.review_count;
        self.last_reviewed_at = state.last_reviewed_at;
        self.next_review_at = state.next_review_at;
    }

    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_at <= now
    }
}

/// Card contents as typed in by the author, before it gets an id and state.
pub struct NewCard {
    pub lesson_id: Option<u64>,
    pub question: String,
    pub answer: String,
    pub hint: Option<String>,
    pub difficulty: Difficulty,
    pub tags: Tags,
}

impl NewCard {
    pub fn into_card(self, id: u64, user_id: u64, now: DateTime<Utc>) -> Card {
        let state = FlashcardSchedulingState::initial(now);
        Card {
            id,
            user_id,
            lesson_id: self.lesson_id,
            question: self.question,
            answer: self.answer,
            hint: self.hint,
            difficulty: self.difficulty,
            tags: self.tags,
            created_at: now,
            ease_factor: state.ease_factor,
            interval_days: state.interval_days,
            review_count: state.review_count,
            last_reviewed_at: state.last_reviewed_at,
            next_review_at: state.next_review_at,
        }
    }
}

#[cfg(test)]
pub(crate) fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    use chrono::TimeZone;
    Utc.with_ymd_and_hms(y, m, d, 8, 0, 0).unwrap()
}

#[test]
fn test_initial_state() {
    let now = at(2025, 5, 10);
    let state = FlashcardSchedulingState::initial(now);
    assert_eq!(state.ease_factor(), 2.5);
    assert_eq!(state.interval_days(), 1);
    assert_eq!(state.review_count(), 0);
    assert_eq!(state.next_review_at(), at(2025, 5, 11));
    assert_eq!(state.last_reviewed_at(), now);
    assert!(!state.is_due(now));
    assert!(state.is_due(at(2025, 5, 11)));
}

#[test]
fn test_new_rejects_broken_invariants() {
    let now = at(2025, 5, 10);
    assert_eq!(
        FlashcardSchedulingState::new(1.2, 1, 0, now, now),
        Err(InvalidInputError::EaseFactorTooLow(1.2))
    );
    assert!(FlashcardSchedulingState::new(f64::NAN, 1, 0, now, now).is_err());
    assert_eq!(
        FlashcardSchedulingState::new(2.5, 0, 0, now, now),
        Err(InvalidInputError::IntervalOutOfRange(0))
    );
    assert_eq!(
        FlashcardSchedulingState::new(2.5, 366, 0, now, now),
        Err(InvalidInputError::IntervalOutOfRange(366))
    );
    assert!(FlashcardSchedulingState::new(1.3, 365, 7, now, now).is_ok());
}

#[test]
fn test_corrupted_card_is_repaired_on_read() {
    let now = at(2025, 5, 10);
    let mut card = NewCard {
        lesson_id: None,
        question: String::from("Capital of Kenya?"),
        answer: String::from("Nairobi"),
        hint: None,
        difficulty: Difficulty::Medium,
        tags: Default::default(),
    }
    .into_card(1, 1, now);
    card.ease_factor = 0.4;
    card.interval_days = 1000;

    let state = card.state();
    assert_eq!(state.ease_factor(), 1.3);
    assert_eq!(state.interval_days(), 365);
}

#[test]
fn test_tags_are_validated() {
    let tags = Tags::new(vec![String::from("swahili"), String::from("verbs")]).unwrap();
    assert!(tags.contains("verbs"));
    assert!(!tags.contains("verb"));
    assert_eq!(tags.iter().collect::<Vec<_>>(), vec!["swahili", "verbs"]);

    assert_eq!(
        Tags::new(vec!["x".repeat(51)]),
        Err(InvalidInputError::FieldLength {
            field: "tag",
            min: 1,
            max: 50,
            len: 51
        })
    );
    assert!(Tags::new(vec!["x".repeat(50)]).is_ok());
    assert!(Tags::new(vec![String::new()]).is_err());
    assert_eq!(
        Tags::new(vec![String::from("a,b")]),
        Err(InvalidInputError::TagSeparator(String::from("a,b")))
    );
}
