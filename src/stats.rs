use crate::models::Card;
use crate::store::CardBox;
use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use std::fmt;
use std::path::Path;

#[derive(Default, Debug, PartialEq)]
struct Counts {
    day: u64,
    week: u64,
    month: u64,
    quarter: u64,
    year: u64,
    max: u64,
}

impl Counts {
    fn increment_count(&mut self, days: u32) {
        match days {
            0..2 => self.day += 1,
            2..7 => self.week += 1,
            7..30 => self.month += 1,
            30..90 => self.quarter += 1,
            90..365 => self.year += 1,
            _ => self.max += 1,
        }
    }

    fn total(&self) -> u64 {
        self.day + self.week + self.month + self.quarter + self.year + self.max
    }
}

impl fmt::Display for Counts {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            concat!(
                "Current review intervals:\n",
                "  =day     {}\n",
                "  <week    {}\n",
                "  <month   {}\n",
                "  <quarter {}\n",
                "  <year    {}\n",
                "  =year    {}\n\n",
                "Total: {}"
            ),
            self.day,
            self.week,
            self.month,
            self.quarter,
            self.year,
            self.max,
            self.total(),
        )
    }
}

/// Spaced-repetition summary for one user.
#[derive(Default, Debug, PartialEq)]
struct Summary {
    total_cards: u64,
    due_now: u64,
    due_soon: u64,
    ease_sum: f64,
    total_reviews: u64,
    intervals: Counts,
}

impl Summary {
    fn collect<'a>(cards: impl Iterator<Item = &'a Card>, now: DateTime<Utc>) -> Summary {
        let soon = now + TimeDelta::days(1);
        let mut summary = Summary::default();
        for card in cards {
            let state = card.state();
            summary.total_cards += 1;
            if state.is_due(now) {
                summary.due_now += 1;
            }
            if state.is_due(soon) {
                summary.due_soon += 1;
            }
            summary.ease_sum += state.ease_factor();
            summary.total_reviews += state.review_count() as u64;
            summary.intervals.increment_count(state.interval_days());
        }
        summary
    }

    fn average_ease(&self) -> Option<f64> {
        if self.total_cards == 0 {
            None
        } else {
            Some(self.ease_sum / self.total_cards as f64)
        }
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let average_ease = match self.average_ease() {
            Some(ease) => format!("{:.2}", ease),
            None => String::from("-"),
        };
        write!(
            f,
            concat!(
                "Cards:            {}\n",
                "Due now:          {}\n",
                "Due within a day: {}\n",
                "Average ease:     {}\n",
                "Reviews:          {}\n\n",
                "{}"
            ),
            self.total_cards,
            self.due_now,
            self.due_soon,
            average_ease,
            self.total_reviews,
            self.intervals,
        )
    }
}

pub fn stats(path: &Path, user_id: u64) -> Result<()> {
    let card_box = CardBox::open(path)?;
    let summary = Summary::collect(card_box.user_cards(user_id), Utc::now());
    println!("{}", summary);
    Ok(())
}

#[test]
fn test_increment_count_buckets() {
    let mut counts = Counts::default();
    for days in [1, 2, 6, 7, 29, 30, 89, 90, 364, 365] {
        counts.increment_count(days);
    }
    assert_eq!(
        counts,
        Counts {
            day: 1,
            week: 2,
            month: 2,
            quarter: 2,
            year: 2,
            max: 1,
        }
    );
    assert_eq!(counts.total(), 10);
}

#[test]
fn test_summary() {
    use crate::models::{at, Difficulty, FlashcardSchedulingState, NewCard};

    let card = |id: u64, created: DateTime<Utc>| {
        NewCard {
            lesson_id: None,
            question: format!("Question number {}", id),
            answer: String::from("Answer"),
            hint: None,
            difficulty: Difficulty::Medium,
            tags: Default::default(),
        }
        .into_card(id, 1, created)
    };
    let now = at(2025, 5, 10);
    let mut seasoned = card(3, at(2025, 1, 1));
    seasoned.set_state(
        FlashcardSchedulingState::new(2.1, 40, 4, at(2025, 6, 1), at(2025, 4, 22)).unwrap(),
    );
    let cards = vec![card(1, at(2025, 5, 1)), card(2, now), seasoned];

    let summary = Summary::collect(cards.iter(), now);
    assert_eq!(summary.total_cards, 3);
    assert_eq!(summary.due_now, 1);
    assert_eq!(summary.due_soon, 2);
    assert_eq!(summary.total_reviews, 4);
    assert!((summary.average_ease().unwrap() - 2.3666).abs() < 1e-3);
    assert_eq!(summary.intervals.day, 2);
    assert_eq!(summary.intervals.quarter, 1);

    let text = summary.to_string();
    assert!(text.starts_with("Cards:            3\nDue now:          1\n"));
    assert!(text.contains("Average ease:     2.37\n"));
    assert!(text.ends_with("Total: 3"));
}

#[test]
fn test_empty_summary() {
    let summary = Summary::collect(std::iter::empty(), Utc::now());
    assert_eq!(summary.average_ease(), None);
    assert!(summary.to_string().contains("Average ease:     -\n"));
}
