use crate::models::Card;
use crate::store::CardBox;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::cmp::Reverse;
use std::io::{stdout, Write};
use std::path::Path;

pub const DEFAULT_LIMIT: usize = 50;

pub struct Filter {
    pub lesson_id: Option<u64>,
    pub tag: Option<String>,
    pub due_only: bool,
    pub limit: usize,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            lesson_id: None,
            tag: None,
            due_only: false,
            limit: DEFAULT_LIMIT,
        }
    }
}

/// Prints the user's cards, soonest due first.
pub fn list(path: &Path, user_id: u64, filter: &Filter) -> Result<()> {
    let card_box = CardBox::open(path)?;
    let now = Utc::now();
    let cards = select_cards(&card_box, user_id, filter, now);
    write_cards(&mut stdout().lock(), &cards, now)
}

fn select_cards<'a>(
    card_box: &'a CardBox,
    user_id: u64,
    filter: &Filter,
    now: DateTime<Utc>,
) -> Vec<&'a Card> {
    let mut cards: Vec<&Card> = card_box
        .user_cards(user_id)
        .filter(|c| filter.lesson_id.is_none() || c.lesson_id == filter.lesson_id)
        .filter(|c| filter.tag.as_deref().is_none_or(|t| c.tags.contains(t)))
        .filter(|c| !filter.due_only || c.is_due(now))
        .collect();
    cards.sort_by_key(|c| (c.next_review_at, Reverse(c.created_at)));
    cards.truncate(filter.limit);
    cards
}

fn write_cards<W: Write>(out: &mut W, cards: &[&Card], now: DateTime<Utc>) -> Result<()> {
    for card in cards {
        let due = if card.is_due(now) {
            String::from("due now")
        } else {
            card.next_review_at.format("%Y-%m-%d %H:%M").to_string()
        };
        write!(
            out,
            "#{:<4} {:<16} {:>3}d  {}",
            card.id, due, card.interval_days, card.question
        )?;
        if !card.tags.is_empty() {
            write!(out, "  [{}]", card.tags.0.join(", "))?;
        }
        writeln!(out)?;
    }
    writeln!(out, "\nTotal: {}", cards.len())?;
    Ok(())
}

#[cfg(test)]
fn card_box_with(cards: Vec<Card>) -> (tempfile::TempDir, CardBox) {
    let dir = tempfile::tempdir().unwrap();
    let mut card_box = CardBox::create(&dir.path().join("box.csv")).unwrap();
    for card in cards {
        card_box.insert(card).unwrap();
    }
    (dir, card_box)
}

#[cfg(test)]
fn card(id: u64, user_id: u64, lesson_id: Option<u64>, created: DateTime<Utc>) -> Card {
    use crate::models::{Difficulty, NewCard};

    NewCard {
        lesson_id,
        question: format!("Question number {}", id),
        answer: String::from("Answer"),
        hint: None,
        difficulty: Difficulty::Medium,
        tags: Default::default(),
    }
    .into_card(id, user_id, created)
}

#[test]
fn test_select_cards_orders_by_due_then_newest() {
    use crate::models::at;

    // Same due date as card 3, but authored earlier
    let mut older = card(1, 1, None, at(2025, 5, 3));
    older.created_at = at(2025, 4, 1);
    let (_dir, card_box) = card_box_with(vec![
        older,
        card(2, 1, None, at(2025, 5, 1)),
        card(3, 1, None, at(2025, 5, 3)),
        card(4, 2, None, at(2025, 5, 1)),
    ]);

    let ids: Vec<u64> = select_cards(&card_box, 1, &Filter::default(), at(2025, 5, 10))
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![2, 3, 1]);
}

#[test]
fn test_select_cards_filters_lesson_due_and_limit() {
    use crate::models::at;

    let (_dir, card_box) = card_box_with(vec![
        card(1, 1, Some(5), at(2025, 5, 1)),
        card(2, 1, Some(6), at(2025, 5, 1)),
        card(3, 1, Some(5), at(2025, 5, 20)),
        card(4, 1, Some(5), at(2025, 5, 2)),
    ]);
    let now = at(2025, 5, 10);

    let filter = Filter {
        lesson_id: Some(5),
        due_only: true,
        ..Filter::default()
    };
    let ids: Vec<u64> = select_cards(&card_box, 1, &filter, now)
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![1, 4]);

    let filter = Filter {
        limit: 1,
        ..Filter::default()
    };
    assert_eq!(select_cards(&card_box, 1, &filter, now).len(), 1);
}

#[test]
fn test_select_cards_by_tag() {
    use crate::models::{at, Tags};

    let mut tagged = card(2, 1, None, at(2025, 5, 1));
    tagged.tags = Tags(vec![String::from("algebra"), String::from("exam")]);
    let (_dir, card_box) = card_box_with(vec![card(1, 1, None, at(2025, 5, 1)), tagged]);
    let filter = Filter {
        tag: Some(String::from("exam")),
        ..Filter::default()
    };

    let ids: Vec<u64> = select_cards(&card_box, 1, &filter, at(2025, 5, 10))
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(ids, vec![2]);
}

#[test]
fn test_write_cards() {
    use crate::models::{at, Tags};

    let mut tagged = card(2, 1, None, at(2025, 5, 20));
    tagged.tags = Tags(vec![String::from("algebra"), String::from("exam")]);
    let (_dir, card_box) = card_box_with(vec![card(1, 1, None, at(2025, 5, 1)), tagged]);
    let cards: Vec<&Card> = card_box.cards().iter().collect();
    let mut out = Vec::new();
    write_cards(&mut out, &cards, at(2025, 5, 10)).unwrap();
    assert_eq!(
        String::from_utf8(out).unwrap(),
        "#1    due now            1d  Question number 1\n\
         #2    2025-05-21 08:00   1d  Question number 2  [algebra, exam]\n\
         \nTotal: 2\n"
    );
}
