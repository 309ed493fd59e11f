use crate::models::{Card, FlashcardSchedulingState};
use crate::scheduler::{compute_next_state, Quality};
use crate::store::{CardBox, FlashcardStore};
use crate::utils::{clear, plural, read_line};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use std::io::{stdin, stdout, BufRead, Write};
use std::path::Path;

/// What a single rating did to a card.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub card_id: u64,
    pub quality: Quality,
    pub previous: FlashcardSchedulingState,
    pub state: FlashcardSchedulingState,
}

impl ReviewOutcome {
    pub fn is_correct(&self) -> bool {
        self.quality.is_passing()
    }
}

/// Feeds ratings through the scheduler and writes the results back.
pub struct ReviewSession<'a, S: FlashcardStore> {
    store: &'a mut S,
}

impl<'a, S: FlashcardStore> ReviewSession<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        ReviewSession { store }
    }

    pub fn submit(
        &mut self,
        card_id: u64,
        user_id: u64,
        quality: Quality,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let previous = self.store.load_state(card_id, user_id)?;
        let state = compute_next_state(&previous, quality, now);
        self.store.save_state(card_id, user_id, state)?;
        info!(
            "Card {} rated {}: interval {} -> {} days, ease {:.2} -> {:.2}",
            card_id,
            quality,
            previous.interval_days(),
            state.interval_days(),
            previous.ease_factor(),
            state.ease_factor()
        );
        Ok(ReviewOutcome {
            card_id,
            quality,
            previous,
            state,
        })
    }

    /// Like [`submit`](Self::submit) for a rating that hasn't been validated
    /// yet. An out-of-range rating is rejected before the store is touched.
    pub fn submit_rating(
        &mut self,
        card_id: u64,
        user_id: u64,
        rating: i64,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let quality = Quality::new(rating)?;
        self.submit(card_id, user_id, quality, now)
    }
}

/// Lets user review all of their due cards once.
pub fn review(path: &Path, user_id: u64) -> Result<()> {
    let mut stdout_lock = stdout().lock();
    let mut stdin_lock = stdin().lock();
    let mut card_box = CardBox::open(path)?;
    review_due_cards(
        Utc::now(),
        &mut card_box,
        user_id,
        &mut stdin_lock,
        &mut stdout_lock,
        &mut rand::rng(),
    )
}

fn review_due_cards<R, W, G>(
    now: DateTime<Utc>,
    card_box: &mut CardBox,
    user_id: u64,
    stdin: &mut R,
    stdout: &mut W,
    rng: &mut G,
) -> Result<()>
where
    R: BufRead,
    W: Write,
    G: Rng,
{
    let mut due: Vec<Card> = card_box
        .user_cards(user_id)
        .filter(|c| c.is_due(now))
        .cloned()
        .collect();
    if due.is_empty() {
        writeln!(stdout, "No cards due for review in {:?}", card_box.path())?;
        return Ok(());
    }
    clear(stdout)?;
    writeln!(
        stdout,
        "Reviewing {} due card{} in {:?}\n",
        due.len(),
        plural(due.len()),
        card_box.path()
    )?;
    due.shuffle(rng);

    let mut session = ReviewSession::new(card_box);
    let mut num_correct = 0;
    for card in &due {
        let quality = review_card(card, stdin, stdout)?;
        let outcome = session.submit(card.id, user_id, quality, now)?;
        if outcome.is_correct() {
            num_correct += 1;
        }
        let days = outcome.state.interval_days() as usize;
        writeln!(stdout, "Next review in {} day{}.\n", days, plural(days))?;
        clear(stdout)?;
        stdout.flush()?;
    }

    writeln!(
        stdout,
        "{} review{}, {} correct. Done.",
        due.len(),
        plural(due.len()),
        num_correct
    )?;
    Ok(())
}

// Shows the card and asks for a rating until a valid one arrives.
fn review_card<R, W>(card: &Card, stdin: &mut R, stdout: &mut W) -> Result<Quality>
where
    R: BufRead,
    W: Write,
{
    writeln!(stdout, "Q: {}", card.question)?;
    if let Some(hint) = &card.hint {
        writeln!(stdout, "Hint: {}", hint)?;
    }
    stdout.flush()?;
    if read_line(&mut *stdin)?.is_none() {
        return Err(anyhow!("Input closed before the review was finished."));
    }

    writeln!(stdout, "A: {}", card.answer)?;
    loop {
        write!(stdout, "Quality (0-5): ")?;
        stdout.flush()?;
        let line = read_line(&mut *stdin)?
            .ok_or_else(|| anyhow!("Input closed before the review was finished."))?;
        match line.parse::<Quality>() {
            Ok(quality) => return Ok(quality),
            Err(e) => {
                debug!("Rejected rating {:?}", line);
                writeln!(stdout, "{}", e)?;
            }
        }
    }
}

/// Records one rating without the interactive prompt. The rating is taken as
/// typed, so "3.5" is reported the same way the review prompt reports it.
pub fn rate(path: &Path, user_id: u64, card_id: u64, rating: &str) -> Result<()> {
    let quality = rating.parse::<Quality>()?;
    let mut card_box = CardBox::open(path)?;
    let mut session = ReviewSession::new(&mut card_box);
    let outcome = session.submit(card_id, user_id, quality, Utc::now())?;
    let days = outcome.state.interval_days() as usize;
    println!(
        "Card {} reviewed. Next review: {} (in {} day{})",
        card_id,
        outcome.state.next_review_at().to_rfc3339(),
        days,
        plural(days)
    );
    Ok(())
}

#[cfg(test)]
use crate::error::InvalidInputError;
#[cfg(test)]
use crate::models::at;
#[cfg(test)]
use crate::store::MemoryStore;

#[test]
fn test_submit_persists_next_state() {
    let mut store = MemoryStore::new();
    store.insert(4, 1, FlashcardSchedulingState::initial(at(2025, 5, 9)));
    let now = at(2025, 5, 10);

    let mut session = ReviewSession::new(&mut store);
    let first = session.submit(4, 1, Quality::MAX, now).unwrap();
    assert!(first.is_correct());
    assert_eq!(first.previous.review_count(), 0);
    assert_eq!(first.state.review_count(), 1);
    let second = session.submit(4, 1, Quality::MAX, now).unwrap();
    assert_eq!(second.state.interval_days(), 6);

    assert_eq!(store.load_state(4, 1).unwrap(), second.state);
}

#[test]
fn test_invalid_rating_leaves_store_untouched() {
    let mut store = MemoryStore::new();
    let initial = FlashcardSchedulingState::initial(at(2025, 5, 9));
    store.insert(4, 1, initial);

    let mut session = ReviewSession::new(&mut store);
    for rating in [-1, 6] {
        let err = session.submit_rating(4, 1, rating, at(2025, 5, 10)).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InvalidInputError>(),
            Some(&InvalidInputError::QualityOutOfRange(rating))
        );
    }
    assert_eq!(store.load_state(4, 1).unwrap(), initial);
}

#[test]
fn test_submit_for_unknown_card_fails() {
    let mut store = MemoryStore::new();
    let mut session = ReviewSession::new(&mut store);
    assert!(session.submit(9, 1, Quality::MAX, at(2025, 5, 10)).is_err());
}

#[test]
fn test_review_card_prompts_until_valid_rating() {
    use crate::models::{Difficulty, NewCard};
    use std::io::Cursor;

    let card = NewCard {
        lesson_id: None,
        question: String::from("Capital of Tanzania?"),
        answer: String::from("Dodoma"),
        hint: Some(String::from("Not Dar es Salaam")),
        difficulty: Difficulty::Easy,
        tags: Default::default(),
    }
    .into_card(1, 1, at(2025, 5, 9));
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n7\n4.5\n4\n");

    let quality = review_card(&card, &mut stdin, &mut stdout).unwrap();
    assert_eq!(quality.value(), 4);

    let stdout_vec = stdout.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&stdout_vec),
        "Q: Capital of Tanzania?\nHint: Not Dar es Salaam\nA: Dodoma\n\
         Quality (0-5): quality must be an integer between 0 and 5, got 7\n\
         Quality (0-5): quality must be an integer between 0 and 5, got \"4.5\"\n\
         Quality (0-5): "
    );
}

#[test]
fn test_review_card_fails_on_closed_input() {
    use crate::models::{Difficulty, NewCard};
    use std::io::Cursor;

    let card = NewCard {
        lesson_id: None,
        question: String::from("Capital of Tanzania?"),
        answer: String::from("Dodoma"),
        hint: None,
        difficulty: Difficulty::Easy,
        tags: Default::default(),
    }
    .into_card(1, 1, at(2025, 5, 9));
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n");
    assert!(review_card(&card, &mut stdin, &mut stdout).is_err());
}

#[test]
fn test_review_due_cards_only_touches_due_cards_of_user() {
    use crate::models::{Difficulty, NewCard};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let new_card = |question: &str| NewCard {
        lesson_id: None,
        question: question.to_string(),
        answer: String::from("42"),
        hint: None,
        difficulty: Difficulty::Medium,
        tags: Default::default(),
    };
    // Due on 2025-05-10, not yet due, and due but owned by someone else
    card_box.insert(new_card("Six times seven?").into_card(1, 1, at(2025, 5, 9))).unwrap();
    card_box.insert(new_card("Forty plus two?").into_card(2, 1, at(2025, 5, 10))).unwrap();
    card_box.insert(new_card("Fifty minus eight?").into_card(3, 2, at(2025, 5, 9))).unwrap();

    let now = at(2025, 5, 10);
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"\n2\n");
    review_due_cards(
        now,
        &mut card_box,
        1,
        &mut stdin,
        &mut stdout,
        &mut StdRng::seed_from_u64(7),
    )
    .unwrap();

    let output = String::from_utf8(stdout.into_inner()).unwrap();
    assert!(output.contains("Reviewing 1 due card in"));
    assert!(output.contains("Q: Six times seven?\n"));
    assert!(output.ends_with("1 review, 0 correct. Done.\n"));

    let reopened = CardBox::open(&path).unwrap();
    let reviewed = reopened.find(1, 1).unwrap().state();
    assert_eq!(reviewed.review_count(), 0);
    assert_eq!(reviewed.last_reviewed_at(), now);
    assert_eq!(reviewed.next_review_at(), at(2025, 5, 11));
    assert_eq!(reopened.find(2, 1).unwrap().state().last_reviewed_at(), now);
    assert_eq!(reopened.find(3, 2).unwrap().state().last_reviewed_at(), at(2025, 5, 9));
}

#[test]
fn test_rate_rejects_fractional_rating_without_writing() {
    use crate::models::{Difficulty, NewCard};
    use std::fs;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let card = NewCard {
        lesson_id: None,
        question: String::from("Six times seven?"),
        answer: String::from("42"),
        hint: None,
        difficulty: Difficulty::Medium,
        tags: Default::default(),
    };
    card_box.insert(card.into_card(1, 1, at(2025, 5, 9))).unwrap();
    let before = fs::read_to_string(&path).unwrap();

    for rating in ["3.5", "three", ""] {
        let err = rate(&path, 1, 1, rating).unwrap_err();
        assert_eq!(
            err.downcast_ref::<InvalidInputError>(),
            Some(&InvalidInputError::QualityNotAnInteger(rating.to_string()))
        );
    }
    let err = rate(&path, 1, 1, "-1").unwrap_err();
    assert_eq!(
        err.downcast_ref::<InvalidInputError>(),
        Some(&InvalidInputError::QualityOutOfRange(-1))
    );
    assert_eq!(fs::read_to_string(&path).unwrap(), before);

    rate(&path, 1, 1, " 4 ").unwrap();
    assert_eq!(CardBox::open(&path).unwrap().find(1, 1).unwrap().state().review_count(), 1);
}
