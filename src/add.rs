use crate::models::{Difficulty, NewCard, Tags};
use crate::store::CardBox;
use crate::utils::{check_length, read_line};
use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use log::info;
use std::collections::HashMap;
use std::io::{stdin, stdout, BufRead, Write};
use std::path::Path;

pub const QUESTION_LEN: (usize, usize) = (5, 500);
pub const ANSWER_LEN: (usize, usize) = (1, 1000);
pub const HINT_MAX_LEN: usize = 200;

/// Where new cards go and how they are tagged.
pub struct Authoring {
    pub user_id: u64,
    pub lesson_id: Option<u64>,
    pub difficulty: Difficulty,
    pub tags: Vec<String>,
}

/// Lets user add as many new cards as they want to a given card box.
pub fn add(path: &Path, authoring: &Authoring) -> Result<()> {
    let mut card_box = CardBox::open(path)?;
    let mut stdout_lock = stdout().lock();
    let mut stdin_lock = stdin().lock();
    add_cards(
        Utc::now(),
        &mut card_box,
        authoring,
        &mut stdin_lock,
        &mut stdout_lock,
    )
}

fn add_cards<R, W>(
    now: DateTime<Utc>,
    card_box: &mut CardBox,
    authoring: &Authoring,
    mut stdin: R,
    mut stdout: W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let tags = Tags::new(authoring.tags.clone())?;
    let mut questions = build_lookup_table(card_box, authoring.user_id);

    loop {
        stdout.write_all(b"Question: ")?;
        stdout.flush()?;
        // Exit on empty input
        let question = match read_line(&mut stdin)? {
            Some(q) if !q.is_empty() => q,
            _ => return Ok(()),
        };
        check_length("question", &question, QUESTION_LEN.0, QUESTION_LEN.1)?;
        if let Some(i) = questions.get(&question) {
            return Err(anyhow!(
                "A card with this question already exists. Please check line {} of your card box!",
                i
            ));
        }

        stdout.write_all(b"Answer:   ")?;
        stdout.flush()?;
        let answer = read_line(&mut stdin)?.unwrap_or_default();
        check_length("answer", &answer, ANSWER_LEN.0, ANSWER_LEN.1)?;

        stdout.write_all(b"Hint:     ")?;
        stdout.flush()?;
        let hint = read_line(&mut stdin)?.filter(|h| !h.is_empty());
        if let Some(hint) = &hint {
            check_length("hint", hint, 0, HINT_MAX_LEN)?;
        }
        stdout.write_all(b"\n")?;
        stdout.flush()?;

        let id = card_box.next_id();
        let card = NewCard {
            lesson_id: authoring.lesson_id,
            question: question.clone(),
            answer,
            hint,
            difficulty: authoring.difficulty,
            tags: tags.clone(),
        }
        .into_card(id, authoring.user_id, now);
        card_box.insert(card)?;
        info!("Added card {} for user {}", id, authoring.user_id);
        if let Some(line) = card_box.line_of(id) {
            questions.insert(question, line);
        }
    }
}

fn build_lookup_table(card_box: &CardBox, user_id: u64) -> HashMap<String, usize> {
    card_box
        .user_cards(user_id)
        .filter_map(|c| card_box.line_of(c.id).map(|line| (c.question.clone(), line)))
        .collect()
}

#[cfg(test)]
fn authoring(user_id: u64) -> Authoring {
    Authoring {
        user_id,
        lesson_id: Some(12),
        difficulty: Difficulty::Medium,
        tags: vec![String::from("grammar"), String::from("english")],
    }
}

#[test]
fn test_add_cards_stops_at_duplicate_question() {
    use crate::models::at;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(
        b"What is a noun?\nA naming word\n\n\
    What is a verb?\nA doing word\nAction\n\
    What is a noun?\n",
    );
    let now = at(2025, 5, 10);
    let result = add_cards(now, &mut card_box, &authoring(1), &mut stdin, &mut stdout);

    // Check prompts
    let stdout_vec = stdout.into_inner();
    assert_eq!(
        String::from_utf8_lossy(&stdout_vec),
        "Question: Answer:   Hint:     \nQuestion: Answer:   Hint:     \nQuestion: "
    );

    // Check result: error message with line number
    assert_eq!(
        result.unwrap_err().to_string(),
        "A card with this question already exists. Please check line 2 of your card box!"
    );

    // Check cards written to the card box
    let reopened = CardBox::open(&path).unwrap();
    let cards = reopened.cards();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].id, 1);
    assert_eq!(cards[0].hint, None);
    assert_eq!(cards[1].id, 2);
    assert_eq!(cards[1].hint.as_deref(), Some("Action"));
    assert_eq!(cards[1].lesson_id, Some(12));
    assert_eq!(cards[1].tags.iter().collect::<Vec<_>>(), vec!["grammar", "english"]);
    assert_eq!(cards[1].state().ease_factor(), 2.5);
    assert_eq!(cards[1].state().next_review_at(), at(2025, 5, 11));
}

#[test]
fn test_same_question_is_allowed_for_another_user() {
    use crate::models::at;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let now = at(2025, 5, 10);
    let mut stdin = Cursor::new(b"What is a noun?\nA naming word\n\n");
    add_cards(now, &mut card_box, &authoring(1), &mut stdin, Vec::new()).unwrap();
    let mut stdin = Cursor::new(b"What is a noun?\nA naming word\n\n");
    add_cards(now, &mut card_box, &authoring(2), &mut stdin, Vec::new()).unwrap();

    assert_eq!(card_box.cards().len(), 2);
    assert_eq!(card_box.user_cards(2).count(), 1);
}

#[test]
fn test_add_cards_rejects_short_question() {
    use crate::error::InvalidInputError;
    use crate::models::at;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let mut stdin = Cursor::new(b"Why?\n");
    let err = add_cards(at(2025, 5, 10), &mut card_box, &authoring(1), &mut stdin, Vec::new())
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InvalidInputError>(),
        Some(InvalidInputError::FieldLength { field: "question", len: 4, .. })
    ));
    assert!(card_box.cards().is_empty());
}

#[test]
fn test_add_cards_rejects_long_tag_before_prompting() {
    use crate::error::InvalidInputError;
    use crate::models::at;
    use std::io::Cursor;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let mut tagged = authoring(1);
    tagged.tags.push("t".repeat(51));
    let mut stdout = Cursor::new(Vec::new());
    let mut stdin = Cursor::new(b"What is a noun?\nA naming word\n\n");
    let err = add_cards(at(2025, 5, 10), &mut card_box, &tagged, &mut stdin, &mut stdout)
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<InvalidInputError>(),
        Some(InvalidInputError::FieldLength { field: "tag", len: 51, .. })
    ));
    assert!(stdout.into_inner().is_empty());
    assert!(CardBox::open(&path).unwrap().cards().is_empty());
}
