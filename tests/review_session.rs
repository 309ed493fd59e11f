use chrono::{DateTime, TimeZone, Utc};
use elimu::models::{Difficulty, NewCard, Tags};
use elimu::{CardBox, FlashcardStore, InvalidInputError, Quality, ReviewSession};

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 5, d, 9, 30, 0).unwrap()
}

fn new_card(question: &str, answer: &str) -> NewCard {
    NewCard {
        lesson_id: Some(1),
        question: question.to_string(),
        answer: answer.to_string(),
        hint: None,
        difficulty: Difficulty::Medium,
        tags: Default::default(),
    }
}

#[test]
fn test_card_climbs_ladder_and_lapses_across_reopens() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("biology.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let card = new_card("What does the mitochondrion do?", "Produces ATP");
    card_box.insert(card.into_card(1, 42, day(1))).unwrap();
    drop(card_box);

    let five = Quality::MAX;
    let mut ratings = vec![(day(2), five), (day(3), five), (day(9), five)];
    ratings.push((day(25), Quality::new(1).unwrap()));

    let mut intervals = Vec::new();
    for (now, quality) in ratings {
        // Every review starts from what is on disk
        let mut card_box = CardBox::open(&path).unwrap();
        let outcome = ReviewSession::new(&mut card_box)
            .submit(1, 42, quality, now)
            .unwrap();
        intervals.push(outcome.state.interval_days());
    }
    assert_eq!(intervals, vec![1, 6, 16, 1]);

    let card_box = CardBox::open(&path).unwrap();
    let state = card_box.load_state(1, 42).unwrap();
    assert_eq!(state.review_count(), 0);
    assert!((state.ease_factor() - 2.8).abs() < 1e-9);
    assert_eq!(state.last_reviewed_at(), day(25));
    assert_eq!(state.next_review_at(), day(26));
}

#[test]
fn test_rejected_rating_is_reported_and_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("history.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    card_box
        .insert(new_card("When did Kenya gain independence?", "1963").into_card(1, 7, day(1)))
        .unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    let err = ReviewSession::new(&mut card_box)
        .submit_rating(1, 7, 6, day(2))
        .unwrap_err();
    assert!(err.downcast_ref::<InvalidInputError>().is_some());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
}

#[test]
fn test_corrupted_row_is_repaired_on_review() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("maths.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let mut card = new_card("What is seven squared?", "49").into_card(1, 7, day(1));
    card.ease_factor = 0.9;
    card.interval_days = 0;
    card.review_count = 3;
    card_box.insert(card).unwrap();

    let outcome = ReviewSession::new(&mut card_box)
        .submit(1, 7, Quality::new(4).unwrap(), day(2))
        .unwrap();
    assert_eq!(outcome.previous.ease_factor(), 1.3);
    assert_eq!(outcome.previous.interval_days(), 1);
    // round(1 * 1.3) = 1
    assert_eq!(outcome.state.interval_days(), 1);
    assert_eq!(outcome.state.review_count(), 4);
    assert!(outcome.state.ease_factor() >= 1.3);
}

#[test]
fn test_long_review_history_keeps_counting_at_the_ceiling() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("veteran.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let mut card = new_card("What is the capital of Kenya?", "Nairobi").into_card(1, 7, day(1));
    card.tags = Tags::new(vec![String::from("geography")]).unwrap();
    card.interval_days = 10;
    card.review_count = u32::MAX;
    card_box.insert(card).unwrap();

    let outcome = ReviewSession::new(&mut card_box)
        .submit(1, 7, Quality::MAX, day(2))
        .unwrap();
    assert_eq!(outcome.state.review_count(), u32::MAX);
    assert_eq!(outcome.state.interval_days(), 25);

    let reopened = CardBox::open(&path).unwrap();
    let card = reopened.find(1, 7).unwrap();
    assert_eq!(card.review_count, u32::MAX);
    assert!(card.tags.contains("geography"));
}
