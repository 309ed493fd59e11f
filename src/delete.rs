use crate::store::CardBox;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Removes one of the user's cards for good.
pub fn delete(path: &Path, user_id: u64, card_id: u64) -> Result<()> {
    let mut card_box = CardBox::open(path)?;
    let card = card_box.remove(card_id, user_id)?;
    info!("Deleted card {} of user {}", card.id, user_id);
    println!("Deleted card {}: {}", card.id, card.question);
    Ok(())
}

#[test]
fn test_delete_only_removes_own_card() {
    use crate::models::{at, Difficulty, NewCard};

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    let card = NewCard {
        lesson_id: None,
        question: String::from("Largest lake in Africa?"),
        answer: String::from("Lake Victoria"),
        hint: None,
        difficulty: Difficulty::Easy,
        tags: Default::default(),
    }
    .into_card(1, 1, at(2025, 5, 10));
    card_box.insert(card).unwrap();

    assert_eq!(
        delete(&path, 2, 1).unwrap_err().to_string(),
        "Card 1 not found for user 2."
    );
    delete(&path, 1, 1).unwrap();
    assert!(CardBox::open(&path).unwrap().cards().is_empty());
}
