//! Persistence of cards and their scheduling state.

use crate::models::{Card, FlashcardSchedulingState};
use crate::utils::{create_reader, create_writer};
use anyhow::{anyhow, Result};
use log::debug;
use std::collections::HashMap;
#[cfg(test)]
use std::fs;
use std::path::{Path, PathBuf};
use struct_field_names_as_array::FieldNamesAsArray;
use tempfile::NamedTempFile;

/// Where review sessions load card state from and write it back to.
///
/// Implementations must serialize writes for the same card; the scheduler
/// itself assumes the state it was handed is the latest one.
pub trait FlashcardStore {
    fn load_state(&self, card_id: u64, user_id: u64) -> Result<FlashcardSchedulingState>;

    fn save_state(
        &mut self,
        card_id: u64,
        user_id: u64,
        state: FlashcardSchedulingState,
    ) -> Result<()>;
}

fn not_found(card_id: u64, user_id: u64) -> anyhow::Error {
    anyhow!("Card {} not found for user {}.", card_id, user_id)
}

/// A card box: every card of every user in one CSV file.
pub struct CardBox {
    path: PathBuf,
    cards: Vec<Card>,
}

impl CardBox {
    /// Creates an empty card box holding only the header line.
    pub fn create(path: &Path) -> Result<CardBox> {
        if path.exists() {
            return Err(anyhow!(
                "File {:?} already exists! Use `elimu add` to add new cards. Aborting.",
                path
            ));
        }
        let card_box = CardBox {
            path: path.to_path_buf(),
            cards: Vec::new(),
        };
        card_box.save()?;
        Ok(card_box)
    }

    pub fn open(path: &Path) -> Result<CardBox> {
        if !path.exists() {
            return Err(anyhow!(
                "File {:?} doesn't exist. Use `elimu init` to create it. Aborting.",
                path
            ));
        }
        let mut reader = create_reader(path)?;
        let mut cards = Vec::new();
        let mut lines = HashMap::<u64, usize>::new();
        for (i, record) in reader.records().enumerate() {
            let line = i + 2;
            let card = record?.deserialize::<Card>(None)?;
            if let Some(j) = lines.get(&card.id) {
                return Err(anyhow!(
                    "The card id {} in line {} is a duplicate! \
                     Please check line {} of your card box!",
                    card.id,
                    line,
                    j,
                ));
            }
            lines.insert(card.id, line);
            cards.push(card);
        }
        debug!("Loaded {} cards from {:?}", cards.len(), path);
        Ok(CardBox {
            path: path.to_path_buf(),
            cards,
        })
    }

    /// Writes the whole box to a temporary file next to it and swaps it in.
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = create_writer(tmp.as_file_mut());
            writer.write_record(Card::FIELD_NAMES_AS_ARRAY)?;
            for card in &self.cards {
                writer.serialize(card)?;
            }
            writer.flush()?;
        }
        tmp.persist(&self.path)?;
        debug!("Wrote {} cards to {:?}", self.cards.len(), self.path);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn user_cards(&self, user_id: u64) -> impl Iterator<Item = &Card> {
        self.cards.iter().filter(move |c| c.user_id == user_id)
    }

    pub fn find(&self, card_id: u64, user_id: u64) -> Option<&Card> {
        self.cards
            .iter()
            .find(|c| c.id == card_id && c.user_id == user_id)
    }

    fn find_mut(&mut self, card_id: u64, user_id: u64) -> Option<&mut Card> {
        self.cards
            .iter_mut()
            .find(|c| c.id == card_id && c.user_id == user_id)
    }

    /// Line of the card box a card sits on, counting the header as line 1.
    pub fn line_of(&self, card_id: u64) -> Option<usize> {
        self.cards.iter().position(|c| c.id == card_id).map(|i| i + 2)
    }

    pub fn next_id(&self) -> u64 {
        self.cards.iter().map(|c| c.id).max().unwrap_or(0) + 1
    }

    /// Appends a card and persists the box.
    pub fn insert(&mut self, card: Card) -> Result<()> {
        if self.cards.iter().any(|c| c.id == card.id) {
            return Err(anyhow!("A card with id {} already exists.", card.id));
        }
        self.cards.push(card);
        self.save()
    }

    /// Removes one of the user's cards and persists the box.
    pub fn remove(&mut self, card_id: u64, user_id: u64) -> Result<Card> {
        let i = self
            .cards
            .iter()
            .position(|c| c.id == card_id && c.user_id == user_id)
            .ok_or_else(|| not_found(card_id, user_id))?;
        let card = self.cards.remove(i);
        self.save()?;
        Ok(card)
    }
}

impl FlashcardStore for CardBox {
    fn load_state(&self, card_id: u64, user_id: u64) -> Result<FlashcardSchedulingState> {
        self.find(card_id, user_id)
            .map(Card::state)
            .ok_or_else(|| not_found(card_id, user_id))
    }

    fn save_state(
        &mut self,
        card_id: u64,
        user_id: u64,
        state: FlashcardSchedulingState,
    ) -> Result<()> {
        self.find_mut(card_id, user_id)
            .ok_or_else(|| not_found(card_id, user_id))?
            .set_state(state);
        self.save()
    }
}

/// Keeps states in memory only. Handy for embedding the scheduler somewhere
/// that persists elsewhere, and for tests.
#[derive(Default)]
pub struct MemoryStore {
    states: HashMap<(u64, u64), FlashcardSchedulingState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, card_id: u64, user_id: u64, state: FlashcardSchedulingState) {
        self.states.insert((card_id, user_id), state);
    }
}

impl FlashcardStore for MemoryStore {
    fn load_state(&self, card_id: u64, user_id: u64) -> Result<FlashcardSchedulingState> {
        self.states
            .get(&(card_id, user_id))
            .copied()
            .ok_or_else(|| not_found(card_id, user_id))
    }

    fn save_state(
        &mut self,
        card_id: u64,
        user_id: u64,
        state: FlashcardSchedulingState,
    ) -> Result<()> {
        match self.states.get_mut(&(card_id, user_id)) {
            Some(slot) => {
                *slot = state;
                Ok(())
            }
            None => Err(not_found(card_id, user_id)),
        }
    }
}

#[cfg(test)]
fn sample_card(id: u64, user_id: u64, question: &str) -> Card {
    use crate::models::{at, Difficulty, NewCard, Tags};

    NewCard {
        lesson_id: Some(3),
        question: question.to_string(),
        answer: String::from("answer | with #hash"),
        hint: None,
        difficulty: Difficulty::Hard,
        tags: Tags(vec![String::from("biology"), String::from("cell #2")]),
    }
    .into_card(id, user_id, at(2025, 5, 10))
}

#[test]
fn test_card_box_round_trips_through_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    card_box.insert(sample_card(1, 7, "What is photosynthesis?")).unwrap();
    card_box.insert(sample_card(2, 8, "What is osmosis?")).unwrap();

    let header = fs::read_to_string(&path).unwrap();
    assert!(header.starts_with(
        "id|user_id|lesson_id|question|answer|hint|difficulty|tags|created_at|ease_factor|\
         interval_days|review_count|last_reviewed_at|next_review_at\n"
    ));

    let reopened = CardBox::open(&path).unwrap();
    assert_eq!(reopened.cards(), card_box.cards());
    assert_eq!(reopened.next_id(), 3);
    assert_eq!(reopened.line_of(2), Some(3));
    assert_eq!(reopened.user_cards(7).count(), 1);
}

#[test]
fn test_save_leaves_no_stray_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("deck.tmp"), "someone else's file").unwrap();
    let path = dir.path().join("deck.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    card_box.insert(sample_card(1, 7, "What is photosynthesis?")).unwrap();
    card_box.insert(sample_card(2, 7, "What is osmosis?")).unwrap();

    let mut names: Vec<String> = fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["deck.csv", "deck.tmp"]);
    assert_eq!(
        fs::read_to_string(dir.path().join("deck.tmp")).unwrap(),
        "someone else's file"
    );
}

#[test]
fn test_card_box_state_is_scoped_to_owner() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    card_box.insert(sample_card(1, 7, "What is photosynthesis?")).unwrap();

    assert!(card_box.load_state(1, 7).is_ok());
    let err = card_box.load_state(1, 8).unwrap_err();
    assert_eq!(err.to_string(), "Card 1 not found for user 8.");
    assert!(card_box.remove(1, 8).is_err());
    assert_eq!(card_box.remove(1, 7).unwrap().id, 1);
    assert!(CardBox::open(&path).unwrap().cards().is_empty());
}

#[test]
fn test_card_box_rejects_duplicate_ids() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    let mut card_box = CardBox::create(&path).unwrap();
    card_box.insert(sample_card(1, 7, "What is photosynthesis?")).unwrap();
    assert!(card_box.insert(sample_card(1, 7, "What is osmosis?")).is_err());

    let text = fs::read_to_string(&path).unwrap();
    let row = text.lines().nth(1).unwrap().to_string();
    fs::write(&path, format!("{}{}\n", text, row)).unwrap();
    assert_eq!(
        CardBox::open(&path).err().unwrap().to_string(),
        "The card id 1 in line 3 is a duplicate! Please check line 2 of your card box!"
    );
}

#[test]
fn test_create_refuses_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("box.csv");
    CardBox::create(&path).unwrap();
    assert!(CardBox::create(&path).is_err());
    assert!(CardBox::open(&dir.path().join("missing.csv")).is_err());
}

#[test]
fn test_memory_store_only_updates_known_cards() {
    use crate::models::at;

    let mut store = MemoryStore::new();
    let state = FlashcardSchedulingState::initial(at(2025, 5, 10));
    assert!(store.save_state(1, 1, state).is_err());
    store.insert(1, 1, state);
    assert_eq!(store.load_state(1, 1).unwrap(), state);
    assert!(store.load_state(1, 2).is_err());
}
