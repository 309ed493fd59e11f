use crate::add::{add, Authoring};
use crate::store::CardBox;
use anyhow::Result;
use log::info;
use std::path::Path;

/// Initializes a new card box.
pub fn init(path: &Path, authoring: &Authoring) -> Result<()> {
    CardBox::create(path)?;
    info!("Created card box {:?}", path);
    println!("Created new card box {:?}\n", path);
    add(path, authoring)
}
