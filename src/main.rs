use anyhow::Result;
use clap::{Parser, Subcommand};
use elimu::add::{add, Authoring};
use elimu::delete::delete;
use elimu::init::init;
use elimu::list::{list, Filter, DEFAULT_LIMIT};
use elimu::models::Difficulty;
use elimu::review::{rate, review};
use elimu::stats::stats;
use std::path::PathBuf;

/// Spaced-repetition flashcards for ElimuAI learners.
#[derive(Parser)]
#[command(name = "elimu", version)]
struct Cli {
    /// Owner of the cards to work on
    #[arg(long, global = true, env = "ELIMU_USER", default_value_t = 1)]
    user: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new card box and start adding cards
    Init {
        /// Path to card box (CSV file)
        path: PathBuf,
        /// Lesson the new cards belong to
        #[arg(long)]
        lesson: Option<u64>,
        /// Difficulty recorded on the new cards
        #[arg(long, value_enum, default_value = "medium")]
        difficulty: Difficulty,
        /// Tag for the new cards, repeat or separate with commas
        #[arg(long = "tag", value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Add cards to an existing card box
    Add {
        /// Path to card box (CSV file)
        path: PathBuf,
        /// Lesson the new cards belong to
        #[arg(long)]
        lesson: Option<u64>,
        /// Difficulty recorded on the new cards
        #[arg(long, value_enum, default_value = "medium")]
        difficulty: Difficulty,
        /// Tag for the new cards, repeat or separate with commas
        #[arg(long = "tag", value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Review all due cards
    Review {
        /// Path to card box (CSV file)
        path: PathBuf,
    },

    /// Rate a single card without the interactive prompt
    Rate {
        /// Path to card box (CSV file)
        path: PathBuf,
        /// Id of the card to rate
        #[arg(long)]
        card: u64,
        /// Recall quality, 0 (blackout) to 5 (perfect)
        #[arg(long, allow_negative_numbers = true)]
        quality: String,
    },

    /// List cards, soonest due first
    List {
        /// Path to card box (CSV file)
        path: PathBuf,
        /// Only show cards of this lesson
        #[arg(long)]
        lesson: Option<u64>,
        /// Only show cards carrying this tag
        #[arg(long)]
        tag: Option<String>,
        /// Only show cards that are due now
        #[arg(long)]
        due: bool,
        /// Show at most this many cards
        #[arg(long, default_value_t = DEFAULT_LIMIT)]
        limit: usize,
    },

    /// Delete a card
    Delete {
        /// Path to card box (CSV file)
        path: PathBuf,
        /// Id of the card to delete
        #[arg(long)]
        card: u64,
    },

    /// Show spaced-repetition statistics
    Stats {
        /// Path to card box (CSV file)
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Cli::parse();
    let user = args.user;

    match args.command {
        Command::Init {
            path,
            lesson,
            difficulty,
            tags,
        } => init(
            &path,
            &Authoring {
                user_id: user,
                lesson_id: lesson,
                difficulty,
                tags,
            },
        ),
        Command::Add {
            path,
            lesson,
            difficulty,
            tags,
        } => add(
            &path,
            &Authoring {
                user_id: user,
                lesson_id: lesson,
                difficulty,
                tags,
            },
        ),
        Command::Review { path } => review(&path, user),
        Command::Rate {
            path,
            card,
            quality,
        } => rate(&path, user, card, &quality),
        Command::List {
            path,
            lesson,
            tag,
            due,
            limit,
        } => list(
            &path,
            user,
            &Filter {
                lesson_id: lesson,
                tag,
                due_only: due,
                limit,
            },
        ),
        Command::Delete { path, card } => delete(&path, user, card),
        Command::Stats { path } => stats(&path, user),
    }
}
