use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use serde::{Deserialize, Serialize};
use serde_json::from_str;

static PASSAGE_DIR: Dir = include_dir!("src/passages");

/// Difficulty tier of a practice passage
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, strum_macros::Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// Inverse of the lowercase `Display` form used in storage
    pub fn parse(s: &str) -> Option<Difficulty> {
        match s {
            "easy" => Some(Difficulty::Easy),
            "medium" => Some(Difficulty::Medium),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
pub struct PassageSet {
    pub difficulty: Difficulty,
    pub passages: Vec<String>,
}

impl PassageSet {
    /// Load the embedded passage set for a difficulty tier.
    ///
    /// The sets ship inside the binary; a missing or malformed file is a
    /// build defect, so this panics rather than returning an error.
    pub fn embedded(difficulty: Difficulty) -> Self {
        let file_name = format!("{difficulty}.json");
        let file = PASSAGE_DIR
            .get_file(&file_name)
            .expect("Passage file not found");

        let contents = file
            .contents_utf8()
            .expect("Unable to interpret passage file as a string");

        from_str(contents).expect("Unable to deserialize passage json")
    }
}

/// All embedded passages, paired with their tier. Used to seed a fresh store.
pub fn seed_passages() -> Vec<(Difficulty, String)> {
    Difficulty::ALL
        .iter()
        .flat_map(|&difficulty| {
            PassageSet::embedded(difficulty)
                .passages
                .into_iter()
                .map(move |content| (difficulty, content))
        })
        .collect()
}
