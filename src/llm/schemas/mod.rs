
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A structured reply the assistant can request from the chat model
pub trait ContentSchema: Serialize + DeserializeOwned + JsonSchema {
    /// Name reported in validation errors
    const NAME: &'static str;

    /// Checks that go beyond what deserialization enforces
    #[inline]
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }

    /// JSON schema sent to the model as the response format
    #[inline]
    fn json_schema() -> serde_json::Value {
        schemars::schema_for!(Self).to_value()
    }

    /// Deserialize a raw model reply and validate it
    #[inline]
    fn parse_reply(raw: &str) -> Result<Self, String> {
        let value: Self = serde_json::from_str(raw.trim()).map_err(|e| e.to_string())?;
        value.validate()?;
        Ok(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Answer {
    /// Exact requirement as per the user's query.
    pub answer: String,
    /// Key points or facts pulled from the documents. Include Metadata if available.
    pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Npc {
    /// The full name and surname of the Non-Player Character. Fantasy themed.
    pub name: String,
    /// Dungeons and Dragons race, e.g. 'human', 'elf', 'dwarf'.
    pub race: String,
    /// The NPC's role or profession, e.g. 'blacksmith' or 'village elder'.
    pub role: String,
    /// A brief summary of the NPC's personality, appearance, and mannerisms.
    pub description: String,
    /// What the NPC wants or cares about.
    pub motivation: String,
    /// A hidden detail or twist about the NPC.
    pub secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Location {
    /// The name of the location.
    pub name: String,
    /// Type of location, e.g. 'village', 'ruin', 'forest'.
    #[serde(rename = "type")]
    pub location_type: String,
    /// A vivid description of the place and its key features.
    pub description: String,
    /// An integer from 1 (safe) to 10 (deadly), indicating how dangerous this place is.
    #[schemars(range(min = 1, max = 10))]
    pub danger_level: u8,
    /// Rumors or local stories associated with the location.
    pub rumors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Puzzle {
    /// The name or short title of the puzzle.
    pub title: String,
    /// A full description of the puzzle setup and how it is presented to players.
    pub description: String,
    /// The correct solution to the puzzle.
    pub solution: String,
    /// Clues or hints that can be revealed to help players solve the puzzle.
    pub hints: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    #[serde(rename = "Very Rare")]
    VeryRare,
    Legendary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Item {
    /// The name of the magical or mundane item.
    pub name: String,
    /// The type of item, e.g. 'weapon', 'armor', 'trinket'.
    pub item_type: String,
    /// The rarity of the item: Common, Uncommon, Rare, Very Rare, or Legendary.
    pub rarity: Rarity,
    /// A description of the item's appearance and properties.
    pub description: String,
    /// The mechanical or magical effect of the item.
    pub effect: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Truthfulness {
    True,
    False,
    #[serde(rename = "Half-True")]
    HalfTrue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Rumour {
    /// The content of the rumor.
    pub text: String,
    /// Whether the rumor is True, False, or Half-True.
    pub truthfulness: Truthfulness,
    /// Who or where the rumor originated from.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedName {
    /// The generated name.
    pub name: String,
    /// The cultural or fantasy context the name belongs to, e.g. 'Elvish', 'Dwarvish', 'Pirate'.
    pub culture: String,
    /// A symbolic or linguistic meaning for the name, if applicable.
    pub meaning: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct NpcList {
    #[serde(rename = "NPCs")]
    pub npcs: Vec<Npc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LocationList {
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PuzzleList {
    pub puzzles: Vec<Puzzle>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ItemList {
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RumourList {
    pub rumours: Vec<Rumour>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedNameList {
    pub names: Vec<GeneratedName>,
}

impl ContentSchema for Answer {
    const NAME: &'static str = "Answer";
}

impl ContentSchema for NpcList {
    const NAME: &'static str = "NPCList";
}

impl ContentSchema for LocationList {
    const NAME: &'static str = "LocationList";

    #[inline]
    fn validate(&self) -> Result<(), String> {
        match self
            .locations
            .iter()
            .find(|location| !(1..=10).contains(&location.danger_level))
        {
            Some(location) => Err(format!(
                "danger_level of '{}' must be between 1 and 10, got {}",
                location.name, location.danger_level
            )),
            None => Ok(()),
        }
    }
}

impl ContentSchema for PuzzleList {
    const NAME: &'static str = "PuzzleList";
}

impl ContentSchema for ItemList {
    const NAME: &'static str = "ItemList";
}

impl ContentSchema for RumourList {
    const NAME: &'static str = "RumourList";
}

impl ContentSchema for GeneratedNameList {
    const NAME: &'static str = "GeneratedNameList";
}

/// Kinds of campaign content the assistant can generate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Npc,
    Location,
    Puzzle,
    Item,
    Rumour,
    Name,
}

impl ContentKind {
    pub const ALL: [Self; 6] = [
        Self::Npc,
        Self::Location,
        Self::Puzzle,
        Self::Item,
        Self::Rumour,
        Self::Name,
    ];

    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Npc => "npc",
            Self::Location => "location",
            Self::Puzzle => "puzzle",
            Self::Item => "item",
            Self::Rumour => "rumour",
            Self::Name => "name",
        }
    }

    #[inline]
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for ContentKind {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Generated content, tagged with the kind that produced it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "lowercase")]
pub enum GeneratedContent {
    Npc(NpcList),
    Location(LocationList),
    Puzzle(PuzzleList),
    Item(ItemList),
    Rumour(RumourList),
    Name(GeneratedNameList),
}

impl GeneratedContent {
    #[inline]
    pub fn kind(&self) -> ContentKind {
        match self {
            Self::Npc(_) => ContentKind::Npc,
            Self::Location(_) => ContentKind::Location,
            Self::Puzzle(_) => ContentKind::Puzzle,
            Self::Item(_) => ContentKind::Item,
            Self::Rumour(_) => ContentKind::Rumour,
            Self::Name(_) => ContentKind::Name,
        }
    }

    /// The list payload without the kind tag
    #[inline]
    pub fn data(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Self::Npc(list) => serde_json::to_value(list),
            Self::Location(list) => serde_json::to_value(list),
            Self::Puzzle(list) => serde_json::to_value(list),
            Self::Item(list) => serde_json::to_value(list),
            Self::Rumour(list) => serde_json::to_value(list),
            Self::Name(list) => serde_json::to_value(list),
        }
    }
}
