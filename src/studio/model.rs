use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Free-text appearance and setting attributes. Empty string means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterDNA {
    pub base_description: String,
    pub face: String,
    pub eyes: String,
    pub clothes: String,
    pub body: String,
    pub setting: String,
    pub visual_style: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneData {
    pub action: String,
    pub dialogue1: String,
    pub dialogue2: String,
    pub dialogue3: String,
}

/// The single unit of session state. Reference images are data URLs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StudioState {
    pub scene: SceneData,
    pub character_dna: CharacterDNA,
    #[serde(rename = "referenceImage")]
    pub reference_image: Option<String>,
    #[serde(rename = "characterReferenceImage")]
    pub character_reference_image: Option<String>,
    #[serde(rename = "lastGeneratedOutput")]
    pub last_generated_output: Option<JsonOutput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneOutput {
    pub action: String,
    pub dialogue_1: Option<String>,
    pub dialogue_2: Option<String>,
    pub dialogue_3: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOutput {
    pub scene_id: u32,
    pub character_dna: CharacterDNA,
    pub scene_data: SceneOutput,
    pub final_prompt_for_ai: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Image,
    Video,
}

impl OutputKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputKind::Image => "image",
            OutputKind::Video => "video",
        }
    }
}

impl FromStr for OutputKind {
    type Err = StudioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "image" => Ok(OutputKind::Image),
            "video" => Ok(OutputKind::Video),
            _ => Err(StudioError::InvalidOutputKind(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AspectRatio {
    Square,
    Landscape,
    Portrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == value.trim())
            .ok_or_else(|| StudioError::InvalidAspectRatio(value.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeMode {
    General,
    CharacterOnly,
}

impl DescribeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            DescribeMode::General => "general",
            DescribeMode::CharacterOnly => "character_only",
        }
    }
}

impl FromStr for DescribeMode {
    type Err = StudioError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(DescribeMode::General),
            "character_only" | "character" => Ok(DescribeMode::CharacterOnly),
            _ => Err(StudioError::InvalidDescribeMode(value.to_string())),
        }
    }
}

/// The two image slots of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceSlot {
    /// Setting / visual-elements reference.
    Reference,
    Character,
}

impl ReferenceSlot {
    pub fn as_str(self) -> &'static str {
        match self {
            ReferenceSlot::Reference => "reference",
            ReferenceSlot::Character => "character",
        }
    }

    pub fn describe_mode(self) -> DescribeMode {
        match self {
            ReferenceSlot::Reference => DescribeMode::General,
            ReferenceSlot::Character => DescribeMode::CharacterOnly,
        }
    }
}

impl FromStr for ReferenceSlot {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "reference" | "ref" | "setting" => Ok(ReferenceSlot::Reference),
            "character" | "char" => Ok(ReferenceSlot::Character),
            other => Err(format!("Unknown image slot '{other}' (expected reference or character)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterField {
    BaseDescription,
    Face,
    Eyes,
    Clothes,
    Body,
    Setting,
    VisualStyle,
}

impl CharacterField {
    pub const ALL: [CharacterField; 7] = [
        CharacterField::BaseDescription,
        CharacterField::Face,
        CharacterField::Eyes,
        CharacterField::Clothes,
        CharacterField::Body,
        CharacterField::Setting,
        CharacterField::VisualStyle,
    ];

    /// Fields that describe the character itself rather than its surroundings.
    pub const CHARACTER_ONLY: [CharacterField; 5] = [
        CharacterField::BaseDescription,
        CharacterField::Face,
        CharacterField::Eyes,
        CharacterField::Clothes,
        CharacterField::Body,
    ];

    pub fn key(self) -> &'static str {
        match self {
            CharacterField::BaseDescription => "base_description",
            CharacterField::Face => "face",
            CharacterField::Eyes => "eyes",
            CharacterField::Clothes => "clothes",
            CharacterField::Body => "body",
            CharacterField::Setting => "setting",
            CharacterField::VisualStyle => "visual_style",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneField {
    Action,
    Dialogue1,
    Dialogue2,
    Dialogue3,
}

impl SceneField {
    pub fn key(self) -> &'static str {
        match self {
            SceneField::Action => "action",
            SceneField::Dialogue1 => "dialogue1",
            SceneField::Dialogue2 => "dialogue2",
            SceneField::Dialogue3 => "dialogue3",
        }
    }
}

/// Any field a user can edit directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditableField {
    Character(CharacterField),
    Scene(SceneField),
}

impl FromStr for EditableField {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let key = value.trim().to_ascii_lowercase();
        if let Some(field) = CharacterField::ALL
            .into_iter()
            .find(|field| field.key() == key)
        {
            return Ok(EditableField::Character(field));
        }
        [
            SceneField::Action,
            SceneField::Dialogue1,
            SceneField::Dialogue2,
            SceneField::Dialogue3,
        ]
        .into_iter()
        .find(|field| field.key() == key)
        .map(EditableField::Scene)
        .ok_or_else(|| format!("Unknown field '{value}'"))
    }
}

impl CharacterDNA {
    pub fn get(&self, field: CharacterField) -> &str {
        match field {
            CharacterField::BaseDescription => &self.base_description,
            CharacterField::Face => &self.face,
            CharacterField::Eyes => &self.eyes,
            CharacterField::Clothes => &self.clothes,
            CharacterField::Body => &self.body,
            CharacterField::Setting => &self.setting,
            CharacterField::VisualStyle => &self.visual_style,
        }
    }

    pub fn get_mut(&mut self, field: CharacterField) -> &mut String {
        match field {
            CharacterField::BaseDescription => &mut self.base_description,
            CharacterField::Face => &mut self.face,
            CharacterField::Eyes => &mut self.eyes,
            CharacterField::Clothes => &mut self.clothes,
            CharacterField::Body => &mut self.body,
            CharacterField::Setting => &mut self.setting,
            CharacterField::VisualStyle => &mut self.visual_style,
        }
    }
}

impl SceneData {
    pub fn get_mut(&mut self, field: SceneField) -> &mut String {
        match field {
            SceneField::Action => &mut self.action,
            SceneField::Dialogue1 => &mut self.dialogue1,
            SceneField::Dialogue2 => &mut self.dialogue2,
            SceneField::Dialogue3 => &mut self.dialogue3,
        }
    }
}

impl StudioState {
    pub fn with_dna_field(&self, field: CharacterField, value: impl Into<String>) -> StudioState {
        let mut next = self.clone();
        *next.character_dna.get_mut(field) = value.into();
        next
    }

    pub fn with_scene_field(&self, field: SceneField, value: impl Into<String>) -> StudioState {
        let mut next = self.clone();
        *next.scene.get_mut(field) = value.into();
        next
    }

    pub fn with_field(&self, field: EditableField, value: impl Into<String>) -> StudioState {
        match field {
            EditableField::Character(field) => self.with_dna_field(field, value),
            EditableField::Scene(field) => self.with_scene_field(field, value),
        }
    }

    pub fn reference(&self, slot: ReferenceSlot) -> Option<&str> {
        match slot {
            ReferenceSlot::Reference => self.reference_image.as_deref(),
            ReferenceSlot::Character => self.character_reference_image.as_deref(),
        }
    }

    pub fn with_reference(&self, slot: ReferenceSlot, data_url: Option<String>) -> StudioState {
        let mut next = self.clone();
        match slot {
            ReferenceSlot::Reference => next.reference_image = data_url,
            ReferenceSlot::Character => next.character_reference_image = data_url,
        }
        next
    }
}
