use serde::Deserialize;
use tracing::warn;

use crate::error::StudioError;
use crate::llm::gemini::{
    truncate_for_log, GenAi, GenerateContentRequest, GenerationConfig, GeminiPart,
};
use crate::llm::media::DataUrl;
use crate::studio::model::{CharacterDNA, CharacterField, DescribeMode};
use crate::utils::timing::log_llm_timing;

const GENERAL_INSTRUCTION: &str = "Analise esta imagem e extraia descrições detalhadas para os seguintes campos em Português: base_description (resumo geral), face, eyes, clothes, body, setting, visual_style.";

const CHARACTER_ONLY_INSTRUCTION: &str = "Analise SOMENTE O PERSONAGEM (ou personagens) nesta imagem. Ignore o fundo/cenário. Extraia descrições para: base_description (quem é), face, eyes, clothes, body. Deixe 'setting' e 'visual_style' vazios ou nulos.";

/// What the vision call reported. `None` means the backend said nothing about
/// that field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DnaDescription {
    pub base_description: Option<String>,
    pub face: Option<String>,
    pub eyes: Option<String>,
    pub clothes: Option<String>,
    pub body: Option<String>,
    pub setting: Option<String>,
    pub visual_style: Option<String>,
}

impl DnaDescription {
    pub fn get(&self, field: CharacterField) -> Option<&str> {
        let value = match field {
            CharacterField::BaseDescription => &self.base_description,
            CharacterField::Face => &self.face,
            CharacterField::Eyes => &self.eyes,
            CharacterField::Clothes => &self.clothes,
            CharacterField::Body => &self.body,
            CharacterField::Setting => &self.setting,
            CharacterField::VisualStyle => &self.visual_style,
        };
        value.as_deref()
    }

    pub fn is_empty(&self) -> bool {
        CharacterField::ALL
            .into_iter()
            .all(|field| self.get(field).is_none())
    }
}

fn instruction_for(mode: DescribeMode) -> &'static str {
    match mode {
        DescribeMode::General => GENERAL_INSTRUCTION,
        DescribeMode::CharacterOnly => CHARACTER_ONLY_INSTRUCTION,
    }
}

fn fields_for(mode: DescribeMode) -> &'static [CharacterField] {
    match mode {
        DescribeMode::General => &CharacterField::ALL,
        DescribeMode::CharacterOnly => &CharacterField::CHARACTER_ONLY,
    }
}

fn parse_description(text: &str) -> DnaDescription {
    if text.trim().is_empty() {
        return DnaDescription::default();
    }
    match serde_json::from_str::<DnaDescription>(text) {
        Ok(description) => description,
        Err(err) => {
            warn!(
                "Failed to parse JSON from image description: {err}; payload={}",
                truncate_for_log(text, 200)
            );
            DnaDescription::default()
        }
    }
}

/// Runs the vision call for one data-URL image.
///
/// A malformed data URL or missing credential fails before any request is
/// made. An unparseable response yields an empty description.
pub async fn describe_image(
    genai: &GenAi,
    image: &str,
    mode: DescribeMode,
    api_key: Option<&str>,
) -> Result<DnaDescription, StudioError> {
    let client = genai.client(api_key)?;
    let image = DataUrl::parse(image)?;

    // The general schema is always advertised; the merge decides what is kept.
    let keys = CharacterField::ALL.map(CharacterField::key);
    let request = GenerateContentRequest::user(
        vec![GeminiPart::inline(&image), GeminiPart::text(instruction_for(mode))],
        Some(GenerationConfig::json_object(&keys)),
    );

    let model = genai.text_model.as_str();
    let metadata = serde_json::json!({ "mode": mode.as_str(), "mime_type": image.mime_type });
    let response = log_llm_timing("gemini", model, "describe_image", Some(metadata), || {
        client.generate_content(model, &request)
    })
    .await?;

    Ok(parse_description(&response.text()))
}

/// Folds a description into `dna`, field by field, for the fields `mode` owns.
/// Absent or empty values keep the prior value.
pub fn merge_description(
    dna: &CharacterDNA,
    description: &DnaDescription,
    mode: DescribeMode,
) -> CharacterDNA {
    let mut next = dna.clone();
    for &field in fields_for(mode) {
        if let Some(value) = description.get(field).filter(|value| !value.is_empty()) {
            *next.get_mut(field) = value.to_string();
        }
    }
    next
}
