use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::StudioError;
use crate::llm::gemini::{
    truncate_for_log, GenAi, GenerateContentRequest, GenerationConfig, GeminiPart,
};
use crate::studio::model::{CharacterField, StudioState};
use crate::utils::timing::log_llm_timing;

const TRANSLATABLE_KEYS: [&str; 8] = [
    "base_description",
    "face",
    "eyes",
    "clothes",
    "body",
    "setting",
    "visual_style",
    "action",
];

/// The free-text fields sent for translation. Dialogue lines are never included.
#[derive(Debug, Default, Serialize, Deserialize)]
struct TranslatableFields {
    base_description: Option<String>,
    face: Option<String>,
    eyes: Option<String>,
    clothes: Option<String>,
    body: Option<String>,
    setting: Option<String>,
    visual_style: Option<String>,
    action: Option<String>,
}

impl TranslatableFields {
    fn from_state(state: &StudioState) -> Self {
        let dna = &state.character_dna;
        TranslatableFields {
            base_description: Some(dna.base_description.clone()),
            face: Some(dna.face.clone()),
            eyes: Some(dna.eyes.clone()),
            clothes: Some(dna.clothes.clone()),
            body: Some(dna.body.clone()),
            setting: Some(dna.setting.clone()),
            visual_style: Some(dna.visual_style.clone()),
            action: Some(state.scene.action.clone()),
        }
    }

    fn for_field(&self, field: CharacterField) -> Option<&str> {
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
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.is_empty())
}

fn build_translation_prompt(fields: &TranslatableFields) -> String {
    let input = serde_json::to_string(fields).unwrap_or_else(|_| "{}".to_string());
    format!(
        "Translate the following Portuguese descriptions into English optimized for AI Image Generation Prompts.\n\
Fields to translate: base_description, face, eyes, clothes, body, setting, visual_style, and action.\n\
Do NOT translate fields: dialogue1, dialogue2, dialogue3.\n\
\n\
Input Data:\n\
{input}\n"
    )
}

/// Applies every non-empty translated value; anything else keeps the original.
fn merge_translation(state: &StudioState, translated: &TranslatableFields) -> StudioState {
    let mut next = state.clone();
    for field in CharacterField::ALL {
        if let Some(value) = non_empty(translated.for_field(field)) {
            *next.character_dna.get_mut(field) = value.to_string();
        }
    }
    if let Some(action) = non_empty(translated.action.as_deref()) {
        next.scene.action = action.to_string();
    }
    next
}

/// Returns the state with its descriptive fields normalized to English.
///
/// Only a missing credential is reported as an error. Backend failures and
/// unparseable responses yield the input state unchanged.
pub async fn translate_state(
    genai: &GenAi,
    state: &StudioState,
    api_key: Option<&str>,
) -> Result<StudioState, StudioError> {
    if state.character_dna.base_description.is_empty() && state.scene.action.is_empty() {
        debug!("Skipping translation for an empty form");
        return Ok(state.clone());
    }

    let client = genai.client(api_key)?;
    let prompt = build_translation_prompt(&TranslatableFields::from_state(state));
    let request = GenerateContentRequest::user(
        vec![GeminiPart::text(prompt)],
        Some(GenerationConfig::json_object(&TRANSLATABLE_KEYS)),
    );

    let model = genai.text_model.as_str();
    let response = log_llm_timing("gemini", model, "translate_state", None, || {
        client.generate_content(model, &request)
    })
    .await;

    let response = match response {
        Ok(response) => response,
        Err(err) => {
            warn!("Translation failed: {err}");
            return Ok(state.clone());
        }
    };

    let text = response.text();
    let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
    match serde_json::from_str::<TranslatableFields>(text) {
        Ok(translated) => Ok(merge_translation(state, &translated)),
        Err(err) => {
            warn!(
                "Translation response was not valid JSON: {err}; payload={}",
                truncate_for_log(text, 200)
            );
            Ok(state.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::MockBackend;
    use crate::studio::model::{CharacterDNA, SceneData};

    fn portuguese_state() -> StudioState {
        StudioState {
            character_dna: CharacterDNA {
                base_description: "um robô".to_string(),
                eyes: "olhos verdes".to_string(),
                clothes: "azul".to_string(),
                ..CharacterDNA::default()
            },
            scene: SceneData {
                action: "caminha".to_string(),
                dialogue1: "Olá, mundo".to_string(),
                ..SceneData::default()
            },
            ..StudioState::default()
        }
    }

    #[tokio::test]
    async fn empty_form_skips_the_backend() {
        let mock = MockBackend::new();
        let state = StudioState::default()
            .with_dna_field(CharacterField::Face, "rosto")
            .with_dna_field(CharacterField::VisualStyle, "anime");

        let translated = translate_state(&mock.genai(None), &state, None).await.unwrap();
        assert_eq!(translated, state);
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_credential_is_reported_before_any_call() {
        let mock = MockBackend::new();
        let err = translate_state(&mock.genai(None), &portuguese_state(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, StudioError::MissingApiKey));
        assert_eq!(mock.call_count(), 0);
    }

    #[tokio::test]
    async fn sends_eight_fields_and_never_dialogue() {
        let mock = MockBackend::new();
        mock.reply_text("{}");
        translate_state(&mock.genai(Some("env-key")), &portuguese_state(), Some("user-key"))
            .await
            .unwrap();

        let calls = mock.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].api_key, "user-key");
        assert_eq!(calls[0].model, "text-model");
        let request = serde_json::to_value(&calls[0].request).unwrap();
        let prompt = request["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(prompt.contains(r#""base_description":"um robô""#));
        assert!(prompt.contains(r#""action":"caminha""#));
        assert!(!prompt.contains("Olá, mundo"));
        let properties = request["generationConfig"]["responseSchema"]["properties"]
            .as_object()
            .unwrap();
        assert_eq!(properties.len(), 8);
        assert!(properties.contains_key("action"));
    }

    #[tokio::test]
    async fn merges_non_empty_values_and_keeps_the_rest() {
        let mock = MockBackend::new();
        mock.reply_text(
            r#"{"base_description":"a robot","clothes":"","action":"walks","face":"round face"}"#,
        );
        let state = portuguese_state();
        let translated = translate_state(&mock.genai(Some("k")), &state, None)
            .await
            .unwrap();

        assert_eq!(translated.character_dna.base_description, "a robot");
        assert_eq!(translated.character_dna.face, "round face");
        assert_eq!(translated.character_dna.eyes, "olhos verdes");
        assert_eq!(translated.character_dna.clothes, "azul");
        assert_eq!(translated.scene.action, "walks");
        assert_eq!(translated.scene.dialogue1, "Olá, mundo");
    }

    #[tokio::test]
    async fn backend_failure_returns_the_original_state() {
        let mock = MockBackend::new();
        mock.reply(Err(StudioError::backend(Some(503), "unavailable")));
        let state = portuguese_state();
        let translated = translate_state(&mock.genai(Some("k")), &state, None)
            .await
            .unwrap();
        assert_eq!(translated, state);
    }

    #[tokio::test]
    async fn malformed_response_applies_nothing() {
        let mock = MockBackend::new();
        mock.reply_text(r#"{"base_description":"a robot","eyes":42}"#);
        let state = portuguese_state();
        let translated = translate_state(&mock.genai(Some("k")), &state, None)
            .await
            .unwrap();
        assert_eq!(translated, state);

        mock.reply_text("");
        let translated = translate_state(&mock.genai(Some("k")), &state, None)
            .await
            .unwrap();
        assert_eq!(translated, state);
    }
}
