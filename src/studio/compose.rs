use crate::studio::model::{CharacterField, JsonOutput, OutputKind, SceneOutput, StudioState};

pub const ACTION_SEPARATOR: &str = " -- ACTION: ";

/// Single-scene model: every output carries this id.
pub const SCENE_ID: u32 = 0;

/// Non-empty DNA fields in fixed order joined by single spaces, then the action.
pub fn build_prompt(state: &StudioState) -> String {
    let dna = &state.character_dna;
    let base_prompt = CharacterField::ALL
        .into_iter()
        .map(|field| dna.get(field))
        .filter(|value| !value.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    format!("{base_prompt}{ACTION_SEPARATOR}{}", state.scene.action)
}

pub fn compose(state: &StudioState, kind: OutputKind) -> JsonOutput {
    let scene = &state.scene;
    let dialogue = |line: &String| match kind {
        OutputKind::Video => Some(line.clone()),
        OutputKind::Image => None,
    };

    JsonOutput {
        scene_id: SCENE_ID,
        character_dna: state.character_dna.clone(),
        scene_data: SceneOutput {
            action: scene.action.clone(),
            dialogue_1: dialogue(&scene.dialogue1),
            dialogue_2: dialogue(&scene.dialogue2),
            dialogue_3: dialogue(&scene.dialogue3),
        },
        final_prompt_for_ai: build_prompt(state),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::model::{CharacterDNA, SceneData};
    use serde_json::json;

    fn robot_state() -> StudioState {
        StudioState {
            character_dna: CharacterDNA {
                base_description: "um robô".to_string(),
                clothes: "azul".to_string(),
                ..CharacterDNA::default()
            },
            scene: SceneData {
                action: "caminha".to_string(),
                dialogue1: "Olá".to_string(),
                dialogue2: String::new(),
                dialogue3: "Adeus".to_string(),
            },
            ..StudioState::default()
        }
    }

    #[test]
    fn image_output_matches_expected_document() {
        let output = compose(&robot_state(), OutputKind::Image);
        assert_eq!(output.final_prompt_for_ai, "um robô azul -- ACTION: caminha");
        assert_eq!(output.scene_id, 0);
        assert_eq!(
            serde_json::to_value(&output.scene_data).unwrap(),
            json!({
                "action": "caminha",
                "dialogue_1": null,
                "dialogue_2": null,
                "dialogue_3": null
            })
        );
    }

    #[test]
    fn video_output_passes_dialogue_through_unchanged() {
        let output = compose(&robot_state(), OutputKind::Video);
        assert_eq!(output.scene_data.dialogue_1.as_deref(), Some("Olá"));
        assert_eq!(output.scene_data.dialogue_2.as_deref(), Some(""));
        assert_eq!(output.scene_data.dialogue_3.as_deref(), Some("Adeus"));
    }

    #[test]
    fn empty_fields_add_no_separator() {
        let prompt = build_prompt(&robot_state());
        assert!(!prompt.contains("  "));
    }

    #[test]
    fn all_fields_appear_in_fixed_order() {
        let mut state = StudioState::default();
        for (index, field) in CharacterField::ALL.into_iter().enumerate() {
            state = state.with_dna_field(field, format!("f{index}"));
        }
        assert_eq!(build_prompt(&state), "f0 f1 f2 f3 f4 f5 f6 -- ACTION: ");
    }

    #[test]
    fn empty_state_still_carries_action_marker() {
        assert_eq!(build_prompt(&StudioState::default()), " -- ACTION: ");
    }

    #[test]
    fn dna_is_copied_unfiltered_and_input_is_untouched() {
        let state = robot_state().with_dna_field(CharacterField::Setting, "");
        let before = state.clone();
        let first = compose(&state, OutputKind::Video);
        let second = compose(&state, OutputKind::Video);
        assert_eq!(first, second);
        assert_eq!(first.character_dna, state.character_dna);
        assert_eq!(state, before);
    }
}
