use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::StudioError;
use crate::llm::gemini::GenAi;
use crate::llm::media::{read_file_as_data_url, DataUrl};
use crate::state::StudioStore;
use crate::studio::model::{
    AspectRatio, CharacterDNA, CharacterField, EditableField, JsonOutput, OutputKind,
    ReferenceSlot, StudioState,
};
use crate::studio::styles::apply_style_preset;
use crate::studio::{compose, describe_image, merge_description, render_image, translate_state};
use crate::utils::timing::{complete_operation_timer, start_operation_timer};

pub const RENDER_FAILURE_MESSAGE: &str = "Erro ao gerar imagem. Tente novamente.";
pub const DESCRIBE_GENERAL_FAILURE_MESSAGE: &str =
    "Falha ao analisar imagem. Verifique sua API Key.";
pub const DESCRIBE_CHARACTER_FAILURE_MESSAGE: &str =
    "Falha ao analisar personagem. Verifique sua API Key.";

pub fn describe_failure_message(slot: ReferenceSlot) -> &'static str {
    match slot {
        ReferenceSlot::Reference => DESCRIBE_GENERAL_FAILURE_MESSAGE,
        ReferenceSlot::Character => DESCRIBE_CHARACTER_FAILURE_MESSAGE,
    }
}

/// The session shell: owns the store and drives translate, compose, render and
/// describe in response to user actions.
#[derive(Clone)]
pub struct Studio {
    store: StudioStore,
    genai: GenAi,
    api_key: Option<String>,
}

impl Studio {
    pub fn new(store: StudioStore, genai: GenAi, api_key: Option<String>) -> Self {
        Studio {
            store,
            genai,
            api_key,
        }
    }

    pub fn store(&self) -> &StudioStore {
        &self.store
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    pub fn edit_field(&self, field: EditableField, value: &str) -> StudioState {
        self.store.update(|state| state.with_field(field, value))
    }

    pub fn add_style(&self, preset: &str) -> String {
        let state = self.store.update(|state| {
            let style = apply_style_preset(&state.character_dna.visual_style, preset);
            state.with_dna_field(CharacterField::VisualStyle, style)
        });
        state.character_dna.visual_style
    }

    pub async fn attach_reference(
        &self,
        slot: ReferenceSlot,
        path: &Path,
    ) -> Result<String, StudioError> {
        let data_url = read_file_as_data_url(path).await?;
        let mime_type = DataUrl::parse(&data_url)?.mime_type;
        self.store
            .update(|state| state.with_reference(slot, Some(data_url.clone())));
        info!(
            "Attached {} to the {} slot ({})",
            path.display(),
            slot.as_str(),
            mime_type
        );
        Ok(mime_type)
    }

    pub fn clear_reference(&self, slot: ReferenceSlot) {
        self.store.update(|state| state.with_reference(slot, None));
    }

    /// Starts over with an empty form. In-flight requests still run to the
    /// end but their results are discarded with [`StudioError::SessionReset`].
    pub fn reset(&self) {
        self.store.set(StudioState::default());
        self.store.set_generated_image(None);
    }

    /// Translate, then compose; the result becomes `lastGeneratedOutput`.
    pub async fn generate_json(&self, kind: OutputKind) -> Result<JsonOutput, StudioError> {
        let _guard = self.store.try_begin_generation()?;
        let mut timer = start_operation_timer("generate_json", Some(kind.as_str()));
        let epoch = self.store.epoch();

        let snapshot = self.store.get();
        let translated = match translate_state(&self.genai, &snapshot, self.api_key()).await {
            Ok(translated) => translated,
            Err(err) => {
                error!("Error generating JSON: {err}");
                complete_operation_timer(&mut timer, "error", Some(err.to_string()));
                return Err(err);
            }
        };

        let output = compose(&translated, kind);
        let stored = self.store.update_in_epoch(epoch, |state| StudioState {
            last_generated_output: Some(output.clone()),
            ..state.clone()
        });
        if stored.is_none() {
            info!("Discarding scene JSON from before the session reset");
            complete_operation_timer(&mut timer, "discarded", None);
            return Err(StudioError::SessionReset);
        }
        complete_operation_timer(&mut timer, "success", None);
        Ok(output)
    }

    /// The full generation cycle: translate, compose an image prompt, render.
    ///
    /// The reference images are the ones present when the request started.
    pub async fn render(&self, aspect_ratio: AspectRatio) -> Result<String, StudioError> {
        let _guard = self.store.try_begin_generation()?;
        let mut timer = start_operation_timer("render", Some(aspect_ratio.as_str()));
        self.store.set_generated_image(None);
        let epoch = self.store.epoch();

        let result = match self.render_cycle(aspect_ratio, epoch).await {
            Ok(image) if self.store.set_generated_image_in_epoch(epoch, Some(image.clone())) => {
                Ok(image)
            }
            Ok(_) => Err(StudioError::SessionReset),
            Err(err) => Err(err),
        };
        match &result {
            Ok(_) => complete_operation_timer(&mut timer, "success", None),
            Err(StudioError::SessionReset) => {
                info!("Discarding render from before the session reset");
                complete_operation_timer(&mut timer, "discarded", None);
            }
            Err(err) => {
                error!("Generation cycle failed: {err}");
                complete_operation_timer(&mut timer, "error", Some(err.to_string()));
            }
        }
        result
    }

    async fn render_cycle(
        &self,
        aspect_ratio: AspectRatio,
        epoch: u64,
    ) -> Result<String, StudioError> {
        let snapshot = self.store.get();
        let translated = translate_state(&self.genai, &snapshot, self.api_key()).await?;
        let output = compose(&translated, OutputKind::Image);
        self.store.update_in_epoch(epoch, |state| StudioState {
            last_generated_output: Some(output.clone()),
            ..state.clone()
        });

        render_image(
            &self.genai,
            &output.final_prompt_for_ai,
            aspect_ratio,
            snapshot.reference_image.as_deref(),
            snapshot.character_reference_image.as_deref(),
            self.api_key(),
        )
        .await
    }

    /// Describes the slot's image and folds the answer into the current DNA.
    /// Returns `None` when the slot is empty.
    pub async fn describe_slot(
        &self,
        slot: ReferenceSlot,
    ) -> Result<Option<CharacterDNA>, StudioError> {
        let Some(image) = self.store.get().reference(slot).map(str::to_string) else {
            return Ok(None);
        };
        let _guard = self.store.try_begin_describe(slot)?;
        let mode = slot.describe_mode();
        let mut timer = start_operation_timer("describe", Some(mode.as_str()));
        let epoch = self.store.epoch();

        let description = match describe_image(&self.genai, &image, mode, self.api_key()).await {
            Ok(description) => description,
            Err(err) => {
                warn!("Image description failed for {} slot: {err}", slot.as_str());
                complete_operation_timer(&mut timer, "error", Some(err.to_string()));
                return Err(err);
            }
        };
        if description.is_empty() {
            warn!("Image description for {} slot came back empty", slot.as_str());
        }

        let Some(state) = self.store.update_in_epoch(epoch, |state| StudioState {
            character_dna: merge_description(&state.character_dna, &description, mode),
            ..state.clone()
        }) else {
            info!("Discarding {} description from before the session reset", slot.as_str());
            complete_operation_timer(&mut timer, "discarded", None);
            return Err(StudioError::SessionReset);
        };
        complete_operation_timer(&mut timer, "success", None);
        Ok(Some(state.character_dna))
    }

    /// Writes the pretty-printed `lastGeneratedOutput`, if any.
    pub async fn export_json(&self, path: &Path) -> Result<bool, StudioError> {
        let Some(output) = self.store.get().last_generated_output else {
            return Ok(false);
        };
        let text = serde_json::to_string_pretty(&output)
            .map_err(|err| StudioError::Io(std::io::Error::other(err)))?;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text).await?;
        Ok(true)
    }

    /// Decodes the displayed render into `<dir>/studio_render_<millis>.png`.
    pub async fn save_render(&self, dir: &Path) -> Result<Option<PathBuf>, StudioError> {
        let Some(image) = self.store.generated_image() else {
            return Ok(None);
        };
        let bytes = DataUrl::parse(&image)?.decode()?;
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!(
            "studio_render_{}.png",
            Utc::now().timestamp_millis()
        ));
        tokio::fs::write(&path, bytes).await?;
        info!("Saved render to {}", path.display());
        Ok(Some(path))
    }
}
