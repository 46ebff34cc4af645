use tracing::info;

use crate::error::StudioError;
use crate::llm::gemini::{GenAi, GenerateContentRequest, GenerationConfig, GeminiPart};
use crate::llm::media::DataUrl;
use crate::studio::model::AspectRatio;
use crate::utils::timing::log_llm_timing;

/// Builds the ordered part list: setting reference, character reference, prompt.
fn build_render_parts(
    prompt: &str,
    reference_image: Option<&DataUrl>,
    character_reference_image: Option<&DataUrl>,
) -> Vec<GeminiPart> {
    let mut parts = Vec::with_capacity(3);
    if let Some(image) = reference_image {
        parts.push(GeminiPart::inline(image));
    }
    if let Some(image) = character_reference_image {
        parts.push(GeminiPart::inline(image));
    }
    parts.push(GeminiPart::text(prompt));
    parts
}

/// Generates one image and returns it as a `data:image/png;base64,` URL.
///
/// No retry is attempted; backend errors are returned as-is.
pub async fn render_image(
    genai: &GenAi,
    prompt: &str,
    aspect_ratio: AspectRatio,
    reference_image: Option<&str>,
    character_reference_image: Option<&str>,
    api_key: Option<&str>,
) -> Result<String, StudioError> {
    let client = genai.client(api_key)?;
    let reference_image = reference_image.map(DataUrl::parse).transpose()?;
    let character_reference_image = character_reference_image.map(DataUrl::parse).transpose()?;

    let parts = build_render_parts(
        prompt,
        reference_image.as_ref(),
        character_reference_image.as_ref(),
    );
    let request = GenerateContentRequest::user(
        parts,
        Some(GenerationConfig::image(aspect_ratio.as_str())),
    );

    let model = genai.image_model.as_str();
    let metadata = serde_json::json!({
        "aspect_ratio": aspect_ratio.as_str(),
        "reference_image": reference_image.is_some(),
        "character_reference_image": character_reference_image.is_some(),
    });
    let response = log_llm_timing("gemini", model, "render_image", Some(metadata), || {
        client.generate_content(model, &request)
    })
    .await?;

    let image = response
        .first_inline_data()
        .ok_or_else(|| StudioError::NoImageProduced {
            model: model.to_string(),
        })?;
    info!(
        "Render produced {} bytes of base64 image data ({})",
        image.data.len(),
        image.mime_type
    );
    Ok(DataUrl::png(image.data.clone()).to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::mock::{image_response, response_from_parts, MockBackend};
    use serde_json::json;

    const SETTING: &str = "data:image/png;base64,U0VUVElORw==";
    const CHARACTER: &str = "data:image/webp;base64,Q0hBUkFDVEVS";

    #[tokio::test]
    async fn attaches_references_before_prompt() {
        let mock = MockBackend::new();
        mock.reply(Ok(image_response("UkVOREVS")));
        render_image(
            &mock.genai(Some("k")),
            "a robot -- ACTION: walks",
            AspectRatio::Portrait,
            Some(SETTING),
            Some(CHARACTER),
            None,
        )
        .await
        .unwrap();

        let calls = mock.calls();
        assert_eq!(calls[0].model, "image-model");
        let request = serde_json::to_value(&calls[0].request).unwrap();
        let parts = request["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0]["inlineData"]["data"], "U0VUVElORw==");
        assert_eq!(parts[1]["inlineData"]["data"], "Q0hBUkFDVEVS");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/webp");
        assert_eq!(parts[2]["text"], "a robot -- ACTION: walks");
        assert_eq!(
            request["generationConfig"]["imageConfig"]["aspectRatio"],
            "9:16"
        );
    }

    #[tokio::test]
    async fn character_reference_alone_still_precedes_prompt() {
        let mock = MockBackend::new();
        mock.reply(Ok(image_response("UkVOREVS")));
        render_image(
            &mock.genai(Some("k")),
            "prompt",
            AspectRatio::Square,
            None,
            Some(CHARACTER),
            None,
        )
        .await
        .unwrap();

        let parts: Vec<_> = mock.calls()[0].request.parts().cloned().collect();
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], GeminiPart::InlineData { .. }));
        assert_eq!(parts[1], GeminiPart::text("prompt"));
    }

    #[tokio::test]
    async fn returns_first_image_part_as_png_data_url() {
        let mock = MockBackend::new();
        mock.reply(Ok(response_from_parts(vec![
            json!({ "text": "thinking" }),
            json!({ "inlineData": { "mimeType": "image/jpeg", "data": "Rklyc3Q=" } }),
            json!({ "inlineData": { "mimeType": "image/png", "data": "U2Vjb25k" } }),
        ])));
        let image = render_image(
            &mock.genai(Some("k")),
            "prompt",
            AspectRatio::Landscape,
            None,
            None,
            None,
        )
        .await
        .unwrap();
        assert_eq!(image, "data:image/png;base64,Rklyc3Q=");
    }

    #[tokio::test]
    async fn text_only_response_is_no_image() {
        let mock = MockBackend::new();
        mock.reply_text("I cannot draw that.");
        let err = render_image(
            &mock.genai(Some("k")),
            "prompt",
            AspectRatio::Landscape,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StudioError::NoImageProduced { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn backend_errors_propagate_without_retry() {
        let mock = MockBackend::new();
        mock.reply(Err(StudioError::backend(Some(429), "Resource exhausted")));
        mock.reply(Ok(image_response("UkVOREVS")));
        let err = render_image(
            &mock.genai(Some("k")),
            "prompt",
            AspectRatio::Landscape,
            None,
            None,
            None,
        )
        .await
        .unwrap_err();
        match err {
            StudioError::Backend { status, message } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "Resource exhausted");
            }
            other => panic!("unexpected error variant: {other}"),
        }
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn malformed_reference_fails_before_any_call() {
        let mock = MockBackend::new();
        let err = render_image(
            &mock.genai(Some("k")),
            "prompt",
            AspectRatio::Landscape,
            Some("blob:1234"),
            None,
            None,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StudioError::MalformedDataUrl(_)));
        assert_eq!(mock.call_count(), 0);
    }
}
