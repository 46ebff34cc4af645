use std::path::{Path, PathBuf};

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::task::{JoinError, JoinSet};
use tracing::{error, info, warn};

use crate::error::StudioError;
use crate::handlers::studio::{describe_failure_message, Studio, RENDER_FAILURE_MESSAGE};
use crate::llm::media::DataUrl;
use crate::studio::model::{
    AspectRatio, CharacterField, EditableField, OutputKind, ReferenceSlot, SceneField,
    StudioState,
};
use crate::studio::styles::{find_preset, STYLE_PRESETS};

const HELP_TEXT: &str = "\
Commands:
  set <field> <text>        edit a field (base_description, face, eyes, clothes, body,
                            setting, visual_style, action, dialogue1..3); empty text clears it
  style <name|number>       append a visual style preset
  styles                    list the style presets
  attach <slot> <path>      load an image into a slot (reference | character)
  detach <slot>             clear a slot
  describe <slot>           fill the DNA from the slot's image
  json [image|video]        translate and compose the scene JSON (default: video)
  render [1:1|16:9|9:16]    translate, compose and render an image
  show                      print the current session
  export [path]             write the last generated JSON
  save [dir]                write the displayed render as PNG
  reset                     clear every field, image and output
  help                      show this text
  quit                      leave the session";

const JSON_EXPORT_FILE: &str = "studio_scene.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    Set { field: EditableField, value: String },
    Style(&'static str),
    Styles,
    Attach { slot: ReferenceSlot, path: PathBuf },
    Detach(ReferenceSlot),
    Describe(ReferenceSlot),
    Json(OutputKind),
    Render(Option<AspectRatio>),
    Show,
    Export(Option<PathBuf>),
    Save(Option<PathBuf>),
    Reset,
    Help,
    Quit,
}

fn split_word(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(index) => (&text[..index], text[index..].trim()),
        None => (text, ""),
    }
}

fn require<'a>(value: &'a str, usage: &str) -> Result<&'a str, String> {
    if value.is_empty() {
        Err(format!("Usage: {usage}"))
    } else {
        Ok(value)
    }
}

fn optional_path(value: &str) -> Option<PathBuf> {
    (!value.is_empty()).then(|| PathBuf::from(value))
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<SessionCommand>, String> {
    let (name, rest) = split_word(line);
    if name.is_empty() {
        return Ok(None);
    }

    let command = match name.to_ascii_lowercase().as_str() {
        "set" => {
            let (field, value) = split_word(rest);
            let field = require(field, "set <field> <text>")?.parse::<EditableField>()?;
            SessionCommand::Set {
                field,
                value: value.to_string(),
            }
        }
        "style" => {
            let query = require(rest, "style <name|number>")?;
            let preset =
                find_preset(query).ok_or_else(|| format!("Unknown style preset '{query}'"))?;
            SessionCommand::Style(preset)
        }
        "styles" => SessionCommand::Styles,
        "attach" => {
            let (slot, path) = split_word(rest);
            let slot = require(slot, "attach <slot> <path>")?.parse::<ReferenceSlot>()?;
            let path = require(path, "attach <slot> <path>")?;
            SessionCommand::Attach {
                slot,
                path: PathBuf::from(path),
            }
        }
        "detach" => SessionCommand::Detach(require(rest, "detach <slot>")?.parse()?),
        "describe" => SessionCommand::Describe(require(rest, "describe <slot>")?.parse()?),
        "json" => {
            let kind = if rest.is_empty() {
                OutputKind::Video
            } else {
                rest.parse().map_err(|err: StudioError| err.to_string())?
            };
            SessionCommand::Json(kind)
        }
        "render" => {
            let aspect = if rest.is_empty() {
                None
            } else {
                Some(rest.parse().map_err(|err: StudioError| err.to_string())?)
            };
            SessionCommand::Render(aspect)
        }
        "show" => SessionCommand::Show,
        "export" => SessionCommand::Export(optional_path(rest)),
        "save" => SessionCommand::Save(optional_path(rest)),
        "reset" => SessionCommand::Reset,
        "help" | "?" => SessionCommand::Help,
        "quit" | "exit" => SessionCommand::Quit,
        other => return Err(format!("Unknown command '{other}'. Type 'help'.")),
    };
    Ok(Some(command))
}

fn slot_summary(image: Option<&str>) -> String {
    match image.map(DataUrl::parse) {
        None => "(empty)".to_string(),
        Some(Ok(data_url)) => format!("{} ({} base64 chars)", data_url.mime_type, data_url.data.len()),
        Some(Err(_)) => "(unreadable)".to_string(),
    }
}

fn display_value(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

pub fn render_state_summary(state: &StudioState, generated_image: Option<&str>) -> String {
    let mut lines = vec!["Character DNA:".to_string()];
    for field in CharacterField::ALL {
        lines.push(format!(
            "  {:<17}{}",
            field.key(),
            display_value(state.character_dna.get(field))
        ));
    }
    lines.push("Scene:".to_string());
    let scene = &state.scene;
    for (field, value) in [
        (SceneField::Action, &scene.action),
        (SceneField::Dialogue1, &scene.dialogue1),
        (SceneField::Dialogue2, &scene.dialogue2),
        (SceneField::Dialogue3, &scene.dialogue3),
    ] {
        lines.push(format!("  {:<17}{}", field.key(), display_value(value)));
    }
    lines.push("Images:".to_string());
    for slot in [ReferenceSlot::Reference, ReferenceSlot::Character] {
        lines.push(format!(
            "  {:<17}{}",
            slot.as_str(),
            slot_summary(state.reference(slot))
        ));
    }
    lines.push(format!("  {:<17}{}", "render", slot_summary(generated_image)));
    lines.push(match &state.last_generated_output {
        Some(output) => format!("Last prompt: {}", output.final_prompt_for_ai),
        None => "Last prompt: -".to_string(),
    });
    lines.join("\n")
}

fn session_notice(err: &StudioError) -> Option<String> {
    match err {
        StudioError::Busy(what) => Some(format!("{what} is already in progress.")),
        StudioError::SessionReset => Some("Discarded a result from before the reset.".to_string()),
        _ => None,
    }
}

fn spawn_json(tasks: &mut JoinSet<()>, studio: &Studio, kind: OutputKind) {
    let studio = studio.clone();
    tasks.spawn(async move {
        match studio.generate_json(kind).await {
            Ok(output) => match serde_json::to_string_pretty(&output) {
                Ok(text) => println!("{text}"),
                Err(err) => error!("Failed to format scene JSON: {err}"),
            },
            Err(err) => match session_notice(&err) {
                Some(notice) => println!("{notice}"),
                None => eprintln!("Error generating JSON: {err}"),
            },
        }
    });
}

fn spawn_render(tasks: &mut JoinSet<()>, studio: &Studio, aspect_ratio: AspectRatio) {
    let studio = studio.clone();
    tasks.spawn(async move {
        match studio.render(aspect_ratio).await {
            Ok(image) => println!(
                "Render ready ({}). Use 'save' to write it to disk.",
                slot_summary(Some(&image))
            ),
            Err(err) => match session_notice(&err) {
                Some(notice) => println!("{notice}"),
                None => eprintln!("{RENDER_FAILURE_MESSAGE}"),
            },
        }
    });
}

fn spawn_describe(tasks: &mut JoinSet<()>, studio: &Studio, slot: ReferenceSlot) {
    let studio = studio.clone();
    tasks.spawn(async move {
        match studio.describe_slot(slot).await {
            Ok(Some(_)) => println!("DNA updated from the {} image.", slot.as_str()),
            Ok(None) => println!("The {} slot is empty.", slot.as_str()),
            Err(err) => match session_notice(&err) {
                Some(notice) => println!("{notice}"),
                None => eprintln!("{}", describe_failure_message(slot)),
            },
        }
    });
}

fn log_task_outcome(outcome: Result<(), JoinError>) {
    if let Err(err) = outcome {
        error!("Session request task failed: {err}");
    }
}

/// Runs one command. Returns `false` when the session should end.
async fn handle_command(
    studio: &Studio,
    tasks: &mut JoinSet<()>,
    command: SessionCommand,
    default_aspect_ratio: AspectRatio,
    output_dir: &Path,
) -> Result<bool> {
    match command {
        SessionCommand::Set { field, value } => {
            studio.edit_field(field, &value);
        }
        SessionCommand::Style(preset) => {
            let style = studio.add_style(preset);
            println!("visual_style: {style}");
        }
        SessionCommand::Styles => {
            for (index, preset) in STYLE_PRESETS.iter().enumerate() {
                println!("{:>3}. {preset}", index + 1);
            }
        }
        SessionCommand::Attach { slot, path } => {
            match studio.attach_reference(slot, &path).await {
                Ok(mime_type) => println!("Attached {} as {mime_type}.", path.display()),
                Err(err) => eprintln!("Could not read {}: {err}", path.display()),
            }
        }
        SessionCommand::Detach(slot) => studio.clear_reference(slot),
        SessionCommand::Describe(slot) => spawn_describe(tasks, studio, slot),
        SessionCommand::Json(kind) => spawn_json(tasks, studio, kind),
        SessionCommand::Render(aspect_ratio) => {
            spawn_render(tasks, studio, aspect_ratio.unwrap_or(default_aspect_ratio))
        }
        SessionCommand::Show => {
            let store = studio.store();
            let image = store.generated_image();
            println!("{}", render_state_summary(&store.get(), image.as_deref()));
            if store.is_generating() {
                println!("(generation in progress)");
            }
        }
        SessionCommand::Export(path) => {
            let path = path.unwrap_or_else(|| output_dir.join(JSON_EXPORT_FILE));
            if studio.export_json(&path).await? {
                println!("Wrote {}", path.display());
            } else {
                println!("Nothing generated yet.");
            }
        }
        SessionCommand::Save(dir) => {
            let dir = dir.unwrap_or_else(|| output_dir.to_path_buf());
            match studio.save_render(&dir).await? {
                Some(path) => println!("Wrote {}", path.display()),
                None => println!("No render to save."),
            }
        }
        SessionCommand::Reset => {
            studio.reset();
            println!("Session cleared.");
        }
        SessionCommand::Help => println!("{HELP_TEXT}"),
        SessionCommand::Quit => return Ok(false),
    }
    Ok(true)
}

/// Interactive session over stdin. Generation and description run in the
/// background so edits keep flowing while they are in flight.
pub async fn run_session(
    studio: Studio,
    default_aspect_ratio: AspectRatio,
    output_dir: PathBuf,
) -> Result<()> {
    println!("Studio Director. Type 'help' for commands.");
    let input = BufReader::new(tokio::io::stdin());
    run_session_with(&studio, input, default_aspect_ratio, &output_dir).await
}

/// Reads commands until EOF, `quit` or Ctrl-C, then waits for every request
/// that was already dispatched.
async fn run_session_with<R>(
    studio: &Studio,
    input: R,
    default_aspect_ratio: AspectRatio,
    output_dir: &Path,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut tasks = JoinSet::new();
    let outcome = read_commands(studio, input, &mut tasks, default_aspect_ratio, output_dir).await;

    if !tasks.is_empty() {
        println!("Waiting for {} request(s) to finish...", tasks.len());
    }
    while let Some(finished) = tasks.join_next().await {
        log_task_outcome(finished);
    }
    outcome
}

async fn read_commands<R>(
    studio: &Studio,
    input: R,
    tasks: &mut JoinSet<()>,
    default_aspect_ratio: AspectRatio,
    output_dir: &Path,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut stdout = tokio::io::stdout();

    loop {
        while let Some(finished) = tasks.try_join_next() {
            log_task_outcome(finished);
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, closing session");
                break;
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(message) => {
                println!("{message}");
                continue;
            }
        };
        match handle_command(studio, tasks, command, default_aspect_ratio, output_dir).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(err) => {
                warn!("Session command failed: {err:#}");
                eprintln!("{err:#}");
            }
        }
    }
    Ok(())
}
