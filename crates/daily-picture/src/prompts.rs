//! Prompt text for the two model stages.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever wording changes. The
//! version is logged with every generation run so a stored picture can be
//! traced back to the prompt that produced it.

use content::{month_name, ArtStyle};

/// Prompt version. Bump on any prompt wording change.
pub const PROMPT_VERSION: &str = "2.1.0";

/// Example answer embedded in the event-selection prompt.
const EVENT_EXAMPLE: &str = r#"{
  "year": 1969,
  "title": "Apollo 11 Moon Landing",
  "description": "Neil Armstrong and Buzz Aldrin became the first humans to walk on the Moon.",
  "imagePrompt": "Two astronauts in bulky white spacesuits standing at the hatch of the lunar module Eagle, about to step down onto the grey dust of the Sea of Tranquility, Earth hanging in the black sky above the barren horizon, hard sunlight casting long shadows"
}"#;

/// Prompt asking the text model to pick one event that happened on
/// `month`/`day` and answer with a single JSON object.
pub fn event_selection_prompt(month: u32, day: u32) -> String {
    let month = month_name(month).unwrap_or("January");
    format!(
        "You are a historian. Pick ONE significant historical event that happened on {month} {day}.

Choose an event that is visually compelling: battles, discoveries, inventions, space exploration, \
natural phenomena, architectural achievements, or dramatic turning points.

Respond with exactly one JSON object and nothing else (no markdown, no code fences), with the keys \
year, title, description and imagePrompt. Example:
{EVENT_EXAMPLE}

The imagePrompt must describe \"the moment just before\" the event happened, composed in LANDSCAPE \
orientation. It MUST depict the ACTUAL, REAL, recognizable location, building, person or object with \
accurate architectural and geographic detail. Use proper names and distinctive real features \
(e.g. \"the Reichstag building in Berlin with its glass dome and neoclassical columns\", not \
\"a government building\"). Make it visually rich and dramatic for a wide frame. \
Do NOT include any text, labels or dates in the image description."
    )
}

/// One-sentence visual descriptor for a style.
pub fn style_descriptor(style: ArtStyle) -> &'static str {
    match style {
        ArtStyle::ArtDeco => {
            "Art deco illustration, bold geometric shapes, strong lines, elegant and dramatic."
        }
        ArtStyle::Woodcut => {
            "Woodcut print style, bold black lines, high contrast, dramatic cross-hatching."
        }
        ArtStyle::InkWash => {
            "East Asian ink wash painting style, fluid brushstrokes, atmospheric, minimalist."
        }
        ArtStyle::Noir => {
            "Film noir style, extreme high contrast, deep shadows, dramatic chiaroscuro lighting."
        }
        ArtStyle::Sketch => {
            "Detailed pencil sketch, fine cross-hatching, architectural precision, hand-drawn feel."
        }
    }
}

/// Text the image model is asked to paint into the picture itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Banner {
    /// e.g. `"July 20, 1969"`.
    pub date_label: String,
    pub title: String,
}

/// Full image-model prompt: the scene from stage one plus style, the
/// monochrome constraint and, optionally, a banner instruction.
pub fn image_generation_prompt(raw_prompt: &str, style: ArtStyle, banner: Option<&Banner>) -> String {
    let mut prompt = format!(
        "{}\n\nStyle: {} Black and white monochrome only: pure grayscale, no color, no sepia or \
         tinted tones. The depiction must show the ACTUAL recognizable real-world subject, not a \
         generic substitute. Landscape composition.",
        raw_prompt.trim(),
        style_descriptor(style)
    );
    if let Some(banner) = banner {
        prompt.push_str(&format!(
            "\n\nAlong the bottom edge, render a two-line text banner: a small first line reading \
             exactly \"{}\" and a larger bold second line reading exactly \"{}\". Reproduce both \
             lines letter for letter with no other text anywhere in the image.",
            banner.date_label, banner.title
        ));
    }
    prompt
}
