//! Prompt construction for floor-plan extraction.
//!
//! A [`PromptProfile`] is data: system framing, task/schema text and a list
//! of worked examples. [`build_conversation`] turns a profile plus the
//! uploaded image into the ordered turns sent to the model:
//!
//! 1. system turn with the profile's framing
//! 2. two user turns per exemplar (annotated image, then expected output)
//! 3. user text turn with the task, schema and raw-JSON instruction
//! 4. user turn carrying only the uploaded image

use crate::conversation::{Conversation, ImageReference, Part, Turn};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert in analyzing restaurant layouts.";

const DEFAULT_TASK_PROMPT: &str = r#"Analyze the provided blueprint, layout, or sketch of a restaurant. Identify the following objects:
- Tables
- Bars
- Walls
- Chairs
- Doors
- Windows

Return the response as structured JSON:
{
  "objects": [
    { "type": "table", "x": 120, "y": 250, "width": 50, "height": 50 },
    { "type": "bar", "x": 300, "y": 400, "width": 100, "height": 50 },
    { "type": "wall", "x": 0, "y": 0, "width": 800, "height": 20 },
    { "type": "chair", "x": 130, "y": 260, "width": 20, "height": 20 }
  ]
}"#;

/// Appended to every task turn, whatever the profile says.
pub const RAW_JSON_INSTRUCTION: &str = "IMPORTANT: Do NOT wrap the answer in markdown code fences (no ``` and no ```json). Return only the JSON object as raw JSON, with no extra text or formatting.";

const EXPECTED_OUTPUT_HEADER: &str = "Expected JSON output for the example above:";

const INFER_OUTPUT_INSTRUCTION: &str = "No expected output is given for this example. Infer it from the annotation above, using the same schema as the final task.";

/// A worked example shown to the model before the real task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    /// Remotely fetchable image of an annotated floor plan
    pub image_url: String,
    /// Explanation of the markup visible in the image
    pub annotation: String,
    /// Exact JSON the model should produce for this image
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_output: Option<String>,
}

impl Exemplar {
    pub fn new(image_url: impl Into<String>, annotation: impl Into<String>) -> Self {
        Self {
            image_url: image_url.into(),
            annotation: annotation.into(),
            expected_output: None,
        }
    }

    pub fn with_expected_output(mut self, output: impl Into<String>) -> Self {
        self.expected_output = Some(output.into());
        self
    }

    fn turns(&self) -> [Turn; 2] {
        let example = Turn::user_parts(vec![
            Part::Text(self.annotation.clone()),
            Part::Image(ImageReference::url(&self.image_url)),
        ]);
        let expected = match &self.expected_output {
            Some(output) => Turn::user_text(format!("{}\n{}", EXPECTED_OUTPUT_HEADER, output)),
            None => Turn::user_text(INFER_OUTPUT_INSTRUCTION),
        };
        [example, expected]
    }
}

/// System framing, task/schema description and exemplars for one prompt
/// variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptProfile {
    pub system: String,
    /// Extraction task including the target JSON schema
    pub task: String,
    #[serde(default)]
    pub exemplars: Vec<Exemplar>,
}

impl Default for PromptProfile {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM_PROMPT.to_string(),
            task: DEFAULT_TASK_PROMPT.to_string(),
            exemplars: Vec::new(),
        }
    }
}

impl PromptProfile {
    /// Parse a profile from JSON.
    ///
    /// ```
    /// use tablemap::PromptProfile;
    ///
    /// let profile = PromptProfile::from_json_str(r#"{
    ///     "system": "You read floor plans.",
    ///     "task": "List the tables.",
    ///     "exemplars": [
    ///         { "image_url": "https://example.com/a.png", "annotation": "Red boxes are tables." }
    ///     ]
    /// }"#).unwrap();
    /// assert_eq!(profile.exemplars.len(), 1);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a profile from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::ProfileRead {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_exemplar(mut self, exemplar: Exemplar) -> Self {
        self.exemplars.push(exemplar);
        self
    }

    /// Task text as sent to the model, raw-JSON instruction included.
    pub fn task_prompt(&self) -> String {
        format!("{}\n\n{}", self.task.trim_end(), RAW_JSON_INSTRUCTION)
    }

    /// Number of turns [`build_conversation`] produces for this profile.
    pub fn turn_count(&self) -> usize {
        3 + 2 * self.exemplars.len()
    }
}

/// Build the conversation for one uploaded image.
pub fn build_conversation(profile: &PromptProfile, image: ImageReference) -> Conversation {
    let mut conversation = Conversation::new().with_turn(Turn::system(&profile.system));
    for exemplar in &profile.exemplars {
        for turn in exemplar.turns() {
            conversation.push(turn);
        }
    }
    conversation
        .with_turn(Turn::user_text(profile.task_prompt()))
        .with_turn(Turn::user_image(image))
}
