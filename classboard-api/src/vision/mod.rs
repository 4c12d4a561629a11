//! Vision-language model access
//!
//! The pipeline hands the model one schedule image and gets back the raw
//! text of its reply. Parsing that text is the reply parser's job, not the
//! client's.

pub mod gemini;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

pub use gemini::GeminiClient;

/// Vision client errors
#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Vision request failed: {0}")]
    Network(String),

    #[error("Vision API error {0}: {1}")]
    Api(u16, String),

    #[error("Vision model returned no text: {0}")]
    EmptyReply(String),

    #[error("Unexpected vision response: {0}")]
    Parse(String),

    #[error("Vision client misconfigured: {0}")]
    Config(String),
}

pub type VisionResult<T> = Result<T, VisionError>;

/// Image bytes as sent inline to the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    /// Standard base64 of the image bytes
    pub data: String,
}

/// A hosted model that reads schedule images
#[async_trait]
pub trait VisionModel: Send + Sync {
    /// Model identifier, for logs
    fn model_name(&self) -> &str;

    /// Send the prompt and image, return the reply text verbatim
    async fn generate(&self, prompt: &str, image: &InlineImage) -> VisionResult<String>;
}

/// Instructions sent with every schedule image
pub const SCHEDULE_PROMPT: &str = r#"Analyze this King Saud University student schedule image and extract all class information.

Return a JSON array with this structure for each class:
[
  {
    "course_code": "1203",
    "course_name_arabic": "مهارات التعلم نهج والتفكير والبحث",
    "course_name_english": "Learning Skills, Approach, Thinking, and Research",
    "day_number": 2,
    "start_time": "13:00",
    "end_time": "14:50",
    "building": "02",
    "floor": "2",
    "wing": "A",
    "room": "320",
    "instructor_name": "امل احمد عبدالله باصويل"
  }
]

Important notes:
- Day numbers: 1=Sunday, 2=Monday, 3=Tuesday, 4=Wednesday, 5=Thursday, 6=Friday, 7=Saturday
- Time format: "HH:MM" in 24-hour format
- Extract all classes from the schedule
- If you see multiple entries for the same course on different days, create separate entries
- Be precise with Arabic text extraction
- Return only the JSON array, with no other text"#;

/// Schema constraining the model's JSON output to an array of entries
pub fn schedule_response_schema() -> Value {
    let text = json!({ "type": "STRING" });
    json!({
        "type": "ARRAY",
        "items": {
            "type": "OBJECT",
            "properties": {
                "course_code": text,
                "course_name_arabic": text,
                "course_name_english": text,
                "day_number": { "type": "INTEGER" },
                "start_time": text,
                "end_time": text,
                "building": text,
                "floor": text,
                "wing": text,
                "room": text,
                "instructor_name": text
            },
            "required": ["course_code", "day_number", "start_time", "end_time"]
        }
    })
}
