//! # tablemap
//!
//! Restaurant floor-plan extraction through multimodal chat models.
//!
//! An uploaded image is base64-encoded, wrapped in a few-shot prompt that
//! asks for a single JSON object describing tables, bars, walls, chairs,
//! doors and windows, and sent to a chat-completions endpoint. The model's
//! answer comes back as text with any markdown code fence removed.
//!
//! ## Features
//!
//! - **Prompt profiles** as data: system framing, schema text and worked
//!   examples (image + annotation + expected output), loadable from JSON
//! - **Typed conversation model**: plain-text turns and multi-part turns
//!   are distinct variants, image turns are always multi-part
//! - **Error taxonomy**: transport failures, provider-reported errors and
//!   empty answers are separate variants of [`AnalyzeError`]
//! - **Fence-safe answers**: exact prefix/suffix matching, never a
//!   character trim, so JSON content at the edges survives
//! - **Upload server** (`POST /upload`) for browser frontends
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tablemap::{AnalyzerConfig, FloorPlanAnalyzer, PromptProfile};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = AnalyzerConfig::from_env()?;
//!     let analyzer = FloorPlanAnalyzer::new(config)
//!         .with_profile(PromptProfile::from_path("profiles/restaurant.json")?);
//!
//!     let bytes = std::fs::read("plan.png")?;
//!     let json = analyzer.analyze_image(&bytes, "image/png").await?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Sanitization
//!
//! ```rust
//! use tablemap::strip_code_fence;
//!
//! assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
//! assert_eq!(strip_code_fence("{\"a\":1}"), "{\"a\":1}");
//! ```

pub mod client;
pub mod conversation;
pub mod error;
pub mod image;
pub mod parser;
pub mod prompt;
pub mod server;
pub mod types;
pub mod wire;

pub use client::{decode_response, FloorPlanAnalyzer};
pub use conversation::{Content, Conversation, ImageReference, Part, Role, Turn};
pub use error::{AnalyzeError, ConfigError, Result, TransportCause};
pub use image::{detect_mime_type, encode_image, resolve_mime_type};
pub use parser::strip_code_fence;
pub use prompt::{build_conversation, Exemplar, PromptProfile};
pub use types::{AnalyzerConfig, ServerConfig};
