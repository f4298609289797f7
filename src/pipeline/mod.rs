//! Pipeline stages for classifying and renaming one PDF.
//!
//! Each submodule implements exactly one step and is testable on its own;
//! [`crate::renamer`] strings them together and owns all state.
//!
//! ## Data Flow
//!
//! ```text
//! normalize ──▶ ready ──▶ render ──▶ encode ──▶ classify / llm ──▶ rename
//! (event)     (poll)    (pdfium)   (base64)   (VLM, JSON)        (fs)
//! ```
//!
//! 1. [`normalize`]: filter watch events down to a [`normalize::PendingFile`]
//! 2. [`ready`]: bounded poll until the file has stopped growing
//! 3. [`render`]: rasterise page one; blocking, run via `spawn_blocking`
//! 4. [`encode`]: PNG bytes and the base64 data URI
//! 5. [`classify`]: the classifier contract, the response parser and the
//!    OpenAI structured-output backend; [`llm`] adds every other provider
//! 6. [`rename`]: sanitise the title, plan the new name, rename once

pub mod classify;
pub mod encode;
pub mod llm;
pub mod normalize;
pub mod ready;
pub mod rename;
pub mod render;
