//! Pipeline stages for introduction extraction and analysis.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the PDF backend or LLM client can be swapped without touching the
//! others.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text ──▶ extract ──▶ llm ──▶ postprocess
//! (find)   (pdfium)  (markers)   (LLM)   (cleanup)
//! ```
//!
//! 1. [`input`]: list PDFs, check magic bytes, derive output names
//! 2. [`text`]: page text via pdfium inside `spawn_blocking`
//! 3. [`extract`]: locate the introduction between the two markers
//! 4. [`llm`]: one completion call per paper; the only network I/O
//! 5. [`postprocess`]: deterministic cleanup of the reply

pub mod extract;
pub mod input;
pub mod llm;
pub mod postprocess;
pub mod text;
