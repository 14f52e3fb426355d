//! Pipeline stages for document triage.
//!
//! Each submodule implements one step. The orchestrator in
//! [`crate::convert`] is the only code that strings them together.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ classify ──▶ extract ──┬──▶ render  ──┬──▶ postprocess
//! (path/URL) (lopdf)     (strategy) │   (local)    │
//!                                   └──▶ llm ──────┘
//!                                       (dispatch)
//! ```
//!
//! 1. [`input`]     — load a local path or download a URL into memory
//! 2. [`pdf`]       — the only module that touches the `lopdf` object model
//! 3. [`classify`]  — pure, total structural classification
//! 4. [`extract`]   — closed set of extraction strategies and their registry
//! 5. [`render`]    — rule-based Markdown for the local path
//! 6. [`analyze`]   — rule-based summary, key points, topics and language
//! 7. [`dispatch`]  — single-lane, rate-windowed, retrying gate for remote calls
//! 8. [`llm`]       — completion-service seam and the remote enrichment calls
//! 9. [`postprocess`] — deterministic cleanup applied to every Markdown document

pub mod analyze;
pub mod classify;
pub mod dispatch;
pub mod extract;
pub mod input;
pub mod llm;
pub mod pdf;
pub mod postprocess;
pub mod render;
