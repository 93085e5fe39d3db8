//! Per-row pipeline stages for rubric review.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and the network-facing ones can be swapped behind a
//! trait.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ score ──▶ flatten
//! (fetch)   (pdfium)   (base64)   (VLM)    (columns)
//!  └──────── normalize ────────┘
//! ```
//!
//! 1. [`normalize`] — leave image references alone; for PDFs run
//!    [`input`] (download or read, `%PDF` check), [`render`] (first page
//!    in `spawn_blocking`) and [`encode`] (PNG data URL)
//! 2. [`score`]     — one chat-completion call per row, racing the run's
//!    cancellation token; the only stage that talks to the scoring service
//! 3. [`flatten`]   — pure conversion of the rubric into export columns

pub mod encode;
pub mod flatten;
pub mod input;
pub mod normalize;
pub mod render;
pub mod score;
