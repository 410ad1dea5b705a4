//! Pipeline stages for blueprint estimation.
//!
//! Each submodule implements exactly one step, so each can be tested against
//! a fake remote or plain values without the others.
//!
//! ## Data Flow
//!
//! ```text
//! intake ──▶ analysis ──────────────────▶ normalize ──▶ table / export
//! (stage)    (upload, poll, generate)     (fences,      (text, HTML,
//!                 │                        JSON)         .xlsx)
//!                 └─▶ poll
//! ```
//!
//! 1. [`intake`]    — check the file type and stage the bytes in a temp file
//! 2. [`analysis`]  — upload, wait via [`poll`], then one generation call;
//!    the only stage with network I/O
//! 3. [`normalize`] — strip code fences and parse the reply into line items
//! 4. [`table`]     — render line items for the terminal or the browser
//! 5. [`export`]    — write line items as an `.xlsx` workbook

pub mod analysis;
pub mod export;
pub mod intake;
pub mod normalize;
pub mod poll;
pub mod table;
