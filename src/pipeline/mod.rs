//! Pipeline stages for webhook-driven conversion.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the webhook exchange can change without touching status handling.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ run ──▶ submit ──▶ normalize
//! (paths)  (status) (multipart) (URL + size)
//! ```
//!
//! 1. [`input`]     — expand paths, apply the image allow-list
//! 2. [`run`]       — the per-file state machine and its error boundary
//! 3. [`submit`]    — POST the multipart form; the only stage with network I/O
//! 4. [`normalize`] — ordered field rules that find a URL and a size in the reply

pub mod input;
pub mod normalize;
pub mod run;
pub mod submit;
