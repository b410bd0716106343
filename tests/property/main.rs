//! Property-based soundness tests.
//!
//! Run with: `cargo test --test property`

mod live_set_soundness;
mod pack_triage;
