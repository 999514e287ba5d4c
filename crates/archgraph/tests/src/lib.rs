//! Cross-crate scenario and property tests for Archgraph.
//!
//! Everything lives under `tests/`; this library is intentionally empty.
