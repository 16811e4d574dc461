//! Workspace placeholder crate.
//!
//! This crate exists to expose feature flags that map to the individual
//! workspace crates (e.g., `mockmedia-service`, `mockmedia-player`). Test
//! harnesses can depend on `mockmedia-workspace` with the default `service`
//! feature instead of wiring each crate individually.
