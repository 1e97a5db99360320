//! Shared helpers for the self-update workspace.

pub mod shell;
