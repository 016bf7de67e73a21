//! Taskdeps - a cycle-safe task dependency graph.
//!
//! This crate tracks "blocks / blocked-by" relations between tasks of a
//! project. It provides both a CLI application and a library with a pluggable
//! storage backend.

#![forbid(unsafe_code)]

// Public modules for library usage
pub mod domain;
pub mod error;
pub mod id_generation;
pub mod jsonl;
pub mod storage;
pub mod tasks;

// Public CLI module (needed by binary)
pub mod app;
pub mod cli;

// Command implementations
pub mod commands;

pub mod output;
