//! # Audio Module
//!
//! Queue and playback scheduling system for Open Jukebox.
//!
//! This module provides the per-guild playback core:
//!
//! ### [`queue`] - Queue Management
//! - FIFO queue with remove/promote/shuffle operations
//! - Display-ready pagination
//!
//! ### [`session`] - Guild Sessions
//! - One isolated session per guild, behind its own lock
//! - Process-wide registry with first-touch creation
//!
//! ### [`player`] - Playback Scheduler
//! - Completion-driven state machine that chains track after track
//! - Lazy resolution off-lock, with generation checks against racing stops
//! - Loop, skip, pause/resume, stop and auto-stop handling
//!
//! Sessions are fully independent: operations on different guilds never
//! contend for the same lock.

pub mod player;
pub mod queue;
pub mod session;
