//! Server-authoritative engine for timed multiple-choice rounds with a live
//! leaderboard: question batches come from the Open Trivia DB (with a local
//! fallback bank), each question opens a fixed answer window driven by a
//! cancellable round clock, correct answers score by speed, and sessions end
//! on exhaustion or a majority vote.
//!
//! The engine renders nothing and owns no transport. Hosts plug in a
//! [`provider::QuestionProvider`] and a [`sink::NotificationSink`], feed
//! player events into [`engine::TriviaEngine`], and keep one engine per
//! context via [`registry::SessionRegistry`].

pub mod config;
pub mod engine;
pub mod provider;
pub mod registry;
pub mod sink;
pub mod types;
