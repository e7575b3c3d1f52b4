// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Skillforge Cortex
//!
//! Long-term mistake memory ("insights") and the personalized drill pipeline
//! built on top of it.
//!
//! # Architecture
//!
//! - **Layer:** Learning & Memory Layer
//! - **Purpose:** Insight retention, deduplication and compression; drill
//!   generation, validation and quota-bounded admission

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
