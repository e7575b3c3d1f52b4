// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain layer of the practice pipeline: aggregates, value objects, events
//! and the contracts the application layer depends on.

pub mod config;
pub mod drill;
pub mod events;
pub mod generation;
pub mod insight;
pub mod repository;
pub mod weak_skill;

pub use drill::*;
pub use events::*;
pub use generation::*;
pub use insight::*;
pub use repository::*;
pub use weak_skill::*;
