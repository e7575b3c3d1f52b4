// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer: storage backends, the generation adapter and the event bus

pub mod event_bus;
pub mod memory_store;
pub mod ollama;
pub mod sled_store;

pub use event_bus::TracingEventBus;
pub use memory_store::{InMemoryDrillRepository, InMemoryInsightRepository};
pub use ollama::OllamaGenerationService;
pub use sled_store::{open_database, SledDrillRepository, SledInsightRepository, INSIGHTS_ARCHIVE_TREE};
