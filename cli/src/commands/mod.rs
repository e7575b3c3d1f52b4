// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Skillforge CLI

pub mod config;
pub mod drills;
pub mod insights;

pub use self::config::ConfigCommand;
pub use self::drills::DrillsCommand;
pub use self::insights::InsightsCommand;
