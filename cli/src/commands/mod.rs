// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Operator commands for the invoicer CLI

pub mod config;
pub mod migrate;
pub mod status;

pub use self::config::ConfigCommand;
