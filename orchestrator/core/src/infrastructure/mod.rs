// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod database;
pub mod mcprouter;
pub mod repositories;
pub mod storage;

pub use database::{
    select_backend, storage_state, BackendKind, BackendSelection, Database, StorageState,
};
pub use mcprouter::McpRouterValidator;
pub use storage::{connect_object_storage, MockObjectStorage, S3ObjectStorage};
