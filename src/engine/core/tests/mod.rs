use super::*;
use crate::engine::command::PollRequest;
use crate::engine::config::{BucketConfig, CoreConfig};
use crate::storage::RocksDbStorage;

mod common;
use common::*;

mod enqueue;
