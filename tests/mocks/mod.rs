//! Shared test doubles for integration tests

#![allow(dead_code)]

pub mod explorer;
pub mod fakes;
