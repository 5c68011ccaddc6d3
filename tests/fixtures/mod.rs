//! Test fixtures for auction-planner.
//!
//! Provides realistic test data including:
//! - Real Swiss city coordinates joined into a road network
//! - Builders for tasks, fleets and seeded search options

#![allow(dead_code)]

pub mod swiss_cities;

pub use swiss_cities::*;
