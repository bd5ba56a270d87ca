// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared test doubles and fixtures for geofence crates.
#![forbid(unsafe_code)]
//!
//! # Modules
//!
//! - [`config`] - In-memory config store fake for testing without filesystem
//! - [`frames`] - Record, snapshot and diff builders
//! - [`geocoder`] - Scripted reverse geocoder with per-point answers and delays
//! - [`surface`] - Headless map surface that records every overlay operation

pub mod config;
pub mod frames;
pub mod geocoder;
pub mod surface;

pub use config::InMemoryConfigStore;
pub use frames::{DiffBuilder, RecordBuilder, SnapshotBuilder};
pub use geocoder::{Answer, ScriptedGeocoder};
pub use surface::{MockSurface, SurfaceOps};
