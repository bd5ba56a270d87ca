// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for the geofence console (config, prefs, alerts).
//! Keeps UI/runtime adapters thin and framework-agnostic.

pub mod alert;
pub mod config;
pub mod prefs;
