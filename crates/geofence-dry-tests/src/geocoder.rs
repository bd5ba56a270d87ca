// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Scripted reverse geocoder.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use geofence_geocode::{GeocodeError, ReverseGeocoder};
use geofence_map_port::LatLng;

/// What a scripted lookup answers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Resolve to this address.
    Address(String),
    /// The service has nothing for this point.
    NotFound,
    /// The service answered with this HTTP status.
    Status(u16),
}

impl Answer {
    fn into_result(self) -> Result<String, GeocodeError> {
        match self {
            Self::Address(addr) => Ok(addr),
            Self::NotFound => Err(GeocodeError::NotFound),
            Self::Status(code) => Err(GeocodeError::Status(code)),
        }
    }
}

type PointKey = (u64, u64);

fn key(at: LatLng) -> PointKey {
    (at.lat.to_bits(), at.lng.to_bits())
}

/// Reverse geocoder answering from a per-point script.
///
/// Unscripted points answer [`Answer::NotFound`]. Clones share the script
/// and the call log.
#[derive(Clone, Default)]
pub struct ScriptedGeocoder {
    inner: Arc<Mutex<ScriptInner>>,
}

#[derive(Default)]
struct ScriptInner {
    answers: HashMap<PointKey, (Answer, Option<Duration>)>,
    calls: Vec<LatLng>,
}

impl ScriptedGeocoder {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Answer `at` immediately.
    pub fn answer(self, at: LatLng, answer: Answer) -> Self {
        self.lock().answers.insert(key(at), (answer, None));
        self
    }

    /// Answer `at` after `delay`.
    pub fn answer_after(self, at: LatLng, answer: Answer, delay: Duration) -> Self {
        self.lock().answers.insert(key(at), (answer, Some(delay)));
        self
    }

    /// Points looked up so far, in call order.
    pub fn calls(&self) -> Vec<LatLng> {
        self.lock().calls.clone()
    }
}

impl ReverseGeocoder for ScriptedGeocoder {
    fn resolve(&self, at: LatLng) -> impl Future<Output = Result<String, GeocodeError>> + Send {
        let scripted = {
            let mut inner = self.lock();
            inner.calls.push(at);
            inner.answers.get(&key(at)).cloned()
        };
        async move {
            let (answer, delay) = scripted.unwrap_or((Answer::NotFound, None));
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            answer.into_result()
        }
    }
}
