// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Staged single-candidate creation.
//!
//! `Idle -> Placed -> Resolved -> Idle`. A click places (or moves) the one
//! candidate marker and circle and hands out a [`LookupTicket`]; only the
//! newest ticket may resolve the address. Save and cancel both discard the
//! candidate's overlays.

use geofence_geocode::{GeocodeError, NO_ADDRESS_FOUND};
use geofence_map_port::{
    CircleDef, CircleStyle, LatLng, MapSurface, MarkerDef, MarkerIcon, OverlayHandle,
    SurfaceError,
};
use geofence_model::{parse_radius, GeoPoint, NewGeofence};
use tracing::{debug, warn};

use crate::popup::candidate_popup;
use crate::ValidationError;

/// Candidate radius when the radius field is blank or unparsable.
pub const DEFAULT_RADIUS_M: u32 = 10;

/// Where the create flow stands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CreatePhase {
    /// No candidate.
    #[default]
    Idle,
    /// Candidate placed, address lookup outstanding.
    Placed,
    /// Lookup finished (possibly without an address).
    Resolved,
}

/// The unsaved zone being placed.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    /// Last clicked point.
    pub location: LatLng,
    /// Resolved address; `None` while placing or after a failed lookup.
    pub address: Option<String>,
    /// Candidate marker.
    pub marker: OverlayHandle,
    /// Candidate circle.
    pub circle: OverlayHandle,
}

/// Address lookup issued by a click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookupTicket {
    /// Monotonic click token.
    pub token: u64,
    /// Point to resolve.
    pub at: LatLng,
}

/// A lookup that landed on the current candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResolved {
    /// Candidate location.
    pub location: LatLng,
    /// Address, if the lookup produced one.
    pub address: Option<String>,
}

/// Create-flow state machine over a map surface.
#[derive(Debug)]
pub struct CreateFlowController {
    style: CircleStyle,
    icon: MarkerIcon,
    default_radius: u32,
    phase: CreatePhase,
    candidate: Option<Candidate>,
    deployment: String,
    radius_input: String,
    last_token: u64,
    pending: Option<u64>,
}

impl Default for CreateFlowController {
    fn default() -> Self {
        Self::new(CircleStyle::default(), MarkerIcon::default(), DEFAULT_RADIUS_M)
    }
}

impl CreateFlowController {
    /// Idle controller drawing candidates with the given style, icon and
    /// fallback radius.
    pub fn new(style: CircleStyle, icon: MarkerIcon, default_radius: u32) -> Self {
        Self {
            style,
            icon,
            default_radius: default_radius.max(1),
            phase: CreatePhase::Idle,
            candidate: None,
            deployment: String::new(),
            radius_input: String::new(),
            last_token: 0,
            pending: None,
        }
    }

    /// Current phase.
    pub fn phase(&self) -> CreatePhase {
        self.phase
    }

    /// Current candidate.
    pub fn candidate(&self) -> Option<&Candidate> {
        self.candidate.as_ref()
    }

    /// Deployment field as typed.
    pub fn deployment(&self) -> &str {
        &self.deployment
    }

    /// Radius field as typed.
    pub fn radius_input(&self) -> &str {
        &self.radius_input
    }

    /// The radius field only takes input once a location is picked.
    pub fn radius_enabled(&self) -> bool {
        self.candidate.is_some()
    }

    /// Token of the lookup still awaited, if any.
    pub fn pending_token(&self) -> Option<u64> {
        self.pending
    }

    /// Radius the candidate circle is drawn with.
    pub fn effective_radius(&self) -> u32 {
        parse_radius(&self.radius_input).unwrap_or(self.default_radius)
    }

    /// Place the candidate at `at`, or move it there.
    ///
    /// Any earlier ticket is superseded and a moved candidate loses its
    /// address popup. On a surface failure nothing is placed or moved and the
    /// flow stays where it was, earlier ticket included.
    pub fn click<S>(&mut self, surface: &mut S, at: LatLng) -> Result<LookupTicket, SurfaceError>
    where
        S: MapSurface + ?Sized,
    {
        if let Some(candidate) = self.candidate.as_mut() {
            surface.set_marker_position(candidate.marker, at)?;
            if let Err(err) = surface.set_circle_center(candidate.circle, at) {
                if let Err(back) = surface.set_marker_position(candidate.marker, candidate.location)
                {
                    warn!(?back, "could not move candidate marker back");
                }
                return Err(err);
            }
            candidate.location = at;
            candidate.address = None;
            // the old address no longer describes this point
            if let Err(err) = surface.unbind_popup(candidate.marker) {
                warn!(?err, "could not drop stale candidate popup");
            }
        } else {
            let marker = surface.add_marker(&MarkerDef {
                position: at,
                icon: self.icon.clone(),
            })?;
            let circle = match surface.add_circle(&CircleDef {
                center: at,
                radius_m: f64::from(self.effective_radius()),
                style: self.style.clone(),
            }) {
                Ok(circle) => circle,
                Err(err) => {
                    if let Err(cleanup) = surface.remove_overlay(marker) {
                        warn!(?cleanup, "could not remove candidate marker");
                    }
                    return Err(err);
                }
            };
            self.candidate = Some(Candidate {
                location: at,
                address: None,
                marker,
                circle,
            });
        }
        self.phase = CreatePhase::Placed;
        self.last_token += 1;
        self.pending = Some(self.last_token);
        Ok(LookupTicket {
            token: self.last_token,
            at,
        })
    }

    /// Land a lookup outcome. Superseded tickets are dropped and yield `None`.
    ///
    /// Not-found resolves to the fallback text; any other failure resolves
    /// with no address. Either way the radius field is reset to the default.
    pub fn resolve<S>(
        &mut self,
        surface: &mut S,
        token: u64,
        outcome: Result<String, GeocodeError>,
    ) -> Option<CandidateResolved>
    where
        S: MapSurface + ?Sized,
    {
        if self.pending != Some(token) {
            debug!(token, latest = self.last_token, "discarding superseded lookup");
            return None;
        }
        let candidate = self.candidate.as_mut()?;
        let address = match outcome {
            Ok(address) => Some(address),
            Err(GeocodeError::NotFound) => Some(NO_ADDRESS_FOUND.to_string()),
            Err(err) => {
                warn!(%err, lat = candidate.location.lat, lon = candidate.location.lng, "address lookup failed");
                None
            }
        };
        if let Some(address) = &address {
            let shown = surface
                .bind_popup(candidate.marker, &candidate_popup(address))
                .and_then(|()| surface.open_popup(candidate.marker));
            if let Err(err) = shown {
                warn!(?err, "could not show candidate address");
            }
        }
        candidate.address.clone_from(&address);
        let circle = candidate.circle;
        let location = candidate.location;
        self.radius_input = self.default_radius.to_string();
        if let Err(err) = surface.set_circle_radius(circle, f64::from(self.default_radius)) {
            warn!(?err, "could not reset candidate radius");
        }
        self.pending = None;
        self.phase = CreatePhase::Resolved;
        Some(CandidateResolved { location, address })
    }

    /// Update the deployment field.
    pub fn set_deployment(&mut self, deployment: impl Into<String>) {
        self.deployment = deployment.into();
    }

    /// Update the radius field and resize the candidate circle live.
    ///
    /// Ignored (returns `false`) while no candidate is placed.
    pub fn set_radius<S>(&mut self, surface: &mut S, raw: &str) -> Result<bool, SurfaceError>
    where
        S: MapSurface + ?Sized,
    {
        let Some(circle) = self.candidate.as_ref().map(|c| c.circle) else {
            return Ok(false);
        };
        raw.clone_into(&mut self.radius_input);
        surface.set_circle_radius(circle, f64::from(self.effective_radius()))?;
        Ok(true)
    }

    /// Validate the form and turn the candidate into a create payload.
    ///
    /// On success the candidate is discarded before the caller writes. On
    /// failure nothing changes.
    pub fn save<S>(&mut self, surface: &mut S) -> Result<NewGeofence, ValidationError>
    where
        S: MapSurface + ?Sized,
    {
        let candidate = self
            .candidate
            .as_ref()
            .ok_or(ValidationError::MissingLocation)?;
        let address = candidate
            .address
            .as_deref()
            .filter(|a| !a.trim().is_empty())
            .ok_or(ValidationError::MissingAddress)?;
        let deployment = self.deployment.trim();
        if deployment.is_empty() {
            return Err(ValidationError::MissingDeployment);
        }
        if self.radius_input.trim().is_empty() {
            return Err(ValidationError::MissingRadius);
        }
        let radius_meters =
            parse_radius(&self.radius_input).ok_or(ValidationError::InvalidRadius)?;
        let doc = NewGeofence {
            deployment: deployment.to_string(),
            address: address.to_string(),
            radius_meters,
            location: GeoPoint::new(candidate.location.lat, candidate.location.lng),
        };
        self.discard(surface);
        Ok(doc)
    }

    /// Drop the candidate without saving. Returns `false` when idle.
    pub fn cancel<S>(&mut self, surface: &mut S) -> bool
    where
        S: MapSurface + ?Sized,
    {
        let had = self.candidate.is_some();
        self.discard(surface);
        had
    }

    /// Remove the candidate overlays and reset to `Idle`. Returns the number
    /// of overlays removed.
    pub fn discard<S>(&mut self, surface: &mut S) -> usize
    where
        S: MapSurface + ?Sized,
    {
        let mut removed = 0;
        if let Some(candidate) = self.candidate.take() {
            for handle in [candidate.marker, candidate.circle] {
                match surface.remove_overlay(handle) {
                    Ok(()) => removed += 1,
                    Err(err) => warn!(?err, "could not remove candidate overlay"),
                }
            }
        }
        self.phase = CreatePhase::Idle;
        self.pending = None;
        self.deployment.clear();
        self.radius_input.clear();
        removed
    }
}
