// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One map, one live subscription, one task.
//!
//! [`GeofenceSyncSession::start`] opens the surface and the feed, then moves
//! both into a spawned task that owns every piece of mutable state. UI input
//! arrives as [`SessionCommand`]s; anything the surrounding page needs to show
//! leaves as [`SessionNotice`]s. Writes are fire-and-forget: their effect comes
//! back through the feed.
//!
//! On stop, commands already queued are still applied. Teardown order:
//! subscription, lookups, popup bindings, candidate, record overlays, surface.
//! The task ends once every issued write has finished.

use std::future::pending;
use std::sync::Arc;

use geofence_geocode::{GeocodeError, ReverseGeocoder};
use geofence_map_port::{
    CircleStyle, ControlId, LatLng, MapSurface, MapView, MarkerIcon, OverlayHandle, SurfaceError,
};
use geofence_model::{GeofenceRecord, GeofencePatch, NewGeofence, RecordId};
use geofence_store::{FeedEvent, FeedNormalizer, PersistenceGateway, Subscription};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::create_flow::{CreateFlowController, DEFAULT_RADIUS_M};
use crate::dispatch::{Dispatch, InteractionDispatcher};
use crate::edit_form::EditForm;
use crate::reconcile::{OverlayReconciler, ReconcileReport};
use crate::{CREATE_ALERT, EDIT_ALERT};

/// Static session settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Container the surface binds to.
    pub container: String,
    /// Initial viewport and tiles.
    pub view: MapView,
    /// Style for record and candidate circles.
    pub style: CircleStyle,
    /// Candidate marker icon.
    pub marker_icon: MarkerIcon,
    /// Candidate radius when the field is blank or unparsable.
    pub default_radius_m: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            container: "geofence-map".into(),
            view: MapView::default(),
            style: CircleStyle::default(),
            marker_icon: MarkerIcon::default(),
            default_radius_m: DEFAULT_RADIUS_M,
        }
    }
}

/// UI input routed into a running session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    /// The map was clicked.
    MapClick(LatLng),
    /// The engine opened the popup bound to this overlay.
    PopupOpened(OverlayHandle),
    /// Open a record's popup programmatically.
    OpenPopup(RecordId),
    /// The engine closed the open popup.
    PopupClosed,
    /// A control inside the open popup was clicked.
    ControlClicked(ControlId),
    /// Create form: deployment field changed.
    SetDeployment(String),
    /// Create form: radius field changed (raw text).
    SetRadius(String),
    /// Create form submitted.
    SaveCandidate,
    /// Create form cancelled.
    CancelCandidate,
    /// Edit form submitted.
    SubmitEdit(EditForm),
}

/// Events a session reports back to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// A snapshot was reconciled onto the map.
    Reconciled(ReconcileReport),
    /// The edit control was clicked; show the form for this record.
    EditRequested(GeofenceRecord),
    /// The candidate's address lookup finished.
    CandidateResolved {
        /// Candidate location.
        location: LatLng,
        /// Resolved address, `None` after a failed lookup.
        address: Option<String>,
    },
    /// A create write was issued.
    CreateIssued(NewGeofence),
    /// An update write was issued.
    UpdateIssued(RecordId, GeofencePatch),
    /// A delete write was issued.
    DeleteIssued(RecordId),
    /// A form was rejected; show this message.
    Alert(String),
    /// The feed reported a failure or went out of sync.
    FeedError(String),
}

/// Owner's handle on a running session.
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    notices: mpsc::UnboundedReceiver<SessionNotice>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Queue a command. `false` once the session has ended.
    pub fn send(&self, command: SessionCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    /// Wait for the next notice; `None` once the session has ended.
    pub async fn next_notice(&mut self) -> Option<SessionNotice> {
        self.notices.recv().await
    }

    /// Take an already-queued notice without waiting.
    pub fn try_notice(&mut self) -> Option<SessionNotice> {
        self.notices.try_recv().ok()
    }

    /// End the session and wait until teardown has finished.
    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(err) = task.await {
                log_join_error("session", &err);
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        // the task tears down on its own once the shutdown signal lands
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

fn log_join_error(task: &str, err: &JoinError) {
    if err.is_cancelled() {
        return;
    }
    if err.is_panic() {
        error!(?err, task, "task panicked");
    } else {
        warn!(?err, task, "task failed");
    }
}

/// Session entry point.
pub struct GeofenceSyncSession;

impl GeofenceSyncSession {
    /// Open the surface, subscribe, and spawn the session task.
    ///
    /// Returns `None` (and leaves nothing behind) when the surface cannot be
    /// opened or the subscription cannot be made. Must be called from within
    /// a tokio runtime.
    pub fn start<G, R, S, F>(
        config: &SessionConfig,
        gateway: Arc<G>,
        geocoder: Arc<R>,
        open_surface: F,
    ) -> Option<SessionHandle>
    where
        G: PersistenceGateway,
        R: ReverseGeocoder,
        S: MapSurface + Send + 'static,
        F: FnOnce(&str) -> Result<S, SurfaceError>,
    {
        let mut surface = match open_surface(&config.container) {
            Ok(surface) => surface,
            Err(err) => {
                warn!(?err, container = %config.container, "map surface unavailable; session not started");
                return None;
            }
        };
        if let Err(err) = surface.set_view(&config.view) {
            warn!(?err, container = %config.container, "map view rejected; session not started");
            surface.dispose();
            return None;
        }
        let subscription = match gateway.subscribe() {
            Ok(subscription) => subscription,
            Err(err) => {
                warn!(?err, "subscription failed; session not started");
                surface.dispose();
                return None;
            }
        };

        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (notices_tx, notices_rx) = mpsc::unbounded_channel();
        let (lookups_tx, lookups_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = SessionTask {
            gateway,
            geocoder,
            surface,
            subscription: Some(subscription),
            normalizer: FeedNormalizer::new(),
            reconciler: OverlayReconciler::new(config.style.clone()),
            dispatcher: InteractionDispatcher::new(),
            create: CreateFlowController::new(
                config.style.clone(),
                config.marker_icon.clone(),
                config.default_radius_m,
            ),
            lookup: None,
            lookups_tx,
            writes: JoinSet::new(),
            notices: notices_tx,
        };
        info!(container = %config.container, "geofence session started");
        let handle = tokio::spawn(task.run(shutdown_rx, commands_rx, lookups_rx));

        Some(SessionHandle {
            commands: commands_tx,
            notices: notices_rx,
            shutdown: Some(shutdown_tx),
            task: Some(handle),
        })
    }
}

struct LookupDone {
    token: u64,
    outcome: Result<String, GeocodeError>,
}

struct SessionTask<G, R, S> {
    gateway: Arc<G>,
    geocoder: Arc<R>,
    surface: S,
    subscription: Option<Subscription>,
    normalizer: FeedNormalizer,
    reconciler: OverlayReconciler,
    dispatcher: InteractionDispatcher,
    create: CreateFlowController,
    lookup: Option<JoinHandle<()>>,
    lookups_tx: mpsc::UnboundedSender<LookupDone>,
    writes: JoinSet<()>,
    notices: mpsc::UnboundedSender<SessionNotice>,
}

async fn next_event(subscription: &mut Option<Subscription>) -> Option<FeedEvent> {
    match subscription {
        Some(subscription) => subscription.next().await,
        None => pending().await,
    }
}

impl<G, R, S> SessionTask<G, R, S>
where
    G: PersistenceGateway,
    R: ReverseGeocoder,
    S: MapSurface + Send + 'static,
{
    async fn run(
        mut self,
        mut shutdown: oneshot::Receiver<()>,
        mut commands: mpsc::UnboundedReceiver<SessionCommand>,
        mut lookups: mpsc::UnboundedReceiver<LookupDone>,
    ) {
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => break,
                event = next_event(&mut self.subscription) => match event {
                    Some(FeedEvent::Frame(frame)) => match self.normalizer.apply(frame) {
                        Ok(records) => self.on_snapshot(&records),
                        Err(err) => self.resubscribe(&err.to_string()),
                    },
                    Some(FeedEvent::Error(err)) => {
                        warn!(%err, "feed error; keeping last snapshot");
                        self.notify(SessionNotice::FeedError(err.to_string()));
                    }
                    None => {
                        warn!("feed ended; keeping last snapshot");
                        self.subscription = None;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.on_command(command),
                    None => break,
                },
                Some(done) = lookups.recv() => self.on_lookup(done),
                Some(res) = self.writes.join_next(), if !self.writes.is_empty() => {
                    if let Err(err) = res {
                        log_join_error("write", &err);
                    }
                }
            }
        }
        while let Ok(command) = commands.try_recv() {
            self.on_command(command);
        }
        let mut writes = std::mem::take(&mut self.writes);
        self.teardown();
        while let Some(res) = writes.join_next().await {
            if let Err(err) = res {
                log_join_error("write", &err);
            }
        }
    }

    fn notify(&self, notice: SessionNotice) {
        // the owner may have stopped listening; the session carries on
        let _ = self.notices.send(notice);
    }

    fn on_snapshot(&mut self, records: &[GeofenceRecord]) {
        let report = self.reconciler.reconcile(&mut self.surface, records);
        if self.dispatcher.retain_live(&self.reconciler) {
            debug!("open popup's record left the snapshot; bindings dropped");
        }
        self.notify(SessionNotice::Reconciled(report));
    }

    fn resubscribe(&mut self, reason: &str) {
        warn!(reason, "feed desync; resubscribing");
        self.notify(SessionNotice::FeedError(reason.to_string()));
        self.subscription = None;
        self.normalizer.reset();
        match self.gateway.subscribe() {
            Ok(subscription) => self.subscription = Some(subscription),
            Err(err) => error!(?err, "resubscribe failed; keeping last snapshot"),
        }
    }

    fn on_command(&mut self, command: SessionCommand) {
        match command {
            SessionCommand::MapClick(at) => self.on_map_click(at),
            SessionCommand::PopupOpened(overlay) => {
                self.dispatcher.attach(overlay, &self.reconciler);
            }
            SessionCommand::OpenPopup(id) => {
                let Some(circle) = self.reconciler.entry(&id).map(|entry| entry.circle) else {
                    warn!(record = %id, "no overlay for record");
                    return;
                };
                match self.surface.open_popup(circle) {
                    Ok(()) => {
                        self.dispatcher.attach(circle, &self.reconciler);
                    }
                    Err(err) => warn!(?err, record = %id, "could not open popup"),
                }
            }
            SessionCommand::PopupClosed => {
                self.dispatcher.detach();
            }
            SessionCommand::ControlClicked(control) => {
                match self.dispatcher.click(&control, &self.reconciler) {
                    Some(Dispatch::Edit(record)) => {
                        self.notify(SessionNotice::EditRequested(record));
                    }
                    Some(Dispatch::Delete(id)) => self.issue_delete(id),
                    None => debug!(%control, "click on unbound control ignored"),
                }
            }
            SessionCommand::SetDeployment(text) => self.create.set_deployment(text),
            SessionCommand::SetRadius(raw) => {
                if let Err(err) = self.create.set_radius(&mut self.surface, &raw) {
                    warn!(?err, "could not resize candidate");
                }
            }
            SessionCommand::SaveCandidate => match self.create.save(&mut self.surface) {
                Ok(doc) => {
                    self.abort_lookup();
                    self.issue_create(doc);
                }
                Err(err) => {
                    debug!(%err, "save rejected");
                    self.notify(SessionNotice::Alert(CREATE_ALERT.to_string()));
                }
            },
            SessionCommand::CancelCandidate => {
                self.abort_lookup();
                self.create.cancel(&mut self.surface);
            }
            SessionCommand::SubmitEdit(form) => match form.submit() {
                Ok((id, patch)) => self.issue_update(id, patch),
                Err(err) => {
                    debug!(%err, "edit rejected");
                    self.notify(SessionNotice::Alert(EDIT_ALERT.to_string()));
                }
            },
        }
    }

    fn on_map_click(&mut self, at: LatLng) {
        // a map click closes whatever popup was open
        self.surface.close_popup();
        self.dispatcher.detach();
        let ticket = match self.create.click(&mut self.surface, at) {
            Ok(ticket) => ticket,
            Err(err) => {
                warn!(?err, lat = at.lat, lon = at.lng, "could not place candidate");
                return;
            }
        };
        self.abort_lookup();
        let geocoder = Arc::clone(&self.geocoder);
        let tx = self.lookups_tx.clone();
        self.lookup = Some(tokio::spawn(async move {
            let outcome = geocoder.resolve(ticket.at).await;
            let _ = tx.send(LookupDone {
                token: ticket.token,
                outcome,
            });
        }));
    }

    fn on_lookup(&mut self, done: LookupDone) {
        let Some(resolved) = self
            .create
            .resolve(&mut self.surface, done.token, done.outcome)
        else {
            return;
        };
        self.lookup = None;
        if resolved.address.is_some() {
            // the candidate popup replaced any record popup
            self.dispatcher.detach();
        }
        self.notify(SessionNotice::CandidateResolved {
            location: resolved.location,
            address: resolved.address,
        });
    }

    fn abort_lookup(&mut self) {
        if let Some(task) = self.lookup.take() {
            task.abort();
        }
    }

    fn issue_create(&mut self, doc: NewGeofence) {
        let gateway = Arc::clone(&self.gateway);
        let payload = doc.clone();
        self.writes.spawn(async move {
            match gateway.create(payload).await {
                Ok(id) => info!(record = %id, "geofence created"),
                Err(err) => error!(?err, "geofence create failed"),
            }
        });
        self.notify(SessionNotice::CreateIssued(doc));
    }

    fn issue_update(&mut self, id: RecordId, patch: GeofencePatch) {
        let gateway = Arc::clone(&self.gateway);
        let (target, payload) = (id.clone(), patch.clone());
        self.writes.spawn(async move {
            match gateway.update(&target, payload).await {
                Ok(()) => info!(record = %target, "geofence updated"),
                Err(err) => error!(?err, record = %target, "geofence update failed"),
            }
        });
        self.notify(SessionNotice::UpdateIssued(id, patch));
    }

    fn issue_delete(&mut self, id: RecordId) {
        let gateway = Arc::clone(&self.gateway);
        let target = id.clone();
        self.writes.spawn(async move {
            match gateway.delete_by_id(&target).await {
                Ok(()) => info!(record = %target, "geofence deleted"),
                Err(err) => error!(?err, record = %target, "geofence delete failed"),
            }
        });
        self.notify(SessionNotice::DeleteIssued(id));
    }

    fn teardown(mut self) {
        self.subscription = None;
        self.abort_lookup();
        self.dispatcher.detach();
        let candidate = self.create.discard(&mut self.surface);
        let records = self.reconciler.clear(&mut self.surface);
        self.surface.dispose();
        info!(candidate, records, "geofence session stopped");
    }
}
