// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless geofence console.
//! Runs a live overlay session against a JSON-file store; the "map" is the
//! log and the mouse is stdin.

mod input;
mod settings;
mod surface;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use geofence_app_core::alert::{AlertKind, AlertQueue};
use geofence_app_core::config::ConfigService;
use geofence_app_core::prefs::ConsolePrefs;
use geofence_config_fs::FsConfigStore;
use geofence_geocode::{GeoapifyResolver, GeocodeError, ReverseGeocoder, NO_ADDRESS_FOUND};
use geofence_map_port::LatLng;
use geofence_store::JsonFileStore;
use geofence_sync::{GeofenceSyncSession, SessionNotice};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::input::{parse_line, Input, USAGE};
use crate::surface::LogSurface;

const ALERT_TTL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about = "Geofence console: live map overlays over a JSON-file store")]
struct Args {
    /// Config directory (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open a session and drive it with line commands from stdin
    Watch {
        /// Geofence collection file (overrides the saved store path)
        #[arg(long)]
        store: Option<PathBuf>,
    },
    /// Reverse-geocode one point
    #[command(allow_negative_numbers = true)]
    Resolve {
        /// Latitude in degrees
        lat: f64,
        /// Longitude in degrees
        lon: f64,
    },
    /// Log every record in the store file
    List {
        /// Geofence collection file (overrides the saved store path)
        #[arg(long)]
        store: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let store = match &args.config_dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    let prefs = match store {
        Ok(store) => {
            info!(dir = %store.base().display(), "config dir");
            settings::load_prefs(&ConfigService::new(store))
        }
        Err(err) => {
            warn!(?err, "config dir unavailable; using defaults");
            ConsolePrefs::default()
        }
    };

    match args.command {
        Command::Watch { store } => watch(&prefs, store).await,
        Command::Resolve { lat, lon } => resolve(&prefs, LatLng::new(lat, lon)).await,
        Command::List { store } => list(&prefs, store).await,
    }
}

fn open_store(prefs: &ConsolePrefs, path: Option<PathBuf>) -> JsonFileStore {
    let path = path.unwrap_or_else(|| PathBuf::from(&prefs.store.path));
    JsonFileStore::new(path, Duration::from_millis(prefs.store.poll_ms))
}

fn resolver(prefs: &ConsolePrefs) -> Result<GeoapifyResolver> {
    let key = settings::api_key(prefs, std::env::var(settings::API_KEY_ENV).ok());
    let key = key.unwrap_or_else(|| {
        warn!(
            env = settings::API_KEY_ENV,
            "no geocoder API key; address lookups will fail"
        );
        String::new()
    });
    GeoapifyResolver::new(settings::geocoder_config(prefs, key)).context("build geocoder client")
}

async fn watch(prefs: &ConsolePrefs, store: Option<PathBuf>) -> Result<()> {
    let gateway = Arc::new(open_store(prefs, store));
    info!(store = %gateway.path().display(), "watching");
    let geocoder = Arc::new(resolver(prefs)?);
    let config = settings::session_config(prefs);

    let Some(mut session) =
        GeofenceSyncSession::start(&config, gateway, geocoder, LogSurface::open)
    else {
        bail!("session did not start (container {:?})", config.container);
    };
    info!("{USAGE}");

    let mut alerts = AlertQueue::new(8);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            res = &mut ctrl_c => {
                if let Err(err) = res {
                    warn!(?err, "ctrl-c handler failed");
                }
                info!("interrupted; stopping session");
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line.context("read stdin")? else {
                    break;
                };
                match parse_line(&line) {
                    Ok(None) => {}
                    Ok(Some(Input::Quit)) => break,
                    Ok(Some(Input::Help)) => info!("{USAGE}"),
                    Ok(Some(Input::Commands(commands))) => {
                        for command in commands {
                            if !session.send(command) {
                                warn!("session has ended");
                            }
                        }
                    }
                    Err(err) => warn!(%err, "{USAGE}"),
                }
            }
            notice = session.next_notice() => {
                let Some(notice) = notice else {
                    warn!("session ended");
                    break;
                };
                report(notice, &mut alerts);
            }
        }
    }

    session.stop().await;
    Ok(())
}

fn report(notice: SessionNotice, alerts: &mut AlertQueue) {
    let now = Instant::now();
    alerts.retain_live(now);
    match notice {
        SessionNotice::Reconciled(r) => info!(
            added = r.added,
            updated = r.updated,
            removed = r.removed,
            failed = r.failed,
            "map in sync"
        ),
        SessionNotice::EditRequested(record) => info!(
            record = %record.id,
            deployment = %record.deployment,
            radius = record.radius_meters,
            "edit requested; submit with `update ID DEPLOYMENT RADIUS`"
        ),
        SessionNotice::CandidateResolved { location, address } => info!(
            lat = location.lat,
            lon = location.lng,
            address = address.as_deref().unwrap_or("<unresolved>"),
            "candidate placed"
        ),
        SessionNotice::CreateIssued(doc) => info!(
            deployment = %doc.deployment,
            address = %doc.address,
            radius = doc.radius_meters,
            "create issued"
        ),
        SessionNotice::UpdateIssued(id, _) => info!(record = %id, "update issued"),
        SessionNotice::DeleteIssued(id) => info!(record = %id, "delete issued"),
        SessionNotice::Alert(message) => {
            let id = alerts.raise(AlertKind::Validation, message.as_str(), ALERT_TTL, now);
            warn!(alert = id, live = alerts.live(now).len(), "{message}");
        }
        SessionNotice::FeedError(message) => {
            alerts.raise(AlertKind::Feed, message.as_str(), ALERT_TTL, now);
            warn!(%message, "feed trouble; showing last good snapshot");
        }
    }
}

async fn resolve(prefs: &ConsolePrefs, at: LatLng) -> Result<()> {
    let geocoder = resolver(prefs)?;
    match geocoder.resolve(at).await {
        Ok(address) => info!(lat = at.lat, lon = at.lng, %address, "resolved"),
        Err(GeocodeError::NotFound) => info!(lat = at.lat, lon = at.lng, "{NO_ADDRESS_FOUND}"),
        Err(err) => return Err(err).context("reverse geocode"),
    }
    Ok(())
}

async fn list(prefs: &ConsolePrefs, store: Option<PathBuf>) -> Result<()> {
    let store = open_store(prefs, store);
    let records = store
        .load()
        .await
        .with_context(|| format!("read {}", store.path().display()))?;
    for record in &records {
        info!(
            record = %record.id,
            deployment = %record.deployment,
            address = %record.address,
            radius = record.radius_meters,
            lat = record.location.latitude,
            lon = record.location.longitude,
            "geofence"
        );
    }
    info!(count = records.len(), "listed");
    Ok(())
}
