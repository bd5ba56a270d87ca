// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Stdin line commands.

use anyhow::{anyhow, bail, Context, Result};
use geofence_map_port::LatLng;
use geofence_model::RecordId;
use geofence_sync::popup::{delete_control_id, edit_control_id};
use geofence_sync::{EditForm, SessionCommand};

/// Usage text logged on `help` or a bad line.
pub(crate) const USAGE: &str = "click LAT LON | deployment TEXT | radius N | save | cancel | \
open ID | close | edit ID | delete ID | update ID DEPLOYMENT RADIUS | quit";

/// One parsed line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Input {
    /// Commands to forward, in order.
    Commands(Vec<SessionCommand>),
    /// Print usage.
    Help,
    /// Stop the session.
    Quit,
}

fn coordinate(raw: Option<&str>, name: &str) -> Result<f64> {
    let raw = raw.ok_or_else(|| anyhow!("missing {name}"))?;
    raw.parse::<f64>()
        .with_context(|| format!("{name} is not a number: {raw:?}"))
}

fn record_id(raw: Option<&str>) -> Result<RecordId> {
    raw.map(RecordId::from)
        .ok_or_else(|| anyhow!("missing record id"))
}

/// Parse one line; blank lines yield `None`.
pub(crate) fn parse_line(line: &str) -> Result<Option<Input>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (verb, rest) = line
        .split_once(char::is_whitespace)
        .map_or((line, ""), |(v, r)| (v, r.trim()));
    let mut args = rest.split_whitespace();
    let commands = match verb {
        "click" => {
            let lat = coordinate(args.next(), "latitude")?;
            let lon = coordinate(args.next(), "longitude")?;
            vec![SessionCommand::MapClick(LatLng::new(lat, lon))]
        }
        "deployment" => vec![SessionCommand::SetDeployment(rest.to_string())],
        "radius" => vec![SessionCommand::SetRadius(rest.to_string())],
        "save" => vec![SessionCommand::SaveCandidate],
        "cancel" => vec![SessionCommand::CancelCandidate],
        "open" => vec![SessionCommand::OpenPopup(record_id(args.next())?)],
        "close" => vec![SessionCommand::PopupClosed],
        "edit" | "delete" => {
            let id = record_id(args.next())?;
            let control = if verb == "edit" {
                edit_control_id(&id)
            } else {
                delete_control_id(&id)
            };
            vec![
                SessionCommand::OpenPopup(id),
                SessionCommand::ControlClicked(control),
            ]
        }
        "update" => {
            let (head, radius) = rest
                .rsplit_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: update ID DEPLOYMENT RADIUS"))?;
            let (id, deployment) = head
                .trim()
                .split_once(char::is_whitespace)
                .ok_or_else(|| anyhow!("usage: update ID DEPLOYMENT RADIUS"))?;
            vec![SessionCommand::SubmitEdit(EditForm::new(
                RecordId::from(id),
                deployment.trim(),
                radius,
            ))]
        }
        "help" => return Ok(Some(Input::Help)),
        "quit" | "exit" => return Ok(Some(Input::Quit)),
        other => bail!("unknown command {other:?}"),
    };
    Ok(Some(Input::Commands(commands)))
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use geofence_map_port::ControlId;

    fn commands(line: &str) -> Vec<SessionCommand> {
        match parse_line(line).unwrap() {
            Some(Input::Commands(cmds)) => cmds,
            other => panic!("unexpected parse: {other:?}"),
        }
    }

    #[test]
    fn blank_lines_are_ignored() {
        assert_eq!(parse_line("   ").unwrap(), None);
    }

    #[test]
    fn click_takes_two_coordinates() {
        assert_eq!(
            commands("click 8.48 124.65"),
            [SessionCommand::MapClick(LatLng::new(8.48, 124.65))]
        );
        assert!(parse_line("click 8.48").is_err());
        assert!(parse_line("click north 124.65").is_err());
    }

    #[test]
    fn deployment_keeps_inner_spaces() {
        assert_eq!(
            commands("deployment  Gate 3 North "),
            [SessionCommand::SetDeployment("Gate 3 North".into())]
        );
    }

    #[test]
    fn delete_opens_then_clicks() {
        assert_eq!(
            commands("delete g1"),
            [
                SessionCommand::OpenPopup(RecordId::new("g1")),
                SessionCommand::ControlClicked(ControlId::new("deleteBtn_g1")),
            ]
        );
    }

    #[test]
    fn update_splits_id_deployment_and_radius() {
        assert_eq!(
            commands("update g1 Gate 3 North 40"),
            [SessionCommand::SubmitEdit(EditForm::new(
                RecordId::new("g1"),
                "Gate 3 North",
                "40"
            ))]
        );
        assert!(parse_line("update g1").is_err());
    }

    #[test]
    fn quit_and_unknown() {
        assert_eq!(parse_line("quit").unwrap(), Some(Input::Quit));
        assert!(parse_line("launch").is_err());
    }
}
