// mission-push/src/import.rs
// Loads missions (JSON or planner XML) and parameter lists from disk.

use anyhow::{anyhow, bail, Context, Result};
use log::info;
use mission_schema::{Mission, VehicleParameter, Waypoint};
use std::path::Path;

// ---------------------------------------------------------------------------
// Missions
// ---------------------------------------------------------------------------

/// `.json` files hold a serialized `Mission`; anything else is read as
/// planner XML.
pub fn load_mission(path: &Path) -> Result<Mission> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read mission file {}", path.display()))?;

    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    let mission = if is_json {
        serde_json::from_str(&content)
            .with_context(|| format!("Invalid mission JSON in {}", path.display()))?
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        parse_mission_xml(&name, &content)
            .with_context(|| format!("Invalid mission XML in {}", path.display()))?
    };

    info!(
        "Loaded mission '{}': {} waypoints, {} geofence points, {} rally points",
        mission.name,
        mission.waypoints.len(),
        mission.geofence_points.len(),
        mission.rally_points.len()
    );
    Ok(mission)
}

/// Every `<waypoint>` element, in document order, with `<lat>`, `<lon>`,
/// `<alt>` and an optional `<command>` child.
pub fn parse_mission_xml(name: &str, content: &str) -> Result<Mission> {
    use quick_xml::{events::Event, Reader};

    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();

    let mut waypoints = Vec::new();
    let mut in_wp = false;
    let mut cur_tag = String::new();
    // Per-waypoint fields
    let mut lat = None;
    let mut lon = None;
    let mut alt = None;
    let mut command = None;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "waypoint" {
                    in_wp = true;
                    lat = None; lon = None; alt = None; command = None;
                } else if in_wp {
                    cur_tag = tag;
                }
            }
            Event::Text(e) => {
                if !in_wp { continue; }
                let text = e.unescape()?.trim().to_string();
                match cur_tag.as_str() {
                    "lat"     => lat = Some(text),
                    "lon"     => lon = Some(text),
                    "alt"     => alt = Some(text),
                    "command" => command = Some(text),
                    _ => {}
                }
            }
            Event::End(e) => {
                let tag = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
                if tag == "waypoint" && in_wp {
                    let index = waypoints.len();
                    waypoints.push(Waypoint {
                        latitude: coordinate(index, "lat", lat.take())?,
                        longitude: coordinate(index, "lon", lon.take())?,
                        altitude: Some(coordinate(index, "alt", alt.take())?),
                        command: command.take().filter(|c| !c.is_empty()),
                        ..Waypoint::default()
                    });
                    in_wp = false;
                }
                cur_tag.clear();
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(Mission {
        name: name.to_string(),
        description: Some("Imported from file".to_string()),
        waypoints,
        ..Mission::default()
    })
}

fn coordinate(index: usize, tag: &str, text: Option<String>) -> Result<f64> {
    let text = text.ok_or_else(|| anyhow!("waypoint {index}: missing <{tag}>"))?;
    text.parse()
        .with_context(|| format!("waypoint {index}: <{tag}> is not a number: '{text}'"))
}

// ---------------------------------------------------------------------------
// Parameters
// ---------------------------------------------------------------------------

/// JSON array of `{ "name": ..., "value": ... }`.
pub fn load_parameters(path: &Path) -> Result<Vec<VehicleParameter>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
    let params: Vec<VehicleParameter> = serde_json::from_str(&content)
        .with_context(|| format!("Invalid parameter JSON in {}", path.display()))?;
    if params.iter().any(|p| p.name.is_empty()) {
        bail!("Parameter file {} contains an entry without a name", path.display());
    }
    info!("Loaded {} parameters", params.len());
    Ok(params)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
