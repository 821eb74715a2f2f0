// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IPP printer-attribute vocabulary mapped onto `PrinterStatus`.
//
// Both the `ipptool` strategy and the in-process IPP client end up with the
// same name -> values map, so the interpretation lives here once.

use std::collections::HashMap;

use printgate_core::types::{PrinterState, PrinterStatus, ProbeSource, SupplyLevel};

use super::ProbeUnavailable;

/// Flattened Get-Printer-Attributes response. Multi-valued attributes keep
/// one entry per value.
pub type AttributeMap = HashMap<String, Vec<String>>;

/// Map `printer-state` (enum or keyword form).
pub fn parse_printer_state(value: &str) -> Option<PrinterState> {
    match value.trim().to_ascii_lowercase().as_str() {
        "3" | "idle" => Some(PrinterState::Idle),
        "4" | "processing" => Some(PrinterState::Processing),
        "5" | "stopped" => Some(PrinterState::Stopped),
        _ => None,
    }
}

/// Turn a `printer-state-reasons` keyword into text a person can act on.
///
/// `none` yields nothing. Severity suffixes are dropped before lookup.
pub fn humanize_reason(keyword: &str) -> Option<String> {
    let keyword = keyword.trim().to_ascii_lowercase();
    let base = ["-report", "-warning", "-error"]
        .iter()
        .find_map(|suffix| keyword.strip_suffix(suffix))
        .unwrap_or(keyword.as_str());

    let text = match base {
        "" | "none" => return None,
        "media-empty" | "media-needed" => "Out of paper",
        "media-low" => "Paper is running low",
        "media-jam" => "Paper jam",
        "toner-empty" => "Toner is empty",
        "toner-low" => "Toner is low",
        "marker-supply-empty" => "Ink or toner is empty",
        "marker-supply-low" => "Ink or toner is low",
        "marker-waste-full" => "Waste ink container is full",
        "door-open" | "cover-open" | "interlock-open" => "A door or cover is open",
        "input-tray-missing" => "Paper tray is missing",
        "output-area-full" | "output-tray-full" => "Output tray is full",
        "offline" => "Printer is offline",
        "paused" => "Printer is paused",
        "shutdown" => "Printer is shutting down",
        "spool-area-full" => "Print spool is full",
        "connecting-to-device" => "Connecting to the printer",
        "timed-out" => "Printer stopped responding",
        "moving-to-paused" => "Printer is pausing",
        "cups-missing-filter" => "No filter available for this document type",
        other => return Some(capitalize(&other.replace('-', " "))),
    };
    Some(text.to_string())
}

/// Build a status from a flattened attribute map.
///
/// `printer-state` is required; everything else is optional.
pub fn status_from_attributes(
    printer: &str,
    attrs: &AttributeMap,
    source: ProbeSource,
) -> Result<PrinterStatus, ProbeUnavailable> {
    let raw_state = first(attrs, "printer-state").ok_or_else(|| {
        ProbeUnavailable::Unparseable("response has no printer-state attribute".into())
    })?;
    let state = parse_printer_state(raw_state).ok_or_else(|| {
        ProbeUnavailable::Unparseable(format!("unrecognised printer-state '{raw_state}'"))
    })?;

    let mut status = PrinterStatus::new(Some(printer.to_string()), state, source);
    status.message = first(attrs, "printer-state-message")
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);

    for keyword in attrs.get("printer-state-reasons").into_iter().flatten() {
        if let Some(text) = humanize_reason(keyword)
            && !status.reasons.contains(&text)
        {
            status.reasons.push(text);
        }
    }

    status.supplies = supplies(attrs);
    Ok(status)
}

/// Zip `marker-names`, `marker-levels` and `marker-colors` by position.
/// Negative levels mean the printer cannot tell.
fn supplies(attrs: &AttributeMap) -> Vec<SupplyLevel> {
    let Some(names) = attrs.get("marker-names") else {
        return Vec::new();
    };
    // Misaligned arrays cannot be paired with names safely.
    let aligned = |key: &str| attrs.get(key).filter(|values| values.len() == names.len());
    let levels = aligned("marker-levels");
    let colors = aligned("marker-colors");

    names
        .iter()
        .enumerate()
        .map(|(i, name)| SupplyLevel {
            name: name.trim().to_string(),
            level: levels
                .and_then(|l| l.get(i))
                .and_then(|raw| raw.trim().parse::<i32>().ok())
                .filter(|level| *level >= 0)
                .map(|level| level.min(100) as u8),
            color: colors
                .and_then(|c| c.get(i))
                .map(|c| c.trim())
                .filter(|c| !c.is_empty() && *c != "none")
                .map(str::to_string),
        })
        .collect()
}

fn first<'a>(attrs: &'a AttributeMap, name: &str) -> Option<&'a str> {
    attrs.get(name).and_then(|v| v.first()).map(String::as_str)
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
