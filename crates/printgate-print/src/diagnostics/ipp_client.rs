// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Probe strategy 2: in-process Get-Printer-Attributes (RFC 8011 §4.2.5)
// against the local CUPS server using the `ipp` crate.

use async_trait::async_trait;
use ipp::prelude::*;
use printgate_core::types::{PrinterProfile, PrinterStatus, ProbeSource};
use tracing::{debug, instrument};

use super::attributes::{AttributeMap, status_from_attributes};
use super::{ProbeStrategy, ProbeUnavailable};

/// Printer URIs on the local scheduler.
pub const LOCAL_CUPS_BASE: &str = "ipp://localhost:631/printers";

pub struct IppClientStrategy {
    base_uri: String,
}

impl IppClientStrategy {
    pub fn new(base_uri: impl Into<String>) -> Self {
        Self {
            base_uri: base_uri.into(),
        }
    }

    pub fn printer_uri(&self, printer: &PrinterProfile) -> Result<Uri, ProbeUnavailable> {
        let raw = format!("{}/{}", self.base_uri.trim_end_matches('/'), printer.name);
        raw.parse()
            .map_err(|e| ProbeUnavailable::Failed(format!("invalid printer URI '{raw}': {e}")))
    }
}

impl Default for IppClientStrategy {
    fn default() -> Self {
        Self::new(LOCAL_CUPS_BASE)
    }
}

/// String forms of an attribute value; arrays contribute one entry each.
pub fn value_strings(value: &IppValue) -> Vec<String> {
    match value {
        IppValue::Array(items) => items.iter().flat_map(value_strings).collect(),
        other => vec![other.to_string()],
    }
}

/// Flatten every attribute group of a response into one map.
pub fn flatten_attributes(attrs: &IppAttributes) -> AttributeMap {
    let mut map = AttributeMap::new();
    for group in attrs.groups() {
        for (name, attr) in group.attributes() {
            map.insert(name.clone(), value_strings(attr.value()));
        }
    }
    map
}

#[async_trait]
impl ProbeStrategy for IppClientStrategy {
    fn source(&self) -> ProbeSource {
        ProbeSource::IppClient
    }

    #[instrument(skip(self), fields(printer = %printer.name))]
    async fn probe(&self, printer: &PrinterProfile) -> Result<PrinterStatus, ProbeUnavailable> {
        let uri = self.printer_uri(printer)?;
        let operation = IppOperationBuilder::get_printer_attributes(uri.clone()).build();
        let client = AsyncIppClient::new(uri);

        debug!("sending Get-Printer-Attributes");
        let response = client
            .send(operation)
            .await
            .map_err(|e| ProbeUnavailable::Failed(format!("Get-Printer-Attributes: {e}")))?;

        let code = response.header().status_code();
        if !code.is_success() {
            return Err(ProbeUnavailable::Failed(format!(
                "Get-Printer-Attributes returned status {code:?}"
            )));
        }

        let attrs = flatten_attributes(response.attributes());
        debug!(count = attrs.len(), "received printer attributes");
        status_from_attributes(&printer.name, &attrs, ProbeSource::IppClient)
    }
}

#[cfg(test)]
mod tests {
    use printgate_core::types::PrinterState;

    use super::*;

    #[test]
    fn uri_is_built_under_local_scheduler() {
        let uri = IppClientStrategy::default()
            .printer_uri(&PrinterProfile::new("Office_Printer"))
            .unwrap();
        assert_eq!(uri.to_string(), "ipp://localhost:631/printers/Office_Printer");
    }

    #[test]
    fn unparseable_printer_name_is_a_failure() {
        let err = IppClientStrategy::default()
            .printer_uri(&PrinterProfile::new("bad name with spaces"))
            .unwrap_err();
        assert!(matches!(err, ProbeUnavailable::Failed(_)));
    }

    #[test]
    fn arrays_flatten_to_one_entry_per_value() {
        let value = IppValue::Array(vec![
            IppValue::Keyword("media-empty-error".into()),
            IppValue::Keyword("offline-report".into()),
        ]);
        assert_eq!(value_strings(&value), ["media-empty-error", "offline-report"]);
        assert_eq!(value_strings(&IppValue::Integer(42)), ["42"]);
    }

    #[test]
    fn response_attributes_map_to_status() {
        let mut attrs = IppAttributes::new();
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new("printer-state", IppValue::Enum(4)),
        );
        attrs.add(
            DelimiterTag::PrinterAttributes,
            IppAttribute::new(
                "printer-state-reasons",
                IppValue::Array(vec![IppValue::Keyword("toner-low-report".into())]),
            ),
        );
        let map = flatten_attributes(&attrs);
        let status = status_from_attributes("Office", &map, ProbeSource::IppClient).unwrap();
        assert_eq!(status.state, PrinterState::Processing);
        assert_eq!(status.reasons, ["Toner is low"]);
    }

    #[tokio::test]
    async fn unreachable_scheduler_is_a_failure() {
        let strategy = IppClientStrategy::new("ipp://127.0.0.1:1/printers");
        let err = strategy
            .probe(&PrinterProfile::new("Office_Printer"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeUnavailable::Failed(_)));
    }
}
