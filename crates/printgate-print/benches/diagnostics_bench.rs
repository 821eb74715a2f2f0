// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the diagnostics parsers: ipptool attribute dumps,
// lpstat status lines and the attribute-to-status mapping.

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use printgate_core::types::ProbeSource;
use printgate_print::diagnostics::attributes::status_from_attributes;
use printgate_print::diagnostics::ipptool::parse_ipptool_output;
use printgate_print::diagnostics::lpstat::parse_lpstat;

const IPPTOOL_DUMP: &str = r#""/usr/share/cups/ipptool/get-printer-attributes.test":
    Get printer attributes using get-printer-attributes                  [PASS]
        RECEIVED: 3104 bytes in response
        status-code = successful-ok (successful-ok)
        attributes-charset (charset) = utf-8
        printer-name (nameWithoutLanguage) = Office_Printer
        printer-state (enum) = processing
        printer-state-message (textWithoutLanguage) = Printing page 2, 1 copy
        printer-state-reasons (1setOf keyword) = toner-low-report,media-low-report
        marker-names (1setOf nameWithoutLanguage) = Black,Cyan,Magenta,Yellow
        marker-levels (1setOf integer) = 12,64,80,-3
        marker-colors (1setOf nameWithoutLanguage) = #000000,#00FFFF,#FF00FF,#FFFF00
"#;

const LPSTAT_DISABLED: &str = "printer Office_Printer disabled since Tue 01 Jan 2026 -\n\tPaper out\n\tCover open\n";

fn bench_ipptool(c: &mut Criterion) {
    c.bench_function("parse_ipptool_output (colour printer)", |b| {
        b.iter(|| black_box(parse_ipptool_output(black_box(IPPTOOL_DUMP))));
    });

    let attrs = parse_ipptool_output(IPPTOOL_DUMP);
    c.bench_function("status_from_attributes (4 markers)", |b| {
        b.iter(|| {
            black_box(status_from_attributes(
                "Office_Printer",
                black_box(&attrs),
                ProbeSource::Ipptool,
            ))
        });
    });
}

fn bench_lpstat(c: &mut Criterion) {
    c.bench_function("parse_lpstat (disabled with reasons)", |b| {
        b.iter(|| black_box(parse_lpstat("Office_Printer", black_box(LPSTAT_DISABLED))));
    });
}

criterion_group!(benches, bench_ipptool, bench_lpstat);
criterion_main!(benches);
