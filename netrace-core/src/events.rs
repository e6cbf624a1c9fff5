use std::collections::HashMap;

use netrace_schemas::trace_models::{EventKind, TraceEvent};

/// Derive the ordered HTTP event timeline from the analysis tool's field extraction output. The
/// input is header led, comma separated, double quoted text - the csv reader handles the quoting.
/// Rows that are neither a request nor a response boundary are dropped, as are rows too malformed
/// to yield a timestamp. An empty extraction simply yields an empty list.
pub fn derive_events(extract: &str) -> Vec<TraceEvent> {
    if extract.trim().is_empty() {
        return Vec::new();
    }
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(extract.trim().as_bytes());

    // build a field name to column index map from the header so the tool's column order is not
    // load bearing
    let columns: HashMap<String, usize> = match reader.headers() {
        Ok(headers) => headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.trim_matches('"').to_string(), i))
            .collect(),
        Err(err) => {
            tracing::warn!("could not parse field extraction header: {err:#}");
            return Vec::new();
        }
    };
    let cell = |record: &csv::StringRecord, name: &str| -> String {
        columns
            .get(name)
            .and_then(|&i| record.get(i))
            .unwrap_or("")
            .trim_matches('"')
            .to_string()
    };

    let mut events = Vec::new();
    for row in reader.records() {
        let record = match row {
            Ok(ok) => ok,
            Err(err) => {
                // one bad row must not abort the whole derivation
                tracing::debug!("skipping malformed field extraction row: {err:#}");
                continue;
            }
        };
        let timestamp = match cell(&record, "frame.time_epoch").parse::<f64>() {
            Ok(ok) => ok,
            Err(_) => continue,
        };
        let stream = cell(&record, "tcp.stream");
        let method = cell(&record, "http.request.method");
        let uri = cell(&record, "http.request.uri");
        let status_code = cell(&record, "http.response.code");
        // a non empty method marks a request boundary, otherwise a non empty status code marks a
        // response - packets that are neither are not transaction boundaries
        if !method.is_empty() {
            events.push(TraceEvent::request(timestamp, stream, method, uri));
        } else if !status_code.is_empty() {
            events.push(TraceEvent::response(timestamp, stream, status_code));
        }
    }

    // tool output ordering is not guaranteed to be chronological across merged fields
    events.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
    attach_round_trip_times(&mut events);
    events
}

/// Compute per stream round trip times. The first request timestamp seen on a stream is recorded
/// and never cleared, so every later response on that stream measures against the first request.
/// This matches the reference behaviour for multi transaction streams, see DESIGN.md.
fn attach_round_trip_times(events: &mut [TraceEvent]) {
    let mut first_request: HashMap<String, f64> = HashMap::new();
    for event in events.iter_mut() {
        match event.kind {
            EventKind::HttpRequest => {
                if !first_request.contains_key(&event.stream) {
                    first_request.insert(event.stream.clone(), event.timestamp);
                }
            }
            EventKind::HttpResponse => {
                if let Some(request_ts) = first_request.get(&event.stream) {
                    event.rtt_ms = Some(((event.timestamp - request_ts) * 1000.0).round() as i64);
                }
            }
        }
    }
}
