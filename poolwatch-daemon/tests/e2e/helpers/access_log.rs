//! Access log line factories.

use std::io::Write;
use std::path::Path;

/// A well-formed access log line for `pool` answering with `status`.
pub fn line(pool: &str, status: u16) -> String {
    format!(
        "pool={pool} release={pool}-v2.3.1 status={status} upstream_status={status} \
         upstream=172.18.0.3:3000 request_time=0.004 upstream_response_time=0.003 \
         method=GET uri=/version time=2025-10-30T12:00:00+00:00"
    )
}

/// Lines for `pool` with each of `statuses`.
pub fn lines(pool: &str, statuses: &[u16]) -> Vec<String> {
    statuses.iter().map(|s| line(pool, *s)).collect()
}

/// Append lines to the file, creating it if needed.
pub fn append(path: &Path, lines: &[String]) {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .expect("open access log");
    for line in lines {
        file.write_all(line.as_bytes()).expect("write line");
        file.write_all(b"\n").expect("write newline");
    }
    file.flush().expect("flush access log");
}
