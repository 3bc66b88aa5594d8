//! Parsing of the human-formatted fields `docker stats` prints.

/// One resource sample for a container, numbers already normalised.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatsSample {
    pub cpu_percent: f64,
    pub memory_usage: u64,
    pub memory_limit: u64,
    pub memory_percent: f64,
    pub block_read: u64,
    pub block_write: u64,
    pub net_rx: u64,
    pub net_tx: u64,
}

impl StatsSample {
    /// Build a sample from the raw `CPUPerc`, `MemPerc`, `MemUsage`, `BlockIO`
    /// and `NetIO` strings. Unparseable fields read as zero.
    #[must_use]
    pub fn from_fields(cpu: &str, mem_perc: &str, mem_usage: &str, block_io: &str, net_io: &str) -> Self {
        let (memory_usage, memory_limit) = parse_pair(mem_usage);
        let (block_read, block_write) = parse_pair(block_io);
        let (net_rx, net_tx) = parse_pair(net_io);
        Self {
            cpu_percent: parse_percent(cpu).unwrap_or(0.0),
            memory_usage,
            memory_limit,
            memory_percent: parse_percent(mem_perc).unwrap_or(0.0),
            block_read,
            block_write,
            net_rx,
            net_tx,
        }
    }
}

/// `"12.5%"` -> `12.5`. `"--"` (container not running) is `None`.
#[must_use]
pub fn parse_percent(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').trim().parse().ok()
}

/// Parse a docker size such as `1.5MiB`, `20kB` or `0B` into bytes.
#[must_use]
pub fn parse_size(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(raw.len());
    let (number, unit) = raw.split_at(split);
    let value: f64 = number.parse().ok()?;
    let multiplier: f64 = match unit.trim() {
        "" | "B" => 1.0,
        "kB" | "KB" => 1e3,
        "MB" => 1e6,
        "GB" => 1e9,
        "TB" => 1e12,
        "KiB" => 1024.0,
        "MiB" => 1024.0 * 1024.0,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((value * multiplier).round() as u64)
}

/// `"1.5MiB / 7.7GiB"` -> `(used, total)`; missing halves read as zero.
#[must_use]
pub fn parse_pair(raw: &str) -> (u64, u64) {
    let mut halves = raw.split('/');
    let left = halves.next().and_then(parse_size).unwrap_or(0);
    let right = halves.next().and_then(parse_size).unwrap_or(0);
    (left, right)
}
