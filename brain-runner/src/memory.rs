//! Available-memory probe.
//!
//! "Available" means reclaimable memory (inactive/purgeable pages, kernel
//! MemAvailable), not merely free pages. A provider trait keeps the
//! scheduler testable without touching the host.

#[cfg(target_os = "macos")]
use std::process::Command;

/// Source of the available-memory fraction. `None` means the probe cannot
/// measure on this host; the guard is then skipped.
pub trait MemoryProvider: Send + Sync {
    fn available_fraction(&self) -> Option<f64>;
}

/// Probe backed by the host OS: `/proc/meminfo` on Linux, `vm_stat` +
/// `sysctl hw.memsize` on macOS.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemMemory;

impl MemoryProvider for SystemMemory {
    fn available_fraction(&self) -> Option<f64> {
        #[cfg(target_os = "linux")]
        {
            let content = std::fs::read_to_string("/proc/meminfo").ok()?;
            parse_meminfo(&content)
        }
        #[cfg(target_os = "macos")]
        {
            let total = sysctl_memsize()?;
            let output = Command::new("vm_stat").output().ok()?;
            let text = String::from_utf8_lossy(&output.stdout).to_string();
            parse_vm_stat(&text, total)
        }
        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            None
        }
    }
}

#[cfg(target_os = "macos")]
fn sysctl_memsize() -> Option<u64> {
    let output = Command::new("sysctl").args(["-n", "hw.memsize"]).output().ok()?;
    String::from_utf8_lossy(&output.stdout).trim().parse().ok()
}

/// Parse `/proc/meminfo`. Prefers `MemAvailable`, falls back to
/// `MemFree + Buffers + Cached`. Values are in kB.
pub fn parse_meminfo(content: &str) -> Option<f64> {
    fn field(content: &str, name: &str) -> Option<u64> {
        content.lines().find_map(|line| {
            let rest = line.strip_prefix(name)?.strip_prefix(':')?;
            rest.split_whitespace().next()?.parse().ok()
        })
    }

    let total = field(content, "MemTotal")?;
    if total == 0 {
        return None;
    }
    let available = field(content, "MemAvailable").or_else(|| {
        let free = field(content, "MemFree")?;
        let buffers = field(content, "Buffers").unwrap_or(0);
        let cached = field(content, "Cached").unwrap_or(0);
        Some(free + buffers + cached)
    })?;
    Some((available as f64 / total as f64).clamp(0.0, 1.0))
}

/// Parse `vm_stat` output. Reclaimable = free + inactive + purgeable +
/// speculative pages, scaled by the reported page size.
pub fn parse_vm_stat(content: &str, total_bytes: u64) -> Option<f64> {
    if total_bytes == 0 {
        return None;
    }

    let page_size: u64 = content
        .lines()
        .next()
        .and_then(|line| {
            let idx = line.find("page size of ")?;
            line[idx + "page size of ".len()..]
                .split_whitespace()
                .next()?
                .parse()
                .ok()
        })
        .unwrap_or(4096);

    fn pages(content: &str, name: &str) -> u64 {
        content
            .lines()
            .find_map(|line| {
                let rest = line.trim().strip_prefix(name)?.trim_start_matches(':').trim();
                rest.trim_end_matches('.').parse::<u64>().ok()
            })
            .unwrap_or(0)
    }

    let reclaimable = pages(content, "Pages free")
        + pages(content, "Pages inactive")
        + pages(content, "Pages purgeable")
        + pages(content, "Pages speculative");
    Some(((reclaimable * page_size) as f64 / total_bytes as f64).clamp(0.0, 1.0))
}

/// Fixed-value provider for tests.
#[cfg(test)]
#[derive(Debug, Clone, Copy)]
pub struct FixedMemory(pub Option<f64>);

#[cfg(test)]
impl MemoryProvider for FixedMemory {
    fn available_fraction(&self) -> Option<f64> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMINFO: &str = "MemTotal:       16384000 kB\nMemFree:         2048000 kB\nMemAvailable:    8192000 kB\nBuffers:          512000 kB\nCached:          3072000 kB\n";

    #[test]
    fn test_meminfo_prefers_memavailable() {
        let frac = parse_meminfo(MEMINFO).unwrap();
        assert!((frac - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_meminfo_falls_back_to_free_buffers_cached() {
        let content = "MemTotal:       16384000 kB\nMemFree:         2048000 kB\nBuffers:          512000 kB\nCached:          1536000 kB\n";
        let frac = parse_meminfo(content).unwrap();
        assert!((frac - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_meminfo_missing_total() {
        assert!(parse_meminfo("MemFree: 100 kB\n").is_none());
    }

    #[test]
    fn test_vm_stat_counts_reclaimable_pages() {
        let content = "Mach Virtual Memory Statistics: (page size of 16384 bytes)\nPages free:                              100000.\nPages active:                            300000.\nPages inactive:                          150000.\nPages speculative:                        30000.\nPages purgeable:                          20000.\n";
        // (100000 + 150000 + 20000 + 30000) * 16384 bytes reclaimable.
        let total = 1_000_000u64 * 16384;
        let frac = parse_vm_stat(content, total).unwrap();
        assert!((frac - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_vm_stat_zero_total() {
        assert!(parse_vm_stat("page size of 4096 bytes", 0).is_none());
    }
}
