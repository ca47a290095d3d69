use std::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;
use crate::config::HierarchyConfig;
use crate::error::{SimError, StatisticsError};
use crate::io::open_trace;
use crate::simulator::Simulator;
use crate::stats::Summary;

const CONFIG: &str = r#"{
    "content": [
        { "cache-size": 1, "block-size": 16, "associativity": "direct-mapped", "hit-latency": 1 }
    ],
    "victim-cache": { "blocks": 2, "replacement-policy": "lru" },
    "memory-latency": 20
}"#;

/// 0x000 and 0x400 share a set of the 1 KiB direct mapped cache
const TRACE: &str = "l 0x000\nl 0x400\n\nl 0x000\ns 0x400\nl 0x000\n";

fn write_temp(contents: &str, suffix: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = tempfile::Builder::new().suffix(suffix).tempfile()?;
    file.write_all(contents.as_bytes())?;
    Ok(file)
}

#[test]
fn replays_a_trace_file() -> Result<(), Box<dyn Error>> {
    let config_file = write_temp(CONFIG, ".json")?;
    let trace_file = write_temp(TRACE, ".trace")?;
    let config = HierarchyConfig::load(config_file.path())?;
    let mut simulator = Simulator::new(&config, false);
    let trace = open_trace(trace_file.path())?;
    let counters = simulator.simulate(&trace)?;

    assert_eq!((counters.access, counters.load, counters.store, counters.idle), (5, 4, 1, 1));
    assert_eq!((counters.hit, counters.load_hit, counters.store_hit), (3, 2, 1));
    assert_eq!((counters.levels[0].hits, counters.levels[0].misses), (0, 5));
    assert_eq!(counters.victim.as_ref().map(|v| (v.hits, v.misses)), Some((3, 2)));
    assert_eq!(counters.write_backs, 0);

    let summary = simulator.summary()?;
    assert_eq!(summary.avg_hit_rate, 0.6);
    assert_eq!(summary.load_hit_rate, 0.5);
    assert_eq!(summary.store_hit_rate, 1.0);
    assert_eq!(summary.level_hit_rates, vec![0.0]);
    // The victim hits count for the first level: 1 + 0.4 * 20
    assert!(summary.amat.is_some_and(|amat| (amat - 9.0).abs() < 1e-9));
    // Every victim hit was a swap, so the victim cache holds a single block
    assert_eq!(simulator.get_valid_block_counts(), vec![1, 1]);
    Ok(())
}

#[test]
fn summary_serialises_to_json() -> Result<(), Box<dyn Error>> {
    let config = HierarchyConfig::from_json_str(CONFIG)?;
    let mut simulator = Simulator::new(&config, false);
    simulator.simulate(TRACE.as_bytes())?;
    let summary = simulator.summary()?;

    let json = serde_json::to_string(&summary)?;
    assert!(json.contains(r#""avg_hit_rate":0.6"#));
    assert!(json.contains(r#""access":5"#));
    let parsed: Summary = serde_json::from_str(&json)?;
    assert_eq!(parsed, summary);
    Ok(())
}

#[test]
fn simulating_twice_accumulates() -> Result<(), Box<dyn Error>> {
    let config = HierarchyConfig::from_json_str(CONFIG)?;
    let mut simulator = Simulator::new(&config, false);
    simulator.simulate(TRACE.as_bytes())?;
    let counters = simulator.simulate(TRACE.as_bytes())?;
    assert_eq!((counters.access, counters.idle), (10, 2));
    Ok(())
}

#[test]
fn empty_trace_has_no_statistics() -> Result<(), Box<dyn Error>> {
    let config = HierarchyConfig::from_json_str(CONFIG)?;
    let trace_file = write_temp("", ".trace")?;
    let mut simulator = Simulator::new(&config, false);
    let trace = open_trace(trace_file.path())?;
    assert!(trace.is_empty());
    simulator.simulate(&trace)?;
    assert_eq!(simulator.summary(), Err(StatisticsError::ZeroCount("accesses")));
    assert!(matches!(open_trace("/nonexistent/trace"), Err(SimError::Io(_))));
    Ok(())
}
