use std::time::Instant;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use victimlib::config::HierarchyConfig;
use victimlib::io::open_trace;
use victimlib::simulator::Simulator;
use victimlib::stats::{LevelCounters, Summary};

#[derive(Parser, Debug)]
#[command(about = String::from("Trace driven cache simulator with an optional victim cache"))]
struct Args {
    /// Cache configuration, JSON when the extension is .json, the line based text format otherwise
    #[arg(short, long)]
    config: String,

    /// Trace of `l <address>` and `s <address>` lines
    #[arg(short, long)]
    trace: String,

    /// Only print the average hit rate
    #[arg(long, conflicts_with = "json")]
    oneline: bool,

    /// Print the statistics as JSON
    #[arg(long)]
    json: bool,

    /// Log every access, and the cache layout
    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long)]
    performance: bool,
}

fn main() -> Result<(), String> {
    let start = Instant::now();
    let args = Args::parse();
    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with_writer(std::io::stderr)
        .init();

    let config = HierarchyConfig::load(&args.config)
        .map_err(|e| format!("Couldn't load the config file at path {}: {e}", args.config))?;
    let trace = open_trace(&args.trace).map_err(|e| format!("Couldn't open the trace file at path {}: {e}", args.trace))?;
    let mut simulator = Simulator::new(&config, args.verbose);
    simulator.simulate(&trace).map_err(|e| format!("Simulation failed: {e}"))?;
    let summary = simulator.summary().map_err(|e| format!("Couldn't compute the statistics: {e}"))?;

    if args.oneline {
        println!("{:.6}", summary.avg_hit_rate);
    } else if args.json {
        println!("{}", serde_json::to_string_pretty(&summary).map_err(|e| format!("Couldn't serialise the output {e}"))?);
    } else {
        print_settings(&config);
        print_report(&summary);
    }

    if args.performance {
        let end = Instant::now();
        let simulation_time = simulator.get_execution_time();
        let total_time = end - start;
        println!("Simulation time: {}s", simulation_time.as_nanos() as f64 / 1e9);
        println!("Total execution time (includes initial parsing, configuration, and output): {}s", total_time.as_nanos() as f64 / 1e9);
        let valid_blocks = simulator.get_valid_block_counts();
        println!("Blocks holding data by cache: {valid_blocks:?}");
    }
    Ok(())
}

fn print_settings(config: &HierarchyConfig) {
    println!("Cache settings:");
    for level in config.levels() {
        let geometry = level.geometry();
        println!("  {}:", level.name());
        println!("    size: {} bytes", geometry.capacity());
        println!("    block size: {} bytes", geometry.block_size());
        println!("    associativity: {}", geometry.associativity());
        println!("    sets: {}", geometry.num_sets());
        println!("    replacement: {}", level.replacement());
        println!("    write policy: {}", level.write());
        println!(
            "    offset / index / tag bits: {} / {} / {}",
            geometry.offset_bits(),
            geometry.index_bits(),
            geometry.tag_bits()
        );
    }
    if let Some(victim) = config.victim() {
        println!("  {}:", victim.cache().name());
        println!("    blocks: {}", victim.blocks());
        println!("    replacement: {}", victim.cache().replacement());
    }
}

fn print_report(summary: &Summary) {
    let counters = &summary.counters;
    println!("Statistics:");
    println!("  accesses: {} ({} idle records skipped)", counters.access, counters.idle);
    println!("  loads: {}, stores: {}", counters.load, counters.store);
    println!("  hits: {} (loads {}, stores {})", counters.hit, counters.load_hit, counters.store_hit);
    for (level, rate) in counters.levels.iter().zip(&summary.level_hit_rates) {
        print_level(level, Some(*rate));
    }
    if let Some(victim) = &counters.victim {
        print_level(victim, None);
    }
    println!("  write backs: {}, write throughs: {}", counters.write_backs, counters.write_throughs);
    println!("Average hit rate: {:.6}", summary.avg_hit_rate);
    println!("Load hit rate: {:.6}", summary.load_hit_rate);
    println!("Store hit rate: {:.6}", summary.store_hit_rate);
    if let Some(amat) = summary.amat {
        println!("AMAT: {amat:.3}");
    }
}

fn print_level(level: &LevelCounters, rate: Option<f64>) {
    let rate = rate.map(|r| format!(", hit rate {r:.6}")).unwrap_or_default();
    println!("  {}: {} hits, {} misses{rate}", level.name, level.hits, level.misses);
}
