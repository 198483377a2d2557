//! Performance benchmarks for the relay probe
//!
//! These cover the CPU-side work of a run: parsing ping output, loading
//! the relay inventory, ranking results and building the summary, and
//! rendering the report.

use clap::Parser;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use relay_probe::{
    aggregator::{rank, RunSummary},
    cli::Cli,
    config::{parser::ConfigParser, validate_config},
    executor::RunReport,
    inventory::{dedup_targets, parse_target_spec, RelayInventory},
    models::{ProbeResult, ProbeTarget, SpeedResult},
    output::{OutputCoordinator, OutputFormatterFactory},
    probe::{
        calculate_mbps,
        latency::{parse_ping_output, PingStyle},
    },
    types::{RelayProtocol, SortKey},
    ProbeError,
};
use std::time::Duration;

const UNIX_OUTPUT: &str = "PING 10.0.0.1 (10.0.0.1) 56(84) bytes of data.\n\
64 bytes from 10.0.0.1: icmp_seq=1 ttl=57 time=11.0 ms\n\
64 bytes from 10.0.0.1: icmp_seq=2 ttl=57 time=12.5 ms\n\
64 bytes from 10.0.0.1: icmp_seq=3 ttl=57 time=14.1 ms\n\
\n\
--- 10.0.0.1 ping statistics ---\n\
3 packets transmitted, 3 received, 0% packet loss, time 2003ms\n\
rtt min/avg/max/mdev = 11.020/12.500/14.100/1.200 ms\n";

const WINDOWS_OUTPUT: &str = "Pinging 10.0.0.1 with 32 bytes of data:\r\n\
Reply from 10.0.0.1: bytes=32 time=11ms TTL=57\r\n\
Reply from 10.0.0.1: bytes=32 time=13ms TTL=57\r\n\
\r\n\
Ping statistics for 10.0.0.1:\r\n\
    Packets: Sent = 2, Received = 2, Lost = 0 (0% loss),\r\n\
Approximate round trip times in milli-seconds:\r\n\
    Minimum = 11ms, Maximum = 13ms, Average = 12ms\r\n";

/// Results with a spread of latencies, throughputs and failures
fn create_sample_results(count: usize) -> Vec<ProbeResult> {
    (0..count)
        .map(|i| {
            let target = ProbeTarget::new(format!("relay-{:04}", i), format!("10.{}.{}.{}", i / 65536, (i / 256) % 256, i % 256));
            if i % 10 == 0 {
                ProbeResult::failed(target, ProbeError::PacketLoss)
            } else {
                let down = (i * 37 % 500) as f64 / 3.0;
                ProbeResult::new(
                    target,
                    Some(5.0 + (i * 7919 % 400) as f64 / 4.0),
                    Some(SpeedResult::new(Some(down), Some(down / 2.0))),
                    None,
                )
            }
        })
        .collect()
}

fn create_sample_inventory(countries: usize, relays_per_city: usize) -> String {
    let countries: Vec<serde_json::Value> = (0..countries)
        .map(|c| {
            let relays: Vec<serde_json::Value> = (0..relays_per_city)
                .map(|r| {
                    let endpoint = if r % 3 == 0 {
                        serde_json::json!("openvpn")
                    } else {
                        serde_json::json!({"wireguard": {}})
                    };
                    serde_json::json!({
                        "hostname": format!("c{}-r{}", c, r),
                        "ipv4_addr_in": format!("10.{}.0.{}", c, r + 1),
                        "endpoint_data": endpoint,
                    })
                })
                .collect();
            serde_json::json!({
                "name": format!("Country {}", c),
                "code": format!("c{}", c),
                "cities": [{"name": "Capital", "code": "cap", "relays": relays}],
            })
        })
        .collect();
    serde_json::json!({ "countries": countries }).to_string()
}

fn create_report(count: usize) -> RunReport {
    let mut results = create_sample_results(count);
    rank(&mut results, SortKey::Latency);
    let summary = RunSummary::from_results(&results, 0, SortKey::Latency);
    RunReport {
        run_id: "bench".to_string(),
        results,
        skipped: vec![],
        stopped: false,
        elapsed: Duration::from_secs(12),
        summary,
        notices: vec![],
    }
}

fn benchmark_ping_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("ping_parsing");

    group.bench_function("unix_summary", |b| {
        b.iter(|| parse_ping_output(PingStyle::Unix, black_box(UNIX_OUTPUT)))
    });

    group.bench_function("windows_summary", |b| {
        b.iter(|| parse_ping_output(PingStyle::Windows, black_box(WINDOWS_OUTPUT)))
    });

    group.bench_function("no_summary", |b| {
        b.iter(|| parse_ping_output(PingStyle::Unix, black_box("ping: unknown host nowhere.invalid\n")))
    });

    group.finish();
}

fn benchmark_target_loading(c: &mut Criterion) {
    let mut group = c.benchmark_group("target_loading");

    let specs: Vec<String> = (0..200).map(|i| format!("gw{}=10.0.{}.{}", i % 150, i / 250, i % 250 + 1)).collect();
    group.bench_function("parse_and_dedup_specs", |b| {
        b.iter(|| {
            let targets: Vec<ProbeTarget> = specs.iter().filter_map(|s| parse_target_spec(s).ok()).collect();
            dedup_targets(black_box(targets))
        })
    });

    let inventory_json = create_sample_inventory(40, 25);
    group.bench_function("parse_inventory", |b| {
        b.iter(|| RelayInventory::from_json(black_box(&inventory_json)))
    });

    if let Ok(inventory) = RelayInventory::from_json(&inventory_json) {
        group.bench_function("select_relays", |b| {
            b.iter(|| inventory.select(black_box(Some("c7")), RelayProtocol::WireGuard))
        });
    }

    group.finish();
}

fn benchmark_config_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("config_parsing");

    group.bench_function("parse_cli_args", |b| {
        b.iter(|| {
            Cli::try_parse_from(black_box([
                "rprobe", "-t", "gw=10.0.0.1", "-t", "10.0.0.2", "--workers", "8", "--count", "5", "-p", "443",
            ]))
        })
    });

    if let Ok(cli) = Cli::try_parse_from(["rprobe", "-t", "gw=10.0.0.1", "--workers", "8"]) {
        if let Ok(config) = ConfigParser::new(cli).parse() {
            group.bench_function("validate_config", |b| b.iter(|| validate_config(black_box(&config))));
        }
    }

    group.finish();
}

fn benchmark_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for size in [10, 100, 1000].iter() {
        let results = create_sample_results(*size);

        group.bench_with_input(BenchmarkId::new("rank_by_latency", size), size, |b, _| {
            b.iter(|| {
                let mut ranked = results.clone();
                rank(&mut ranked, SortKey::Latency);
                ranked
            })
        });

        group.bench_with_input(BenchmarkId::new("rank_by_download", size), size, |b, _| {
            b.iter(|| {
                let mut ranked = results.clone();
                rank(&mut ranked, SortKey::Download);
                ranked
            })
        });

        group.bench_with_input(BenchmarkId::new("run_summary", size), size, |b, _| {
            b.iter(|| RunSummary::from_results(black_box(&results), 0, SortKey::Latency))
        });
    }

    group.bench_function("calculate_mbps", |b| {
        b.iter(|| calculate_mbps(black_box(12_345_678), black_box(Duration::from_millis(5_000))))
    });

    group.finish();
}

fn benchmark_report_rendering(c: &mut Criterion) {
    let mut group = c.benchmark_group("report_rendering");
    group.sample_size(20);

    let report = create_report(500);

    group.bench_function("plain_table", |b| {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_plain_formatter());
        b.iter(|| coordinator.display_report(black_box(&report)))
    });

    group.bench_function("colored_table", |b| {
        let coordinator = OutputCoordinator::new(OutputFormatterFactory::create_formatter(true, true));
        b.iter(|| coordinator.display_report(black_box(&report)))
    });

    group.bench_function("json", |b| b.iter(|| OutputCoordinator::display_json(black_box(&report))));

    group.finish();
}

criterion_group!(
    benches,
    benchmark_ping_parsing,
    benchmark_target_loading,
    benchmark_config_parsing,
    benchmark_aggregation,
    benchmark_report_rendering
);
criterion_main!(benches);
