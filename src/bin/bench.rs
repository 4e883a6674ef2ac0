//! Multi-threaded latency benchmark driver.
//!
//! Usage: `rioc-bench <host> <port> [num_threads] [value_size] [num_ops] [verify] [tls_cert] [tls_key] [tls_ca]`
//!
//! `num_threads` defaults to the host's core count, same default `chopin`'s
//! server uses for its worker pool.

use std::time::Instant;

use rioc::{Client, ClientConfig, TlsConfig};

const MAX_THREADS: usize = 64;

struct ThreadResult {
    latencies_us: Vec<f64>,
    op_count: u64,
    error_count: u64,
}

fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn run_worker(
    thread_id: usize,
    host: String,
    port: u32,
    value_size: usize,
    num_ops: usize,
    verify: bool,
    tls: Option<TlsConfig>,
) -> ThreadResult {
    let mut config = ClientConfig::new(host, port);
    if let Some(tls) = tls {
        config = config.with_tls(tls);
    }

    let mut result = ThreadResult {
        latencies_us: Vec::with_capacity(num_ops),
        op_count: 0,
        error_count: 0,
    };

    let mut client = match Client::connect(&config) {
        Ok(c) => c,
        Err(e) => {
            log::error!("thread {thread_id}: connect failed: {e}");
            return result;
        }
    };

    let value = vec![b'A'; value_size];
    let base_ts = rioc::io::get_timestamp_ns();

    for i in 0..num_ops {
        let key = format!("bench_{thread_id}_{i}");
        let ts = base_ts + i as u64;
        let start = Instant::now();
        let outcome = client.insert(key.as_bytes(), &value, ts);
        let elapsed = start.elapsed().as_secs_f64() * 1_000_000.0;

        // A duplicate key on a reissued insert is tolerated, same as the
        // original benchmark driver's unconditional re-inserts.
        let succeeded = match &outcome {
            Ok(()) => true,
            Err(e) => e.code() == rioc::error::code::EEXIST,
        };
        match outcome {
            _ if succeeded => {
                result.op_count += 1;
                result.latencies_us.push(elapsed);
                if verify {
                    match client.get(key.as_bytes()) {
                        Ok(Some(got)) if got == value => {}
                        _ => result.error_count += 1,
                    }
                }
            }
            Err(_) => result.error_count += 1,
        }
    }

    println!(
        "Thread {thread_id}: ops={}, errors={}",
        result.op_count, result.error_count
    );
    result
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!(
            "Usage: {} <host> <port> [num_threads] [value_size] [num_ops] [verify] [tls_cert] [tls_key] [tls_ca]",
            args[0]
        );
        std::process::exit(1);
    }

    let host = args[1].clone();
    let port: u32 = match args[2].parse() {
        Ok(p) => p,
        Err(_) => {
            eprintln!("invalid port");
            std::process::exit(1);
        }
    };
    let num_threads: usize = match args.get(3).map(|s| s.parse()) {
        Some(Ok(n)) if n >= 1 && n <= MAX_THREADS => n,
        Some(Ok(_)) | Some(Err(_)) => {
            eprintln!("number of threads must be between 1 and {MAX_THREADS}");
            std::process::exit(1);
        }
        None => num_cpus::get().clamp(1, MAX_THREADS),
    };
    let value_size: usize = args.get(4).and_then(|s| s.parse().ok()).unwrap_or(100);
    let num_ops: usize = args.get(5).and_then(|s| s.parse().ok()).unwrap_or(10_000);
    let verify: bool = args.get(6).map(|s| s != "0").unwrap_or(false);
    let tls_cert = args.get(7).cloned();
    let tls_key = args.get(8).cloned();
    let tls_ca = args.get(9).cloned();

    let tls = match (tls_cert, tls_key) {
        (Some(cert), Some(key)) => {
            let mut cfg = TlsConfig::new(cert, key).with_verify_peer(host.clone());
            if let Some(ca) = tls_ca {
                cfg = cfg.with_ca(ca);
            }
            Some(cfg)
        }
        (None, None) => None,
        _ => {
            eprintln!("both TLS certificate and key paths must be provided for TLS mode");
            std::process::exit(1);
        }
    };

    let mut handles = Vec::with_capacity(num_threads);
    for thread_id in 0..num_threads {
        let host = host.clone();
        let tls = tls.clone();
        handles.push(std::thread::spawn(move || {
            run_worker(thread_id, host, port, value_size, num_ops, verify, tls)
        }));
    }

    let mut total_ops = 0u64;
    let mut total_errors = 0u64;
    let mut all_latencies = Vec::new();
    for handle in handles {
        match handle.join() {
            Ok(result) => {
                total_ops += result.op_count;
                total_errors += result.error_count;
                all_latencies.extend(result.latencies_us);
            }
            Err(_) => total_errors += 1,
        }
    }

    all_latencies.sort_by(|a, b| a.partial_cmp(b).unwrap());
    println!("Total ops: {total_ops}, total errors: {total_errors}");
    if !all_latencies.is_empty() {
        println!(
            "Latency (us): p50={:.1} p95={:.1} p99={:.1} max={:.1}",
            percentile(&all_latencies, 0.50),
            percentile(&all_latencies, 0.95),
            percentile(&all_latencies, 0.99),
            all_latencies.last().copied().unwrap_or(0.0)
        );
    }
}
