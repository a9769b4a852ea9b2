//! Load testing for the echo server.

use std::time::{Duration, Instant};

use async_server::EchoProtocol;

mod common;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_performance() {
    let (server, addr) = common::start_server(EchoProtocol).await;

    let concurrency = 20;
    let connections_per_task = 25;
    let total = concurrency * connections_per_task;

    let start = Instant::now();
    let mut tasks = Vec::new();
    for task_id in 0..concurrency {
        tasks.push(tokio::spawn(async move {
            let mut latencies = Vec::new();
            for n in 0..connections_per_task {
                let line = format!("task {task_id} line {n}\n");
                let conn_start = Instant::now();
                let reply = common::exchange(addr, &[line.as_bytes()]).await;
                if reply == line.as_bytes() {
                    latencies.push(conn_start.elapsed());
                }
            }
            latencies
        }));
    }

    let mut all_latencies: Vec<Duration> = Vec::new();
    for task in tasks {
        all_latencies.extend(task.await.unwrap());
    }
    let duration = start.elapsed();

    server.stop().await;
    assert_eq!(server.active_connections(), 0);
    assert_eq!(all_latencies.len(), total, "some echoes were wrong or lost");

    all_latencies.sort();
    let p50 = all_latencies[all_latencies.len() / 2];
    let p99 = all_latencies[(all_latencies.len() as f64 * 0.99) as usize];

    println!("\n--- Load Test Results ---");
    println!("Connections:    {}", total);
    println!("Concurrency:    {}", concurrency);
    println!("Total Duration: {:?}", duration);
    println!("Conns/sec:      {:.2}", total as f64 / duration.as_secs_f64());
    println!("P50 Latency:    {:?}", p50);
    println!("P99 Latency:    {:?}", p99);
    println!("-------------------------\n");
}
