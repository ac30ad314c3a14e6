//! Full lifecycle integration tests
//!
//! Drives prepare / run / cleanup for each suite against scripted hosts and
//! checks the samples, the failure records and the commands issued.
//!
//! Run with:
//! ```
//! cargo test --test lifecycle_integration
//! ```

use hostbench_common::{AddressingMode, Direction, LifecycleState, MetadataValue, Protocol, RunParameters};
use hostbench_coordinator::config::{IperfConfig, ScpConfig};
use hostbench_coordinator::emulator::EmulatorConfig;
use hostbench_coordinator::suite::{IperfSuite, ScpSuite};
use hostbench_coordinator::wait::BootWaitConfig;
use hostbench_coordinator::{BenchError, BenchmarkController, ConfigError, ControllerOptions};
use hostbench_remote::{CommandOutput, RemoteHost, RetryPolicy};
use hostbench_test_utils::{Call, ScriptedHost, fixtures};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const SERVER_PID: &str = "4242\n";

fn iperf_params(protocols: Vec<Protocol>, threads: Vec<u32>) -> RunParameters {
    RunParameters {
        protocols,
        thread_counts: threads,
        directions: Direction::BOTH.to_vec(),
        addressing: vec![AddressingMode::Internal],
        runtime: Duration::from_secs(60),
    }
}

fn iperf_suite() -> IperfSuite {
    let config: IperfConfig = serde_json::from_str("{}").unwrap();
    IperfSuite::new(config)
}

/// Host answering server starts and both thread counts
fn iperf_host(name: &str, ip: &str) -> ScriptedHost {
    ScriptedHost::new(name, ip)
        .on("echo $!", SERVER_PID)
        .on("--parallel 1", &fixtures::iperf_tcp_streams(&[940.0]))
        .on("--parallel 2", &fixtures::iperf_tcp_with_sum(&[470.0, 480.0], 950.0))
}

fn options(attempts: u32) -> ControllerOptions {
    ControllerOptions::new(RetryPolicy::new(attempts).with_poll_interval(Duration::ZERO))
}

fn controller<S: hostbench_coordinator::suite::BenchmarkSuite>(
    hosts: Vec<ScriptedHost>,
    suite: S,
    params: RunParameters,
    options: ControllerOptions,
) -> BenchmarkController<ScriptedHost, S> {
    BenchmarkController::new(hosts, suite, params, options, CancellationToken::new())
}

#[tokio::test]
async fn test_iperf_two_thread_counts_both_directions() {
    let hosts = vec![iperf_host("vm-1", "10.0.0.1"), iperf_host("vm-2", "10.0.0.2")];
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1, 2]), options(5));

    controller.prepare().await.unwrap();
    for host in controller.hosts() {
        assert!(host.calls().contains(&Call::InstallPackage("iperf".into())));
        assert_eq!(controller.transient().server_pid(host.identity().id(), Protocol::Tcp), Some(4242));
    }

    let report = controller.run().await.unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(report.samples.len(), 4);

    let threads: Vec<_> = report
        .samples
        .iter()
        .map(|s| s.meta("sending_thread_count").cloned())
        .collect();
    assert_eq!(
        threads,
        vec![
            Some(MetadataValue::Int(1)),
            Some(MetadataValue::Int(1)),
            Some(MetadataValue::Int(2)),
            Some(MetadataValue::Int(2)),
        ]
    );

    // One stream has no [SUM] line; two streams use it
    assert_eq!(report.samples[0].value(), 940.0);
    assert_eq!(report.samples[0].meta("aggregate_source"), Some(&"per_stream_estimate".into()));
    assert_eq!(report.samples[2].value(), 950.0);
    assert_eq!(report.samples[2].meta("aggregate_source"), Some(&"sum_marker".into()));
    assert!(report.samples.iter().all(|s| s.metric() == "Throughput" && s.unit() == "Mbits/sec"));

    // Each sender targets the other host and gets runtime + 30 + streams
    let vm1 = &controller.hosts()[0];
    assert_eq!(vm1.count_matching("--client 10.0.0.2"), 2);
    assert_eq!(vm1.timeout_for("--parallel 2"), Some(Duration::from_secs(92)));

    assert!(controller.cleanup().await.is_empty());
    for host in controller.hosts() {
        assert_eq!(host.count_matching("kill -9 4242"), 1);
    }
}

#[tokio::test]
async fn test_wrong_host_count_fails_before_remote_work() {
    let hosts = vec![iperf_host("vm-1", "10.0.0.1")];
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options(5));

    let err = controller.prepare().await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::Configuration(ConfigError::HostCount { expected: 2, found: 1, .. })
    ));
    assert!(controller.hosts()[0].calls().is_empty());
}

#[tokio::test]
async fn test_run_before_prepare_is_invalid() {
    let hosts = vec![iperf_host("vm-1", "10.0.0.1"), iperf_host("vm-2", "10.0.0.2")];
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options(5));

    let err = controller.run().await.unwrap_err();
    assert!(matches!(
        err,
        BenchError::InvalidState {
            operation: "run",
            state: LifecycleState::Idle
        }
    ));
}

#[tokio::test]
async fn test_cleanup_suppresses_failures_and_is_idempotent() {
    let hosts = vec![iperf_host("vm-1", "10.0.0.1"), iperf_host("vm-2", "10.0.0.2")];
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options(5));
    controller.prepare().await.unwrap();
    for host in controller.hosts() {
        host.respond("kill -9", CommandOutput::failed(1, "no such process"));
    }

    let errors = controller.cleanup().await;
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().all(|e| e.step.contains("TCP server")));
    assert_eq!(controller.state(), LifecycleState::CleanedUp);
    assert!(controller.transient().is_empty());

    assert!(controller.cleanup().await.is_empty());
    assert_eq!(controller.hosts()[0].count_matching("kill -9"), 1);
}

#[tokio::test]
async fn test_failed_combination_is_recorded_and_run_continues() {
    let failing = ScriptedHost::new("vm-1", "10.0.0.1").on("echo $!", SERVER_PID);
    failing.respond("--client", CommandOutput::failed(1, "connect failed: Connection refused"));
    let hosts = vec![failing, iperf_host("vm-2", "10.0.0.2")];
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options(2));
    controller.prepare().await.unwrap();

    let report = controller.run().await.unwrap();
    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].combination, "TCP x1 vm-1 -> vm-2 (internal)");
    assert!(report.failures[0].error.contains("Connection refused"));
    assert_eq!(controller.hosts()[0].count_matching("--client"), 2);
}

#[tokio::test]
async fn test_stop_on_first_error() {
    let failing = ScriptedHost::new("vm-1", "10.0.0.1").on("echo $!", SERVER_PID);
    failing.respond("--client", CommandOutput::failed(1, "connect failed"));
    let hosts = vec![failing, iperf_host("vm-2", "10.0.0.2")];
    let mut controller = controller(
        hosts,
        iperf_suite(),
        iperf_params(vec![Protocol::Tcp], vec![1]),
        options(1).with_stop_on_first_error(true),
    );
    controller.prepare().await.unwrap();

    let err = controller.run().await.unwrap_err();
    assert!(matches!(err, BenchError::NoSamples { failures: 1 }));
    assert_eq!(controller.hosts()[1].count_matching("--client"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_mid_run_keeps_collected_samples() {
    let failing = ScriptedHost::new("vm-2", "10.0.0.2").on("echo $!", SERVER_PID);
    failing.respond("--client", CommandOutput::failed(1, "connect failed"));
    let hosts = vec![iperf_host("vm-1", "10.0.0.1"), failing];
    let cancel = CancellationToken::new();
    let options = ControllerOptions::new(RetryPolicy::new(5).with_poll_interval(Duration::from_secs(60)));
    let mut controller = BenchmarkController::new(
        hosts,
        iperf_suite(),
        iperf_params(vec![Protocol::Tcp], vec![1, 2]),
        options,
        cancel.clone(),
    );
    controller.prepare().await.unwrap();

    // vm-2's first client attempt fails; cancel while its retry delay runs
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
    });

    let report = controller.run().await.unwrap();
    assert_eq!(report.samples.len(), 1);
    assert_eq!(report.samples[0].meta("sending_thread_count"), Some(&MetadataValue::Int(1)));

    let failed: Vec<_> = report.failures.iter().map(|f| f.combination.as_str()).collect();
    assert_eq!(
        failed,
        vec![
            "TCP x1 vm-2 -> vm-1 (internal)",
            "TCP x2 vm-1 -> vm-2 (internal)",
            "TCP x2 vm-2 -> vm-1 (internal)",
        ]
    );
    assert!(report.failures.iter().all(|f| f.error == "benchmark cancelled"));
    assert_eq!(controller.hosts()[1].count_matching("--client"), 1);
    assert_eq!(controller.hosts()[0].count_matching("--parallel 2"), 0);
}

#[tokio::test]
async fn test_unparseable_output_is_retried() {
    let hosts = vec![iperf_host("vm-1", "10.0.0.1"), iperf_host("vm-2", "10.0.0.2")];
    hosts[0].respond_once("--parallel 1", Ok(CommandOutput::ok("connect failed: No route to host\n")));
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options(3));
    controller.prepare().await.unwrap();

    let report = controller.run().await.unwrap();
    assert_eq!(report.samples.len(), 2);
    assert!(report.failures.is_empty());
    assert_eq!(controller.hosts()[0].count_matching("--client"), 2);
}

#[tokio::test]
async fn test_udp_server_and_metadata() {
    let hosts: Vec<_> = [("vm-1", "10.0.0.1"), ("vm-2", "10.0.0.2")]
        .into_iter()
        .map(|(name, ip)| {
            ScriptedHost::new(name, ip)
                .on("echo $!", SERVER_PID)
                .on("--udp --client", &fixtures::iperf_udp_single(1.05, 0.012, 0, 5350))
        })
        .collect();
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Udp], vec![1]), options(1));
    controller.prepare().await.unwrap();
    assert_eq!(controller.hosts()[0].count_matching("--server --udp --port 25000"), 1);

    let report = controller.run().await.unwrap();
    let sample = &report.samples[0];
    assert_eq!(sample.metric(), "UDP Throughput");
    assert_eq!(sample.value(), 1.05);
    assert_eq!(sample.meta("buffer_size"), Some(&MetadataValue::Int(1470)));
    assert_eq!(sample.meta("total_datagrams"), Some(&MetadataValue::Int(5350)));
}

fn emulator() -> EmulatorConfig {
    serde_json::from_str(
        r#"{
            "config_path": "/opt/emulator/BENCH-4U.cfg",
            "placeholder_mac": "0a:c6:4a:7d:f0:6c",
            "launcher": "/opt/emulator/run.sh",
            "shutdown_settle_secs": 5
        }"#,
    )
    .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_emulated_guest_lifecycle() {
    let hosts = vec![
        iperf_host("vm-1", "10.0.0.1").with_guest("42:01:0a:00:00:0b", "192.168.0.11"),
        iperf_host("vm-2", "10.0.0.2").with_guest("42:01:0a:00:00:0c", "192.168.0.12"),
    ];
    // The first guest needs two checks before it answers
    hosts[0].respond_once("hostname", Ok(CommandOutput::failed(255, "Connection refused")));
    let options = options(5)
        .with_emulator(emulator())
        .with_boot_wait(BootWaitConfig::default());
    let mut controller = controller(hosts, iperf_suite(), iperf_params(vec![Protocol::Tcp], vec![1]), options);

    controller.prepare().await.unwrap();
    let vm1 = &controller.hosts()[0];
    assert_eq!(vm1.count_matching("mac = 42:01:0a:00:00:0b"), 1);
    assert_eq!(vm1.count_matching("sudo /opt/emulator/run.sh"), 1);
    assert_eq!(vm1.count_matching("hostname"), 2);
    assert!(vm1.calls().iter().any(|c| matches!(c, Call::FetchArtifact { name, .. } if name == "iperf2.solaris")));
    assert_eq!(vm1.count_matching("chmod +x"), 1);

    let report = controller.run().await.unwrap();
    assert_eq!(report.samples.len(), 2);
    // Traffic goes to the guest NIC, through the nested ssh hop
    let vm1 = &controller.hosts()[0];
    let clients: Vec<_> = vm1.commands().into_iter().filter(|c| c.contains("--client")).collect();
    assert_eq!(clients.len(), 1);
    assert!(clients[0].starts_with("ssh ") && clients[0].contains("root@192.168.0.11"));
    assert!(clients[0].contains("--client 192.168.0.12"));

    assert!(controller.cleanup().await.is_empty());
    for host in controller.hosts() {
        assert_eq!(host.count_matching("poweroff"), 1);
        assert_eq!(host.count_matching("sleep 5"), 1);
    }
}

#[tokio::test]
async fn test_scp_records_unmeasured_copy() {
    let hosts = vec![
        ScriptedHost::new("vm-1", "10.0.0.1").on("time scp", &fixtures::timed_copy(1, 30.0)),
        ScriptedHost::new("vm-2", "10.0.0.2").on("time scp", &fixtures::timed_copy_without_timing()),
    ];
    let config: ScpConfig = serde_json::from_str("{}").unwrap();
    let params = RunParameters {
        protocols: vec![Protocol::Copy],
        thread_counts: vec![1],
        directions: Direction::BOTH.to_vec(),
        addressing: vec![AddressingMode::Internal],
        runtime: Duration::from_secs(120),
    };
    let mut controller = controller(hosts, ScpSuite::new(config, false), params, options(1));

    controller.prepare().await.unwrap();
    let report = controller.run().await.unwrap();
    assert_eq!(report.samples.len(), 2);

    let measured = &report.samples[0];
    assert!((measured.value() - 512.0 / 90.0).abs() < 1e-9);
    assert_eq!(measured.unit(), "MBytes/sec");
    assert_eq!(measured.meta("measured"), Some(&MetadataValue::Bool(true)));

    let sentinel = &report.samples[1];
    assert_eq!(sentinel.value(), 0.0);
    assert_eq!(sentinel.meta("measured"), Some(&MetadataValue::Bool(false)));
    assert_eq!(sentinel.meta("file_size"), Some(&MetadataValue::Int(536_870_912)));

    assert_eq!(controller.hosts()[0].count_matching("fallocate -l 536870912"), 1);
    assert_eq!(controller.hosts()[0].timeout_for("time scp"), Some(Duration::from_secs(120)));
}
