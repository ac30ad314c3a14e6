//! Canned tool output
//!
//! Shapes follow iperf 2 client output, `time scp` output and SPEC CPU
//! result logs closely enough to exercise the extraction rules.

/// iperf TCP header printed before any stream reports
fn tcp_header(server: &str, port: u16) -> String {
    format!(
        "------------------------------------------------------------\n\
         Client connecting to {server}, TCP port {port}\n\
         TCP window size: 85.0 KByte (default)\n\
         ------------------------------------------------------------\n"
    )
}

/// TCP client output with one line per stream and no `[SUM]` line
pub fn iperf_tcp_streams(mbits: &[f64]) -> String {
    let mut out = tcp_header("10.0.0.2", 20000);
    for (i, _) in mbits.iter().enumerate() {
        out.push_str(&format!(
            "[{:>3}] local 10.0.0.1 port {} connected with 10.0.0.2 port 20000\n",
            i + 3,
            50214 + i
        ));
    }
    out.push_str("[ ID] Interval       Transfer     Bandwidth\n");
    for (i, value) in mbits.iter().enumerate() {
        out.push_str(&format!(
            "[{:>3}]  0.0-60.0 sec  1.75 GBytes   {value} Mbits/sec\n",
            i + 3
        ));
    }
    out
}

/// TCP client output with per-stream lines followed by a `[SUM]` line
pub fn iperf_tcp_with_sum(mbits: &[f64], sum: f64) -> String {
    let mut out = iperf_tcp_streams(mbits);
    out.push_str(&format!("[SUM]  0.0-60.0 sec  6.57 GBytes   {sum} Mbits/sec\n"));
    out
}

/// A bare `[SUM]` line with no per-stream lines
pub fn iperf_sum_only(sum: f64) -> String {
    format!("[SUM]  0.0-60.0 sec  6.57 GBytes   {sum} Mbits/sec\n")
}

/// UDP client output for one stream, including the server report
pub fn iperf_udp_single(mbits: f64, jitter_ms: f64, lost: u64, total: u64) -> String {
    format!(
        "------------------------------------------------------------\n\
         Client connecting to 10.0.0.2, UDP port 25000\n\
         Sending 1470 byte datagrams, IPG target: 11215.21 us (kalman adjust)\n\
         UDP buffer size:  208 KByte (default)\n\
         ------------------------------------------------------------\n\
         [  3] local 10.0.0.1 port 41000 connected with 10.0.0.2 port 25000\n\
         [ ID] Interval       Transfer     Bandwidth      Write/Err  PPS\n\
         [  3]  0.0-60.0 sec  7.50 MBytes  {mbits} Mbits/sec  {total}/0       89 pps\n\
         [  3] Sent {total} datagrams\n\
         [  3] Server Report:\n\
         [  3]  0.0-60.0 sec  7.50 MBytes  {mbits} Mbits/sec   {jitter_ms} ms    {lost}/ {total} (0%)\n"
    )
}

/// Output of `( time scp ... ) 2>&1` with the given wall-clock time
pub fn timed_copy(minutes: u32, seconds: f64) -> String {
    format!(
        "scp_test_file        100%  512MB   5.7MB/s   01:30\n\
         \n\
         real    {minutes}m{seconds:.3}s\n\
         user    0m5.100s\n\
         sys     0m3.200s\n"
    )
}

/// Output of a copy that printed no timing summary
pub fn timed_copy_without_timing() -> String {
    "scp_test_file        100%  512MB   5.7MB/s   01:30\n".to_string()
}

/// CINT2006 reference result log
pub fn spec2006_int_log(base: &str) -> String {
    format!(
        "                                  Estimated                       Estimated\n\
         \x20               Base     Base       Base        Peak     Peak       Peak\n\
         Benchmarks      Ref.   Run Time     Ratio       Ref.   Run Time     Ratio\n\
         -------------- ------  ---------  ---------    ------  ---------  ---------\n\
         400.perlbench    9770        562       17.4 *\n\
         401.bzip2        9650        790       12.2 *\n\
         ==============================================================================\n\
         \x20SPECint(R)_base2006              {base}\n\
         \x20SPECint2006                                                   Not Run\n"
    )
}

/// CFP2000 result log
pub fn spec2000_fp_log(base: &str) -> String {
    format!(
        "                                     Base      Base      Base      Peak      Peak      Peak\n\
         Benchmarks    Ref Time  Run Time   Ratio    Ref Time  Run Time   Ratio\n\
         ------------  --------  --------  --------  --------  --------  --------\n\
         168.wupwise       1600       320       500*\n\
         171.swim          3100       620       500*\n\
         ========================================================================\n\
         \x20  Est. SPECfp_base2000                       {base}\n\
         \x20  Est. SPECfp2000                                                    --\n"
    )
}
