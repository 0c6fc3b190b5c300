//! Prometheus metrics definitions for herakles-process-exporter.
//!
//! [`emit`] maps scrape records onto the fixed metric schema; [`ProcessMetrics`]
//! holds the registered metric families and publishes a scrape's samples.

use prometheus::{CounterVec, Gauge, GaugeVec, Opts, Registry};

use crate::scrape::ScrapeResult;

/// Default metric name prefix.
pub const DEFAULT_PREFIX: &str = "proc";

pub const PROCESS_LABELS: &[&str] = &["pid", "pname", "daemon"];
pub const THREAD_LABELS: &[&str] = &["pid", "tid", "tname", "daemon"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    Counter,
    Gauge,
}

/// Every metric of the exported schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcMetric {
    ProcessCpuKernel,
    ProcessCpuUser,
    ProcessRss,
    ProcessVirtualMemory,
    ProcessSyscallReads,
    ProcessSyscallWrites,
    ProcessReadBytes,
    ProcessWrittenBytes,
    ProcessThreads,
    ThreadCpuKernel,
    ThreadCpuUser,
}

impl ProcMetric {
    pub const ALL: [ProcMetric; 11] = [
        ProcMetric::ProcessCpuKernel,
        ProcMetric::ProcessCpuUser,
        ProcMetric::ProcessRss,
        ProcMetric::ProcessVirtualMemory,
        ProcMetric::ProcessSyscallReads,
        ProcMetric::ProcessSyscallWrites,
        ProcMetric::ProcessReadBytes,
        ProcMetric::ProcessWrittenBytes,
        ProcMetric::ProcessThreads,
        ProcMetric::ThreadCpuKernel,
        ProcMetric::ThreadCpuUser,
    ];

    pub fn suffix(self) -> &'static str {
        match self {
            ProcMetric::ProcessCpuKernel => "process_cpu_kernel_seconds_total",
            ProcMetric::ProcessCpuUser => "process_cpu_user_seconds_total",
            ProcMetric::ProcessRss => "process_rss_size_bytes",
            ProcMetric::ProcessVirtualMemory => "process_virtual_memory_bytes_total",
            ProcMetric::ProcessSyscallReads => "process_syscall_reads_total",
            ProcMetric::ProcessSyscallWrites => "process_syscall_writes_total",
            ProcMetric::ProcessReadBytes => "process_read_bytes_total",
            ProcMetric::ProcessWrittenBytes => "process_written_bytes_total",
            ProcMetric::ProcessThreads => "process_thread_total",
            ProcMetric::ThreadCpuKernel => "thread_cpu_kernel_seconds_total",
            ProcMetric::ThreadCpuUser => "thread_cpu_user_seconds_total",
        }
    }

    pub fn help(self) -> &'static str {
        match self {
            ProcMetric::ProcessCpuKernel => "Kernel CPU usage of process",
            ProcMetric::ProcessCpuUser => "User CPU usage of process",
            ProcMetric::ProcessRss => "Memory consumed by the process (Resident Set Size)",
            ProcMetric::ProcessVirtualMemory => "Virtual Memory size of the process (bytes)",
            ProcMetric::ProcessSyscallReads => "Total of read syscalls issued by the process",
            ProcMetric::ProcessSyscallWrites => "Total of write syscalls issued by the process",
            ProcMetric::ProcessReadBytes => "Process read bytes completed",
            ProcMetric::ProcessWrittenBytes => "Process write bytes completed",
            ProcMetric::ProcessThreads => "Total threads associated with the process",
            ProcMetric::ThreadCpuKernel => "Kernel CPU usage of thread",
            ProcMetric::ThreadCpuUser => "User CPU usage of thread",
        }
    }

    pub fn kind(self) -> MetricKind {
        match self {
            ProcMetric::ProcessRss | ProcMetric::ProcessVirtualMemory | ProcMetric::ProcessThreads => {
                MetricKind::Gauge
            }
            _ => MetricKind::Counter,
        }
    }

    pub fn labels(self) -> &'static [&'static str] {
        match self {
            ProcMetric::ThreadCpuKernel | ProcMetric::ThreadCpuUser => THREAD_LABELS,
            _ => PROCESS_LABELS,
        }
    }

    pub fn name(self, prefix: &str) -> String {
        format!("{}_{}", prefix, self.suffix())
    }
}

/// One (metric, labels, value) tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub metric: ProcMetric,
    pub name: String,
    /// Label values in the order of `metric.labels()`.
    pub labels: Vec<String>,
    pub value: f64,
}

impl MetricSample {
    pub fn kind(&self) -> MetricKind {
        self.metric.kind()
    }

    /// Looks up a label value by label name.
    pub fn label(&self, name: &str) -> Option<&str> {
        self.metric
            .labels()
            .iter()
            .position(|l| *l == name)
            .and_then(|i| self.labels.get(i))
            .map(String::as_str)
    }
}

/// Maps scrape records to metric samples.
///
/// Process records yield nine samples (five when their I/O counters could
/// not be read), thread records two. CPU times are
/// converted from clock ticks to seconds.
pub fn emit(result: &ScrapeResult, prefix: &str, clk_tck: u64) -> Vec<MetricSample> {
    let tck = clk_tck.max(1) as f64;
    let mut samples = Vec::with_capacity(result.len() * 9);

    for r in result.records() {
        let pid = r.pid.to_string();
        let mut push = |metric: ProcMetric, labels: Vec<String>, value: f64| {
            samples.push(MetricSample {
                metric,
                name: metric.name(prefix),
                labels,
                value,
            });
        };

        match r.tid {
            None => {
                let labels = vec![pid, r.comm.clone(), r.daemon.clone()];
                push(ProcMetric::ProcessCpuKernel, labels.clone(), r.stime as f64 / tck);
                push(ProcMetric::ProcessCpuUser, labels.clone(), r.utime as f64 / tck);
                push(ProcMetric::ProcessRss, labels.clone(), r.rss_bytes as f64);
                push(ProcMetric::ProcessVirtualMemory, labels.clone(), r.vsize_bytes as f64);
                // An unreadable io file must not look like a counter reset.
                if let Some(io) = r.io {
                    // syscalls, not I/O requests
                    push(ProcMetric::ProcessSyscallReads, labels.clone(), io.syscr as f64);
                    push(ProcMetric::ProcessSyscallWrites, labels.clone(), io.syscw as f64);
                    push(ProcMetric::ProcessReadBytes, labels.clone(), io.read_bytes as f64);
                    push(ProcMetric::ProcessWrittenBytes, labels.clone(), io.write_bytes as f64);
                }
                push(ProcMetric::ProcessThreads, labels, r.num_threads as f64);
            }
            Some(tid) => {
                let labels = vec![pid, tid.to_string(), r.comm.clone(), r.daemon.clone()];
                push(ProcMetric::ThreadCpuKernel, labels.clone(), r.stime as f64 / tck);
                push(ProcMetric::ThreadCpuUser, labels, r.utime as f64 / tck);
            }
        }
    }

    samples
}

/// Returns true if `prefix` is usable as the start of a Prometheus metric name.
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

#[derive(Clone)]
enum Family {
    Counter(CounterVec),
    Gauge(GaugeVec),
}

/// Registered metric families for the process schema plus exporter telemetry.
#[derive(Clone)]
pub struct ProcessMetrics {
    families: Vec<(ProcMetric, Family)>,
    pub scrape_duration: Gauge,
    pub matched_processes: Gauge,
}

impl ProcessMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry, prefix: &str) -> Result<Self, prometheus::Error> {
        let mut families = Vec::with_capacity(ProcMetric::ALL.len());
        for metric in ProcMetric::ALL {
            let opts = Opts::new(metric.name(prefix), metric.help());
            let family = match metric.kind() {
                MetricKind::Counter => {
                    let vec = CounterVec::new(opts, metric.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Counter(vec)
                }
                MetricKind::Gauge => {
                    let vec = GaugeVec::new(opts, metric.labels())?;
                    registry.register(Box::new(vec.clone()))?;
                    Family::Gauge(vec)
                }
            };
            families.push((metric, family));
        }

        let scrape_duration = Gauge::new(
            format!("{}_exporter_scrape_duration_seconds", prefix),
            "Time spent collecting process data for the last /metrics request",
        )?;
        let matched_processes = Gauge::new(
            format!("{}_exporter_matched_processes", prefix),
            "Number of processes matched by the filter in the last scrape",
        )?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(matched_processes.clone()))?;

        Ok(Self {
            families,
            scrape_duration,
            matched_processes,
        })
    }

    fn family(&self, metric: ProcMetric) -> Option<&Family> {
        self.families
            .iter()
            .find(|(m, _)| *m == metric)
            .map(|(_, f)| f)
    }

    /// Replaces all exported series with the given samples.
    ///
    /// Series of processes that are gone are dropped by the reset.
    pub fn publish(&self, samples: &[MetricSample]) {
        for (_, family) in &self.families {
            match family {
                Family::Counter(v) => v.reset(),
                Family::Gauge(v) => v.reset(),
            }
        }

        for s in samples {
            let labels: Vec<&str> = s.labels.iter().map(String::as_str).collect();
            match self.family(s.metric) {
                Some(Family::Counter(v)) => v.with_label_values(&labels[..]).inc_by(s.value),
                Some(Family::Gauge(v)) => v.with_label_values(&labels[..]).set(s.value),
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcIo, ProcessRecord};
    use prometheus::{Encoder, TextEncoder};

    fn process(pid: u32) -> ProcessRecord {
        ProcessRecord {
            pid,
            comm: "ceph-osd".into(),
            daemon: "osd.1".into(),
            num_threads: 2,
            stime: 250,
            utime: 500,
            rss_bytes: 40960,
            vsize_bytes: 1 << 20,
            io: Some(ProcIo {
                syscr: 1,
                syscw: 2,
                read_bytes: 3,
                write_bytes: 4,
            }),
            ..Default::default()
        }
    }

    fn sample_result() -> ScrapeResult {
        let p = process(100);
        let t = ProcessRecord::thread(&p, 101, "msgr-worker-0".into(), 30, 20);
        ScrapeResult::new(vec![vec![p, t]])
    }

    #[test]
    fn test_emit_counts_and_kinds() {
        let samples = emit(&sample_result(), "proc", 100);
        assert_eq!(samples.len(), 9 + 2);

        let rss = samples
            .iter()
            .find(|s| s.metric == ProcMetric::ProcessRss)
            .expect("rss sample");
        assert_eq!(rss.name, "proc_process_rss_size_bytes");
        assert_eq!(rss.kind(), MetricKind::Gauge);
        assert_eq!(rss.value, 40960.0);
        assert_eq!(rss.label("pid"), Some("100"));
        assert_eq!(rss.label("pname"), Some("ceph-osd"));
        assert_eq!(rss.label("daemon"), Some("osd.1"));
    }

    #[test]
    fn test_emit_cpu_in_seconds() {
        let samples = emit(&sample_result(), "proc", 100);
        let kernel = samples
            .iter()
            .find(|s| s.metric == ProcMetric::ProcessCpuKernel)
            .expect("kernel cpu");
        assert_eq!(kernel.kind(), MetricKind::Counter);
        assert!((kernel.value - 2.5).abs() < 1e-9);

        let thread_user = samples
            .iter()
            .find(|s| s.metric == ProcMetric::ThreadCpuUser)
            .expect("thread user cpu");
        assert_eq!(thread_user.name, "proc_thread_cpu_user_seconds_total");
        assert_eq!(thread_user.label("tid"), Some("101"));
        assert_eq!(thread_user.label("tname"), Some("msgr-worker-0"));
        assert!((thread_user.value - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_emit_skips_unreadable_io() {
        let mut p = process(100);
        p.io = None;
        let samples = emit(&ScrapeResult::new(vec![vec![p]]), "proc", 100);

        assert_eq!(samples.len(), 5);
        assert!(samples.iter().all(|s| !matches!(
            s.metric,
            ProcMetric::ProcessSyscallReads
                | ProcMetric::ProcessSyscallWrites
                | ProcMetric::ProcessReadBytes
                | ProcMetric::ProcessWrittenBytes
        )));
    }

    #[test]
    fn test_emit_empty_result() {
        assert!(emit(&ScrapeResult::default(), "proc", 100).is_empty());
    }

    #[test]
    fn test_is_valid_prefix() {
        assert!(is_valid_prefix("proc"));
        assert!(is_valid_prefix("ceph_proc"));
        assert!(is_valid_prefix("_x:y"));
        assert!(!is_valid_prefix(""));
        assert!(!is_valid_prefix("9proc"));
        assert!(!is_valid_prefix("proc-exporter"));
    }

    #[test]
    fn test_publish_replaces_previous_series() {
        let registry = Registry::new();
        let metrics = ProcessMetrics::new(&registry, "proc").expect("register");

        metrics.publish(&emit(&sample_result(), "proc", 100));
        metrics.publish(&emit(&ScrapeResult::new(vec![vec![process(200)]]), "proc", 100));

        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .expect("encode");
        let text = String::from_utf8(buffer).expect("utf8");

        assert!(text.contains("proc_process_cpu_user_seconds_total{daemon=\"osd.1\",pid=\"200\",pname=\"ceph-osd\"} 5"));
        assert!(!text.contains("pid=\"100\""));
        assert!(text.contains("# TYPE proc_process_thread_total gauge"));
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let registry = Registry::new();
        ProcessMetrics::new(&registry, "proc").expect("first");
        assert!(ProcessMetrics::new(&registry, "proc").is_err());
    }
}
