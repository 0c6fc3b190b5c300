//! Integration tests for the collection pipeline.
//!
//! Scrapes run against temporary directories laid out like `/proc`, plus one
//! test against the live process table.

use herakles_process_exporter::process::{
    DaemonClassifier, FixedHostname, MatchSpec, ProcFs, ProcSource,
};
use herakles_process_exporter::{NoMatchPolicy, ScrapeOptions, ScrapeResult, Scraper};
use std::fs;
use std::path::Path;
use std::sync::Arc;

struct FakeProc<'a> {
    pid: u32,
    comm: &'a str,
    cmdline: &'a [&'a str],
    utime: u64,
    stime: u64,
    rss_pages: u64,
    tids: &'a [u32],
}

fn stat_line(id: u32, comm: &str, utime: u64, stime: u64, threads: usize, rss: u64) -> String {
    format!(
        "{id} ({comm}) S 1 {id} {id} 0 -1 4194560 50 0 0 0 {utime} {stime} 0 0 20 0 {threads} 0 4242 8388608 {rss} 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0"
    )
}

fn write_proc(root: &Path, p: &FakeProc) {
    let dir = root.join(p.pid.to_string());
    fs::create_dir_all(dir.join("task")).unwrap();
    fs::write(dir.join("comm"), format!("{}\n", p.comm)).unwrap();

    let mut cmdline = p.cmdline.join("\0");
    if !cmdline.is_empty() {
        cmdline.push('\0');
    }
    fs::write(dir.join("cmdline"), cmdline).unwrap();
    fs::write(
        dir.join("stat"),
        stat_line(p.pid, p.comm, p.utime, p.stime, p.tids.len(), p.rss_pages),
    )
    .unwrap();
    fs::write(
        dir.join("io"),
        "rchar: 100\nwchar: 200\nsyscr: 11\nsyscw: 22\nread_bytes: 4096\nwrite_bytes: 12288\ncancelled_write_bytes: 0\n",
    )
    .unwrap();

    for (i, tid) in p.tids.iter().enumerate() {
        let tdir = dir.join("task").join(tid.to_string());
        fs::create_dir_all(&tdir).unwrap();
        let tname = format!("worker-{}", i);
        fs::write(tdir.join("comm"), format!("{}\n", tname)).unwrap();
        fs::write(
            tdir.join("stat"),
            stat_line(*tid, &tname, 10 + i as u64, 5, p.tids.len(), p.rss_pages),
        )
        .unwrap();
    }
}

fn scraper(root: &Path, filter: &str, threads: &str, page_size: u64) -> Scraper {
    Scraper::new(
        Arc::new(ProcFs::new(root)),
        DaemonClassifier::new(Arc::new(FixedHostname("ceph-node3.example.com".into()))),
        MatchSpec::from_comma_lists(filter, threads),
        ScrapeOptions {
            no_match: NoMatchPolicy::Abort,
            page_size,
            parallelism: 4,
        },
    )
    .expect("scrape pool")
}

fn storage_node(root: &Path) {
    let procs = [
        FakeProc {
            pid: 100,
            comm: "ceph-osd",
            cmdline: &["/usr/bin/ceph-osd", "-f", "--cluster", "ceph", "-n", "osd.3"],
            utime: 1000,
            stime: 400,
            rss_pages: 2560,
            tids: &[100, 101, 102, 103],
        },
        FakeProc {
            pid: 200,
            comm: "ceph-osd",
            cmdline: &["/usr/bin/ceph-osd", "-n", "osd.7"],
            utime: 900,
            stime: 300,
            rss_pages: 1024,
            tids: &[200, 201],
        },
        FakeProc {
            pid: 300,
            comm: "haproxy",
            cmdline: &["/usr/sbin/haproxy", "-Ws", "-f", "/etc/haproxy/haproxy.cfg"],
            utime: 50,
            stime: 20,
            rss_pages: 300,
            tids: &[300, 301, 302],
        },
        FakeProc {
            pid: 400,
            comm: "ganesha.nfsd",
            cmdline: &["/usr/bin/ganesha.nfsd", "-F", "-L", "STDERR"],
            utime: 7,
            stime: 3,
            rss_pages: 10,
            tids: &[400],
        },
        FakeProc {
            pid: 500,
            comm: "kthreadd",
            cmdline: &[],
            utime: 0,
            stime: 90,
            rss_pages: 0,
            tids: &[500],
        },
        FakeProc {
            pid: 600,
            comm: "sshd",
            cmdline: &["sshd: /usr/sbin/sshd -D"],
            utime: 1,
            stime: 1,
            rss_pages: 100,
            tids: &[600],
        },
    ];
    for p in &procs {
        write_proc(root, p);
    }
}

fn process_pids(result: &ScrapeResult) -> Vec<u32> {
    let mut pids: Vec<u32> = result
        .records()
        .filter(|r| !r.is_thread())
        .map(|r| r.pid)
        .collect();
    pids.sort_unstable();
    pids
}

// ----- Tests for record structure -----

#[test]
fn test_record_count_is_processes_plus_threads() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());

    let result = scraper(
        root.path(),
        "ceph-osd,haproxy,ganesha.nfsd,kthreadd",
        "ceph-osd,ganesha.nfsd",
        4096,
    )
    .run()
    .expect("scrape");

    // N = 5 processes, threads only for the two osds (4 + 2) and ganesha (1)
    assert_eq!(result.process_count(), 5);
    assert_eq!(result.len(), 5 + 4 + 2 + 1);
    assert_eq!(process_pids(&result), vec![100, 200, 300, 400, 500]);

    let pids = process_pids(&result);
    for record in result.records().filter(|r| r.is_thread()) {
        assert!(pids.contains(&record.pid), "orphan thread {:?}", record);
    }

    for group in result.groups() {
        assert!(!group[0].is_thread());
        assert!(group[1..]
            .iter()
            .all(|t| t.is_thread() && t.pid == group[0].pid && t.daemon == group[0].daemon));
    }
}

#[test]
fn test_threads_carry_own_comm_and_cpu() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());

    let result = scraper(root.path(), "ceph-osd", "ceph-osd", 4096)
        .run()
        .unwrap();
    let group = result
        .groups()
        .iter()
        .find(|g| g[0].pid == 200)
        .expect("osd.7 group");

    assert_eq!(group.len(), 3);
    assert_eq!(group[1].tid, Some(200));
    assert_eq!(group[1].comm, "worker-0");
    assert_eq!(group[1].utime, 10);
    assert_eq!(group[2].tid, Some(201));
    assert_eq!(group[2].comm, "worker-1");
    assert_eq!(group[2].utime, 11);
    assert!(group[1..].iter().all(|t| t.cmdline.is_empty()));
}

#[test]
fn test_rss_is_pages_times_page_size() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());

    for page_size in [4096u64, 65536] {
        let result = scraper(root.path(), "haproxy", "", page_size).run().unwrap();
        let record = result.records().next().unwrap();
        assert_eq!(record.rss_bytes, 300 * page_size);
        assert_eq!(record.vsize_bytes, 8388608);
    }
}

#[test]
fn test_counters_and_labels() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());

    let result = scraper(
        root.path(),
        "ceph-osd,haproxy,ganesha.nfsd,kthreadd",
        "",
        4096,
    )
    .run()
    .unwrap();

    let by_pid = |pid: u32| result.records().find(|r| r.pid == pid).unwrap();

    let osd = by_pid(100);
    assert_eq!(osd.daemon, "osd.3");
    assert_eq!((osd.utime, osd.stime), (1000, 400));
    assert_eq!(osd.num_threads, 4);
    let io = osd.io.expect("osd io counters");
    assert_eq!((io.syscr, io.syscw), (11, 22));
    assert_eq!((io.read_bytes, io.write_bytes), (4096, 12288));

    assert_eq!(by_pid(200).daemon, "osd.7");
    assert_eq!(by_pid(300).daemon, "haproxy.ceph-node3");
    assert_eq!(by_pid(400).daemon, "ganesha.ceph-node3");
    // Kernel threads have no command line.
    assert_eq!(by_pid(500).daemon, "");
}

// ----- Tests for degraded reads -----

#[test]
fn test_missing_io_and_cmdline_are_left_out() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());
    fs::remove_file(root.path().join("300/io")).unwrap();
    fs::remove_file(root.path().join("300/cmdline")).unwrap();

    let result = scraper(root.path(), "haproxy", "", 4096).run().unwrap();
    let record = result.records().next().unwrap();

    assert_eq!(record.pid, 300);
    assert!(record.io.is_none());
    assert!(record.cmdline.is_empty());
    assert_eq!(record.daemon, "");
    assert_eq!(record.utime, 50);
}

#[test]
fn test_vanished_thread_is_skipped() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());
    fs::remove_file(root.path().join("100/task/102/stat")).unwrap();

    let result = scraper(root.path(), "ceph-osd", "ceph-osd", 4096)
        .run()
        .unwrap();
    let tids: Vec<u32> = result
        .records()
        .filter(|r| r.pid == 100)
        .filter_map(|r| r.tid)
        .collect();
    assert_eq!(tids, vec![100, 101, 103]);
}

#[test]
fn test_unreadable_task_dir_yields_process_only() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());
    fs::remove_dir_all(root.path().join("200/task")).unwrap();

    let result = scraper(root.path(), "ceph-osd", "ceph-osd", 4096)
        .run()
        .unwrap();
    let group = result.groups().iter().find(|g| g[0].pid == 200).unwrap();
    assert_eq!(group.len(), 1);
}

#[test]
fn test_process_without_stat_is_dropped() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());
    fs::remove_file(root.path().join("200/stat")).unwrap();

    let result = scraper(root.path(), "ceph-osd", "ceph-osd", 4096)
        .run()
        .unwrap();
    assert_eq!(process_pids(&result), vec![100]);
}

#[test]
fn test_process_with_garbled_stat_is_dropped() {
    let root = tempfile::tempdir().unwrap();
    storage_node(root.path());
    fs::write(root.path().join("200/stat"), "200 (ceph-osd) S\n").unwrap();

    let result = scraper(root.path(), "ceph-osd", "ceph-osd", 4096)
        .run()
        .unwrap();
    assert_eq!(process_pids(&result), vec![100]);
}

// ----- Tests against the live process table -----

#[test]
fn test_live_counters_are_monotonic() {
    let proc_root = Path::new("/proc");
    if !proc_root.join("self").exists() {
        eprintln!("skipping: no /proc");
        return;
    }

    let source = ProcFs::new(proc_root);
    let me = std::process::id();
    let comm = source.comm(me).expect("own comm");

    let scraper = Scraper::new(
        Arc::new(source),
        DaemonClassifier::new(Arc::new(FixedHostname("localhost".into()))),
        MatchSpec::from_comma_lists(&comm, &comm),
        ScrapeOptions {
            no_match: NoMatchPolicy::Abort,
            page_size: 4096,
            parallelism: 2,
        },
    )
    .unwrap();

    let own = |result: &ScrapeResult| {
        result
            .records()
            .find(|r| r.pid == me && !r.is_thread())
            .cloned()
            .expect("own process record")
    };

    let first = own(&scraper.run().unwrap());
    // Burn a little CPU and do some I/O between the scrapes.
    let mut acc = 0u64;
    for i in 0..200_000u64 {
        acc = acc.wrapping_mul(31).wrapping_add(i);
    }
    let _ = fs::read_to_string("/proc/self/stat");
    let second = own(&scraper.run().unwrap());

    assert!(acc != 1);
    assert!(second.utime >= first.utime);
    assert!(second.stime >= first.stime);
    // Own io file is always readable.
    let (before, after) = (first.io.expect("own io"), second.io.expect("own io"));
    assert!(after.syscr >= before.syscr);
    assert!(after.syscw >= before.syscw);
    assert!(after.read_bytes >= before.read_bytes);
    assert!(after.write_bytes >= before.write_bytes);
    assert!(first.num_threads >= 1);
}
