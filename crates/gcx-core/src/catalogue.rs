//! Built-in rule catalogue.
//!
//! A compact table of representative HotSpot signatures for unified (JDK 9+)
//! and legacy (JDK 8) logging. Order matters: earlier entries win.
//! Each entry is `(kind, pattern, endstamp, throwaway)`.

use crate::event_kind::EventKind;

/// Prepends the optional `datestamp: uptime: ` prefix of JDK 8 lines.
macro_rules! legacy {
    ($body:literal) => {
        concat!(
            r"^(?:(?P<datestamp>\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}\.\d{3}[+-]\d{4}): )?",
            r"(?:(?P<uptime>\d+\.\d+): )?",
            $body
        )
    };
}

/// Matches the unified heap transition `24M->4M(256M)`.
macro_rules! heap {
    () => {
        r"\d+[KMG]->\d+[KMG]\(\d+[KMG]\)"
    };
}

/// Parenthesised trigger; tolerates the nested parentheses of `System.gc()`.
macro_rules! trigger {
    () => {
        r"\((?P<trigger>[^)]+\)?)\)"
    };
}

pub const BUILTIN_RULES: &[(EventKind, &str, bool, bool)] = &[
    // Unified logging: end lines carry the pause time and are logged when
    // the pause finishes.
    (
        EventKind::UnifiedMixed,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Young \(Mixed\) ",
            trigger!(),
            " ",
            heap!(),
            r" (?P<pause_ms>\d+(?:\.\d+)?)ms$"
        ),
        true,
        false,
    ),
    (
        EventKind::UnifiedYoung,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Young (?:\([^)]+\) )?",
            trigger!(),
            " ",
            heap!(),
            r" (?P<pause_ms>\d+(?:\.\d+)?)ms$"
        ),
        true,
        false,
    ),
    (
        EventKind::UnifiedFull,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Full(?: ",
            trigger!(),
            ")? ",
            heap!(),
            r" (?P<pause_ms>\d+(?:\.\d+)?)ms$"
        ),
        true,
        false,
    ),
    (
        EventKind::UnifiedRemark,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Remark ",
            heap!(),
            r" (?P<pause_ms>\d+(?:\.\d+)?)ms$"
        ),
        true,
        false,
    ),
    (
        EventKind::UnifiedCleanup,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Cleanup ",
            heap!(),
            r" (?P<pause_ms>\d+(?:\.\d+)?)ms$"
        ),
        true,
        false,
    ),
    (
        EventKind::ShenandoahPause,
        r"^GC\((?P<gc_id>\d+)\) Pause (?P<phase>(?:Init|Final|Degenerated)[A-Za-z ]*?)(?: \([^)]*\))? (?P<pause_ms>\d+(?:\.\d+)?)ms$",
        true,
        false,
    ),
    (
        EventKind::ZPause,
        r"^GC\((?P<gc_id>\d+)\) Pause (?P<phase>Mark Start|Mark End|Relocate Start) (?P<pause_ms>\d+(?:\.\d+)?)ms$",
        true,
        false,
    ),
    // Unified logging: `gc,start` lines open a pause closed by the line above.
    (
        EventKind::UnifiedMixed,
        concat!(r"^GC\((?P<gc_id>\d+)\) Pause Young \(Mixed\) ", trigger!(), "$"),
        false,
        false,
    ),
    (
        EventKind::UnifiedYoung,
        concat!(
            r"^GC\((?P<gc_id>\d+)\) Pause Young (?:\([^)]+\) )?",
            trigger!(),
            "$"
        ),
        false,
        false,
    ),
    (
        EventKind::UnifiedFull,
        concat!(r"^GC\((?P<gc_id>\d+)\) Pause Full(?: ", trigger!(), ")?$"),
        false,
        false,
    ),
    (
        EventKind::UnifiedRemark,
        r"^GC\((?P<gc_id>\d+)\) Pause Remark$",
        false,
        false,
    ),
    (
        EventKind::UnifiedCleanup,
        r"^GC\((?P<gc_id>\d+)\) Pause Cleanup$",
        false,
        false,
    ),
    (
        EventKind::ShenandoahPause,
        r"^GC\((?P<gc_id>\d+)\) Pause (?P<phase>(?:Init|Final|Degenerated)[A-Za-z ]*?)(?: \([^)]*\))?$",
        false,
        false,
    ),
    (
        EventKind::G1ConcurrentCycle,
        r"^GC\((?P<gc_id>\d+)\) Concurrent (?:Mark )?Cycle(?: (?P<pause_ms>\d+(?:\.\d+)?)ms)?$",
        false,
        false,
    ),
    (
        EventKind::Safepoint,
        r#"^Safepoint "(?P<operation>[^"]+)", Time since last: \d+ ns, Reaching safepoint: \d+ ns, (?:Cleanup: \d+ ns, )?At safepoint: \d+ ns, Total: (?P<pause_ns>\d+) ns$"#,
        true,
        false,
    ),
    // Legacy logging: the timestamp is the start and the duration is inline.
    (
        EventKind::G1MixedPause,
        legacy!(
            r"\[GC pause \((?P<trigger>[^)]+\)?)\) \(mixed\).*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::G1YoungPause,
        legacy!(
            r"\[GC pause \((?P<trigger>[^)]+\)?)\) \(young\).*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::G1Remark,
        legacy!(r"\[GC remark.*, (?P<pause_s>\d+\.\d+) secs\]"),
        false,
        false,
    ),
    (
        EventKind::G1Cleanup,
        legacy!(r"\[GC cleanup.*, (?P<pause_s>\d+\.\d+) secs\]"),
        false,
        false,
    ),
    (
        EventKind::G1ConcurrentCycle,
        legacy!(r"\[GC concurrent-[a-z-]+.*\]$"),
        false,
        false,
    ),
    (
        EventKind::CmsInitialMark,
        legacy!(r"\[GC \((?P<trigger>CMS Initial Mark)\) .*, (?P<pause_s>\d+\.\d+) secs\]"),
        false,
        false,
    ),
    (
        EventKind::CmsRemark,
        legacy!(r"\[GC \((?P<trigger>CMS Final Remark)\) .*, (?P<pause_s>\d+\.\d+) secs\]"),
        false,
        false,
    ),
    (
        EventKind::CmsConcurrent,
        legacy!(r"\[CMS-concurrent-[a-z-]+.*\]$"),
        false,
        false,
    ),
    (
        EventKind::ParallelYoung,
        legacy!(
            r"\[GC \((?P<trigger>[^)]+\)?)\) \[PSYoungGen: .*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::ParallelFull,
        legacy!(
            r"\[Full GC \((?P<trigger>[^)]+\)?)\) \[PSYoungGen: .*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::SerialYoung,
        legacy!(
            r"\[GC \((?P<trigger>[^)]+\)?)\) .*\[DefNew: .*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::SerialFull,
        legacy!(
            r"\[Full GC \((?P<trigger>[^)]+\)?)\) .*\[Tenured: .*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::G1FullGc,
        legacy!(
            r"\[Full GC \((?P<trigger>[^)]+\)?)\)\s+\d+(?:\.\d+)?[KMGB]->.*, (?P<pause_s>\d+\.\d+) secs\]"
        ),
        false,
        false,
    ),
    (
        EventKind::ApplicationStopped,
        legacy!(
            r"Total time for which application threads were stopped: (?P<pause_s>\d+\.\d+) seconds"
        ),
        true,
        false,
    ),
    // Throw-away lines: startup banners, heap printouts, blank lines.
    (
        EventKind::Header,
        r"^(?:Using (?:G1|Parallel|Serial|Concurrent Mark Sweep|Shenandoah|The Z Garbage Collector)$|Version: |CPUs: |Memory: |CommandLine flags: |Heap (?:Min|Initial|Max) Capacity: |Heap Region Size: |(?:OpenJDK|Java HotSpot(?:\(TM\))?) )",
        false,
        true,
    ),
    (
        EventKind::HeapAtGc,
        r"^(?:\{Heap (?:before|after) GC invocations=\d+|\}$|Heap$|\s*(?:PSYoungGen|ParOldGen|par new generation|def new generation|tenured generation|concurrent mark-sweep generation|garbage-first heap|eden space|from space|to space|object space|the space|region size|Metaspace|class space)\b)",
        false,
        true,
    ),
    (EventKind::Blank, r"^\s*$", false, true),
];
