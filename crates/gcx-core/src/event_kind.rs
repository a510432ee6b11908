//! Event kind enum as the single source of truth for event identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Canonical GC log event kinds.
///
/// Several rules may share one kind (e.g. the start and end lines of a
/// unified-logging pause); the kind is what reconciliation and reporting key on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    UnifiedYoung,
    UnifiedMixed,
    UnifiedFull,
    UnifiedRemark,
    UnifiedCleanup,
    G1YoungPause,
    G1MixedPause,
    G1FullGc,
    G1Remark,
    G1Cleanup,
    G1ConcurrentCycle,
    ParallelYoung,
    ParallelFull,
    SerialYoung,
    SerialFull,
    CmsInitialMark,
    CmsRemark,
    CmsConcurrent,
    ShenandoahPause,
    ZPause,
    Safepoint,
    ApplicationStopped,
    Header,
    HeapAtGc,
    Blank,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 25] = [
        Self::UnifiedYoung,
        Self::UnifiedMixed,
        Self::UnifiedFull,
        Self::UnifiedRemark,
        Self::UnifiedCleanup,
        Self::G1YoungPause,
        Self::G1MixedPause,
        Self::G1FullGc,
        Self::G1Remark,
        Self::G1Cleanup,
        Self::G1ConcurrentCycle,
        Self::ParallelYoung,
        Self::ParallelFull,
        Self::SerialYoung,
        Self::SerialFull,
        Self::CmsInitialMark,
        Self::CmsRemark,
        Self::CmsConcurrent,
        Self::ShenandoahPause,
        Self::ZPause,
        Self::Safepoint,
        Self::ApplicationStopped,
        Self::Header,
        Self::HeapAtGc,
        Self::Blank,
    ];

    /// String form used in rule files and output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::UnifiedYoung => "young_pause",
            Self::UnifiedMixed => "mixed_pause",
            Self::UnifiedFull => "full_pause",
            Self::UnifiedRemark => "remark_pause",
            Self::UnifiedCleanup => "cleanup_pause",
            Self::G1YoungPause => "g1_young_pause",
            Self::G1MixedPause => "g1_mixed_pause",
            Self::G1FullGc => "g1_full_gc",
            Self::G1Remark => "g1_remark",
            Self::G1Cleanup => "g1_cleanup",
            Self::G1ConcurrentCycle => "g1_concurrent_cycle",
            Self::ParallelYoung => "parallel_young",
            Self::ParallelFull => "parallel_full",
            Self::SerialYoung => "serial_young",
            Self::SerialFull => "serial_full",
            Self::CmsInitialMark => "cms_initial_mark",
            Self::CmsRemark => "cms_remark",
            Self::CmsConcurrent => "cms_concurrent",
            Self::ShenandoahPause => "shenandoah_pause",
            Self::ZPause => "z_pause",
            Self::Safepoint => "safepoint",
            Self::ApplicationStopped => "application_stopped",
            Self::Header => "header",
            Self::HeapAtGc => "heap_at_gc",
            Self::Blank => "blank",
        }
    }

    /// Whether events of this kind stop application threads and therefore
    /// take part in timing reconciliation.
    ///
    /// Concurrent phases and informational lines pass through untouched.
    #[must_use]
    pub const fn is_pause(&self) -> bool {
        !matches!(
            self,
            Self::G1ConcurrentCycle
                | Self::CmsConcurrent
                | Self::Header
                | Self::HeapAtGc
                | Self::Blank
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = UnknownEventKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEventKind(s.to_string()))
    }
}

impl Serialize for EventKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Error type for unknown event kind strings.
#[derive(Debug, Clone)]
pub struct UnknownEventKind(String);

impl fmt::Display for UnknownEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown event kind: {}", self.0)
    }
}

impl std::error::Error for UnknownEventKind {}
