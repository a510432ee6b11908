//! Pause trigger reasons, the usual aggregation key for collections.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Why the JVM started a collection.
///
/// Parsing never fails: text that matches no known reason is kept verbatim in
/// [`Trigger::Other`] so new JVM releases do not break aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Trigger {
    AllocationFailure,
    G1EvacuationPause,
    G1HumongousAllocation,
    G1PreventiveCollection,
    SystemGc,
    MetadataGcThreshold,
    GcLockerInitiatedGc,
    Ergonomics,
    HeapDumpInitiatedGc,
    HeapInspectionInitiatedGc,
    EvacuationFailure,
    LastDitchCollection,
    AllocationStall,
    AllocationRate,
    Proactive,
    Warmup,
    Timer,
    DiagnosticCommand,
    CmsInitialMark,
    CmsFinalRemark,
    ConcurrentStart,
    Other(String),
}

impl Trigger {
    /// Maps the parenthesised reason text from a log line to a trigger.
    pub fn from_log_text(text: &str) -> Self {
        match text.trim() {
            "Allocation Failure" => Self::AllocationFailure,
            "G1 Evacuation Pause" => Self::G1EvacuationPause,
            "G1 Humongous Allocation" => Self::G1HumongousAllocation,
            "G1 Preventive Collection" => Self::G1PreventiveCollection,
            "System.gc()" | "System.gc" => Self::SystemGc,
            "Metadata GC Threshold" | "Metadata GC Clear Soft References" => {
                Self::MetadataGcThreshold
            }
            "GCLocker Initiated GC" => Self::GcLockerInitiatedGc,
            "Ergonomics" => Self::Ergonomics,
            "Heap Dump Initiated GC" => Self::HeapDumpInitiatedGc,
            "Heap Inspection Initiated GC" => Self::HeapInspectionInitiatedGc,
            "Evacuation Failure" | "To-space exhausted" | "to-space exhausted" => {
                Self::EvacuationFailure
            }
            "Last ditch collection" => Self::LastDitchCollection,
            "Allocation Stall" => Self::AllocationStall,
            "Allocation Rate" => Self::AllocationRate,
            "Proactive" => Self::Proactive,
            "Warmup" => Self::Warmup,
            "Timer" => Self::Timer,
            "Diagnostic Command" => Self::DiagnosticCommand,
            "CMS Initial Mark" => Self::CmsInitialMark,
            "CMS Final Remark" => Self::CmsFinalRemark,
            "Concurrent Start" => Self::ConcurrentStart,
            other => Self::Other(other.to_string()),
        }
    }

    /// Canonical text, matching the JVM's own wording.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AllocationFailure => "Allocation Failure",
            Self::G1EvacuationPause => "G1 Evacuation Pause",
            Self::G1HumongousAllocation => "G1 Humongous Allocation",
            Self::G1PreventiveCollection => "G1 Preventive Collection",
            Self::SystemGc => "System.gc()",
            Self::MetadataGcThreshold => "Metadata GC Threshold",
            Self::GcLockerInitiatedGc => "GCLocker Initiated GC",
            Self::Ergonomics => "Ergonomics",
            Self::HeapDumpInitiatedGc => "Heap Dump Initiated GC",
            Self::HeapInspectionInitiatedGc => "Heap Inspection Initiated GC",
            Self::EvacuationFailure => "Evacuation Failure",
            Self::LastDitchCollection => "Last ditch collection",
            Self::AllocationStall => "Allocation Stall",
            Self::AllocationRate => "Allocation Rate",
            Self::Proactive => "Proactive",
            Self::Warmup => "Warmup",
            Self::Timer => "Timer",
            Self::DiagnosticCommand => "Diagnostic Command",
            Self::CmsInitialMark => "CMS Initial Mark",
            Self::CmsFinalRemark => "CMS Final Remark",
            Self::ConcurrentStart => "Concurrent Start",
            Self::Other(text) => text,
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Trigger {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Trigger {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from_log_text(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_reasons_roundtrip_through_text() {
        for text in [
            "Allocation Failure",
            "G1 Evacuation Pause",
            "System.gc()",
            "Metadata GC Threshold",
            "Allocation Stall",
            "Concurrent Start",
        ] {
            let trigger = Trigger::from_log_text(text);
            assert!(!matches!(trigger, Trigger::Other(_)), "{text} not recognised");
            assert_eq!(trigger.as_str(), text);
        }
    }

    #[test]
    fn aliases_collapse_to_one_trigger() {
        assert_eq!(
            Trigger::from_log_text("To-space exhausted"),
            Trigger::EvacuationFailure
        );
        assert_eq!(Trigger::from_log_text(" System.gc "), Trigger::SystemGc);
    }

    #[test]
    fn unrecognised_text_is_kept() {
        let trigger = Trigger::from_log_text("Made Up Cause");
        assert_eq!(trigger, Trigger::Other("Made Up Cause".to_string()));
        assert_eq!(trigger.to_string(), "Made Up Cause");
    }
}
