use serde::{Deserialize, Serialize};

/// Priority tier a free-text priority label maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityTier {
    Critical,
    High,
    Medium,
    Low,
}

impl PriorityTier {
    /// Classify a priority label, ignoring case. Unrecognized labels are medium.
    ///
    /// Handles plain names (`High`), tracker names (`Highest`, `Minor`),
    /// P-codes (`P1`) and ITSM style labels (`1 - Critical`).
    pub fn classify(priority: &str) -> Self {
        let p = priority.trim().to_lowercase();
        if let Some(tier) = Self::from_exact(&p) {
            return tier;
        }
        p.split(|c: char| !c.is_ascii_alphanumeric())
            .filter(|t| !t.is_empty())
            .find_map(Self::from_word)
            .unwrap_or(PriorityTier::Medium)
    }

    fn from_exact(p: &str) -> Option<Self> {
        match p {
            "critical" | "p1" | "1" | "highest" | "urgent" | "blocker" => Some(PriorityTier::Critical),
            "high" | "p2" | "2" | "major" => Some(PriorityTier::High),
            "medium" | "p3" | "3" | "normal" | "moderate" => Some(PriorityTier::Medium),
            "low" | "p4" | "p5" | "4" | "5" | "lowest" | "minor" | "trivial" | "planning" => {
                Some(PriorityTier::Low)
            }
            _ => None,
        }
    }

    fn from_word(word: &str) -> Option<Self> {
        match word {
            "critical" | "urgent" => Some(PriorityTier::Critical),
            "high" => Some(PriorityTier::High),
            "medium" | "moderate" => Some(PriorityTier::Medium),
            "low" => Some(PriorityTier::Low),
            _ => None,
        }
    }
}

/// Resolution targets per priority tier, in hours.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPolicy {
    pub critical_hours: f64,
    pub high_hours: f64,
    pub medium_hours: f64,
    pub low_hours: f64,
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            critical_hours: 4.0,
            high_hours: 8.0,
            medium_hours: 24.0,
            low_hours: 48.0,
        }
    }
}

impl SlaPolicy {
    pub fn threshold_hours(&self, priority: &str) -> f64 {
        match PriorityTier::classify(priority) {
            PriorityTier::Critical => self.critical_hours,
            PriorityTier::High => self.high_hours,
            PriorityTier::Medium => self.medium_hours,
            PriorityTier::Low => self.low_hours,
        }
    }

    pub fn threshold_minutes(&self, priority: &str) -> f64 {
        self.threshold_hours(priority) * 60.0
    }

    /// Whether a resolution time meets the target for `priority`.
    pub fn is_within(&self, priority: &str, resolution_minutes: f64) -> bool {
        resolution_minutes <= self.threshold_minutes(priority)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_case_insensitive() {
        assert_eq!(PriorityTier::classify("CRITICAL"), PriorityTier::Critical);
        assert_eq!(PriorityTier::classify("high"), PriorityTier::High);
        assert_eq!(PriorityTier::classify(" Medium "), PriorityTier::Medium);
        assert_eq!(PriorityTier::classify("Low"), PriorityTier::Low);
    }

    #[test]
    fn test_classify_variants() {
        assert_eq!(PriorityTier::classify("P1"), PriorityTier::Critical);
        assert_eq!(PriorityTier::classify("Highest"), PriorityTier::Critical);
        assert_eq!(PriorityTier::classify("1 - Critical"), PriorityTier::Critical);
        assert_eq!(PriorityTier::classify("2-High"), PriorityTier::High);
        assert_eq!(PriorityTier::classify("Minor"), PriorityTier::Low);
    }

    #[test]
    fn test_unmatched_defaults_to_medium() {
        assert_eq!(PriorityTier::classify("Unknown"), PriorityTier::Medium);
        assert_eq!(PriorityTier::classify(""), PriorityTier::Medium);
        assert_eq!(SlaPolicy::default().threshold_hours("whatever"), 24.0);
    }

    #[test]
    fn test_thresholds_in_minutes() {
        let sla = SlaPolicy::default();
        assert_eq!(sla.threshold_minutes("critical"), 240.0);
        assert_eq!(sla.threshold_minutes("High"), 480.0);
        assert_eq!(sla.threshold_minutes("low"), 2880.0);
        assert!(sla.is_within("critical", 240.0));
        assert!(!sla.is_within("critical", 240.5));
    }
}
