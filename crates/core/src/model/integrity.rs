use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrityFlagKind {
    TabSwitch,
    Paste,
}

/// Passively detected suspicious-behaviour event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityFlag {
    pub kind: IntegrityFlagKind,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Visible,
    Hidden,
}

/// Raw signal coming from the host environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegritySignal {
    VisibilityChanged(Visibility),
    Paste,
}

impl IntegritySignal {
    /// Flag kind this signal produces, if any. Becoming visible again is not suspicious.
    #[must_use]
    pub fn flag_kind(self) -> Option<IntegrityFlagKind> {
        match self {
            IntegritySignal::VisibilityChanged(Visibility::Hidden) => {
                Some(IntegrityFlagKind::TabSwitch)
            }
            IntegritySignal::VisibilityChanged(Visibility::Visible) => None,
            IntegritySignal::Paste => Some(IntegrityFlagKind::Paste),
        }
    }
}

/// Per-kind totals surfaced in the report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityCounts {
    pub tab_switches: u32,
    pub pastes: u32,
}

impl IntegrityCounts {
    #[must_use]
    pub fn total(&self) -> u32 {
        self.tab_switches.saturating_add(self.pastes)
    }
}

/// Append-only list of flags for one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityLog {
    flags: Vec<IntegrityFlag>,
}

impl IntegrityLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: IntegrityFlagKind, at: DateTime<Utc>) {
        self.flags.push(IntegrityFlag { kind, at });
    }

    #[must_use]
    pub fn flags(&self) -> &[IntegrityFlag] {
        &self.flags
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.flags.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    #[must_use]
    pub fn counts(&self) -> IntegrityCounts {
        self.flags
            .iter()
            .fold(IntegrityCounts::default(), |mut counts, flag| {
                match flag.kind {
                    IntegrityFlagKind::TabSwitch => {
                        counts.tab_switches = counts.tab_switches.saturating_add(1);
                    }
                    IntegrityFlagKind::Paste => counts.pastes = counts.pastes.saturating_add(1),
                }
                counts
            })
    }
}
