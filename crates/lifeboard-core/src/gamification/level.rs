//! Level curve: XP thresholds per level.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// XP needed to reach levels 1..=20. Level 1 starts at 0 XP.
pub const DEFAULT_THRESHOLDS: [u64; 20] = [
    0, 100, 250, 450, 700, 1_000, 1_400, 1_900, 2_500, 3_200, 4_000, 5_000, 6_200, 7_600, 9_200,
    11_000, 13_000, 15_500, 18_500, 22_000,
];

/// What happens once XP passes the last table entry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelOverflow {
    /// Every further level costs the table's final gap.
    #[default]
    Linear,
    /// Level stops at the table length.
    Capped,
}

/// Ascending XP thresholds indexed by level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelCurve {
    thresholds: Vec<u64>,
    overflow: LevelOverflow,
}

impl LevelCurve {
    /// Build a curve from explicit thresholds.
    ///
    /// # Errors
    /// The table needs at least two entries, must start at 0 and must be
    /// strictly ascending.
    pub fn new(thresholds: Vec<u64>, overflow: LevelOverflow) -> Result<Self, ValidationError> {
        if thresholds.len() < 2 {
            return Err(ValidationError::invalid_value(
                "levels.thresholds",
                "at least two levels are required",
            ));
        }
        if thresholds[0] != 0 {
            return Err(ValidationError::invalid_value(
                "levels.thresholds",
                "level 1 must start at 0 XP",
            ));
        }
        if thresholds.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ValidationError::invalid_value(
                "levels.thresholds",
                "thresholds must be strictly ascending",
            ));
        }
        Ok(Self {
            thresholds,
            overflow,
        })
    }

    /// The built-in 20-level table with linear continuation.
    pub fn standard() -> Self {
        Self {
            thresholds: DEFAULT_THRESHOLDS.to_vec(),
            overflow: LevelOverflow::Linear,
        }
    }

    pub fn with_overflow(mut self, overflow: LevelOverflow) -> Self {
        self.overflow = overflow;
        self
    }

    pub fn overflow(&self) -> LevelOverflow {
        self.overflow
    }

    /// Highest level defined by the table itself.
    pub fn table_levels(&self) -> u32 {
        self.thresholds.len() as u32
    }

    fn top(&self) -> u64 {
        self.thresholds[self.thresholds.len() - 1]
    }

    fn overflow_step(&self) -> u64 {
        let n = self.thresholds.len();
        self.thresholds[n - 1] - self.thresholds[n - 2]
    }

    /// XP at which `level` begins, or `None` past a capped table.
    pub fn threshold(&self, level: u32) -> Option<u64> {
        if level == 0 {
            return None;
        }
        let table = self.table_levels();
        if level <= table {
            return Some(self.thresholds[(level - 1) as usize]);
        }
        match self.overflow {
            LevelOverflow::Capped => None,
            LevelOverflow::Linear => u64::from(level - table)
                .checked_mul(self.overflow_step())
                .and_then(|extra| self.top().checked_add(extra)),
        }
    }

    /// Highest level whose threshold is `<= xp`.
    pub fn level_for_xp(&self, xp: u64) -> u32 {
        // thresholds[0] == 0, so at least one entry is always <= xp
        let in_table = self.thresholds.partition_point(|t| *t <= xp) as u32;
        if in_table < self.table_levels() || self.overflow == LevelOverflow::Capped {
            return in_table;
        }
        let extra = (xp - self.top()) / self.overflow_step();
        in_table.saturating_add(u32::try_from(extra).unwrap_or(u32::MAX))
    }

    /// Threshold of `level + 1`; the top threshold once a capped table is exhausted.
    pub fn xp_for_next_level(&self, level: u32) -> u64 {
        self.threshold(level.saturating_add(1))
            .unwrap_or_else(|| self.top())
    }
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::standard()
    }
}
