use crate::domain::model::LevelDefinition;
use crate::utils::error::{LevelUpError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// How `next_level_experience` values are read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// The value on level N is the point total at which level N is reached.
    #[default]
    Absolute,
    /// The value on level N is the gap from level N to the next level;
    /// thresholds are the running sum of the gaps below.
    Incremental,
}

/// Ordered level definitions. Level 1 always exists and is reached at 0 points.
#[derive(Debug, Clone, PartialEq)]
pub struct LevelTable {
    mode: ThresholdMode,
    levels: BTreeMap<u32, Option<u64>>,
}

impl Default for LevelTable {
    fn default() -> Self {
        Self::new(ThresholdMode::default())
    }
}

impl LevelTable {
    pub fn new(mode: ThresholdMode) -> Self {
        let mut levels = BTreeMap::new();
        levels.insert(1, None);
        Self { mode, levels }
    }

    pub fn with_definitions<I>(mode: ThresholdMode, definitions: I) -> Result<Self>
    where
        I: IntoIterator<Item = LevelDefinition>,
    {
        let mut table = Self::new(mode);
        table.add_many(definitions)?;
        Ok(table)
    }

    /// Reads `level,next_level_experience` rows.
    pub fn from_csv_reader<R: Read>(mode: ThresholdMode, reader: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut definitions = Vec::new();
        for row in csv_reader.deserialize::<LevelDefinition>() {
            definitions.push(row?);
        }

        tracing::debug!("Loaded {} level definitions from CSV", definitions.len());
        Self::with_definitions(mode, definitions)
    }

    pub fn from_csv_path<P: AsRef<Path>>(mode: ThresholdMode, path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(mode, file)
    }

    pub fn mode(&self) -> ThresholdMode {
        self.mode
    }

    /// Registers a level, overwriting any previous value for the same number.
    pub fn add(&mut self, level: u32, next_level_experience: Option<u64>) -> Result<()> {
        if level == 0 {
            return Err(LevelUpError::InvalidLevel {
                level,
                reason: "levels start at 1".to_string(),
            });
        }
        self.levels.insert(level, next_level_experience);
        Ok(())
    }

    pub fn add_many<I>(&mut self, definitions: I) -> Result<()>
    where
        I: IntoIterator<Item = LevelDefinition>,
    {
        for definition in definitions {
            self.add(definition.level, definition.next_level_experience)?;
        }
        Ok(())
    }

    pub fn contains(&self, level: u32) -> bool {
        self.levels.contains_key(&level)
    }

    pub fn threshold_for(&self, level: u32) -> Option<u64> {
        self.levels.get(&level).copied().flatten()
    }

    pub fn definitions(&self) -> impl Iterator<Item = LevelDefinition> + '_ {
        self.levels
            .iter()
            .map(|(&level, &next)| LevelDefinition::new(level, next))
    }

    /// Highest level a subject can actually reach.
    pub fn max_level(&self) -> u32 {
        self.reachable()
            .last()
            .map(|&(level, _)| level)
            .unwrap_or(1)
    }

    pub fn cumulative_threshold(&self, level: u32) -> Option<u64> {
        self.reachable()
            .into_iter()
            .find(|&(l, _)| l == level)
            .map(|(_, threshold)| threshold)
    }

    pub fn level_for_points(&self, points: u64) -> u32 {
        self.level_for_points_capped(points, None)
    }

    /// Same as `level_for_points` but never above `cap`.
    pub fn level_for_points_capped(&self, points: u64, cap: Option<u32>) -> u32 {
        let mut current = 1;
        for (level, threshold) in self.reachable() {
            if threshold > points || cap.is_some_and(|cap| level > cap) {
                break;
            }
            current = level;
        }
        current
    }

    /// Points still missing to reach the level after `current_level`.
    /// `None` when `current_level` is already the highest reachable level.
    pub fn next_level_gap(&self, current_level: u32, current_points: u64) -> Option<u64> {
        self.next_level(current_level)
            .map(|(_, threshold)| threshold.saturating_sub(current_points))
    }

    pub fn next_level(&self, current_level: u32) -> Option<(u32, u64)> {
        self.reachable()
            .into_iter()
            .find(|&(level, _)| level > current_level)
    }

    /// Percentage of the way from `current_level` to the next one, 100 at max level.
    pub fn progress_percent(&self, current_level: u32, current_points: u64) -> f64 {
        let floor = self.cumulative_threshold(current_level).unwrap_or(0);
        let Some((_, ceiling)) = self.next_level(current_level) else {
            return 100.0;
        };
        if ceiling <= floor {
            return 100.0;
        }

        let earned = current_points.saturating_sub(floor) as f64;
        let span = (ceiling - floor) as f64;
        (earned / span * 100.0).clamp(0.0, 100.0)
    }

    /// Levels passed through when moving from `from` to `to`, in travel order, excluding `from`.
    pub fn crossed_levels(&self, from: u32, to: u32) -> Vec<u32> {
        let reachable = self.reachable();
        if to > from {
            reachable
                .iter()
                .map(|&(level, _)| level)
                .filter(|&level| level > from && level <= to)
                .collect()
        } else if to < from {
            reachable
                .iter()
                .rev()
                .map(|&(level, _)| level)
                .filter(|&level| level >= to && level < from)
                .collect()
        } else {
            Vec::new()
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut previous: Option<(u32, u64)> = None;
        for (level, threshold) in self.reachable() {
            if let Some((prev_level, prev_threshold)) = previous {
                if threshold < prev_threshold {
                    return Err(LevelUpError::InvalidLevel {
                        level,
                        reason: format!(
                            "threshold {} is lower than level {} threshold {}",
                            threshold, prev_level, prev_threshold
                        ),
                    });
                }
            }
            previous = Some((level, threshold));
        }

        let max = self.max_level();
        if let Some((&orphan, _)) = self.levels.range(max + 1..).next() {
            tracing::warn!(
                "Level {} and above can never be reached; level {} is the maximum",
                orphan,
                max
            );
        }
        Ok(())
    }

    // (level, cumulative threshold) for every reachable level, ascending
    fn reachable(&self) -> Vec<(u32, u64)> {
        let mut out = Vec::with_capacity(self.levels.len());
        let mut running: u64 = 0;

        for (&level, &value) in &self.levels {
            match self.mode {
                ThresholdMode::Absolute => {
                    let threshold = match (level, value) {
                        (1, _) => 0,
                        (_, Some(points)) => points,
                        (_, None) => break,
                    };
                    out.push((level, threshold));
                }
                ThresholdMode::Incremental => {
                    out.push((level, running));
                    match value.and_then(|gap| running.checked_add(gap)) {
                        Some(next) => running = next,
                        None => break,
                    }
                }
            }
        }
        out
    }
}
