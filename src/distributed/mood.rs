//! Worker selection policies
//!
//! A mood decides which available slots a worker is willing to try and in
//! what order. Moods never bypass coordinator arbitration; they only shape
//! the list of WANT_JOB requests a worker sends after each snapshot.

use crate::job::{Job, JobTable};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attributes below this count as acceptable for the avoiding moods
pub const AVOID_THRESHOLD: u8 = 3;

/// Values above this count as acceptable for the value-seeking mood
pub const VALUE_THRESHOLD: u16 = 40;

/// Job selection mood
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mood {
    /// Only jobs with heavy < 3
    AvoidHeavy,
    /// Only jobs with dirty < 3
    AvoidDirty,
    /// Only jobs with slow < 3
    AvoidSlow,
    /// Any job, highest slot first
    Cooperative,
    /// Only jobs worth more than 40
    PreferHighValue,
}

impl Mood {
    pub const ALL: [Mood; 5] = [
        Mood::AvoidHeavy,
        Mood::AvoidDirty,
        Mood::AvoidSlow,
        Mood::Cooperative,
        Mood::PreferHighValue,
    ];

    /// Pick a mood uniformly at random
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        // ALL is non-empty, so choose always yields
        *Self::ALL.choose(rng).unwrap_or(&Mood::Cooperative)
    }

    /// Whether this mood would accept `job` on its attributes alone
    pub fn accepts(self, job: &Job) -> bool {
        match self {
            Mood::AvoidHeavy => job.heavy() < AVOID_THRESHOLD,
            Mood::AvoidDirty => job.dirty() < AVOID_THRESHOLD,
            Mood::AvoidSlow => job.slow() < AVOID_THRESHOLD,
            Mood::Cooperative => true,
            Mood::PreferHighValue => job.value() > VALUE_THRESHOLD,
        }
    }

    /// Slots to try, in order, given a snapshot
    ///
    /// Only NotStarted jobs are considered. Cooperative scans from the last
    /// slot down; every other mood scans upward.
    pub fn candidates(self, table: &JobTable) -> Vec<usize> {
        let eligible = table
            .jobs()
            .iter()
            .filter(|job| job.is_available() && self.accepts(job))
            .map(|job| job.slot());

        match self {
            Mood::Cooperative => eligible.rev().collect(),
            _ => eligible.collect(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mood::AvoidHeavy => "avoid-heavy",
            Mood::AvoidDirty => "avoid-dirty",
            Mood::AvoidSlow => "avoid-slow",
            Mood::Cooperative => "cooperative",
            Mood::PreferHighValue => "prefer-high-value",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    /// Table where slot i has slow = dirty = heavy = (i % 5) + 1
    fn graded_table() -> JobTable {
        let jobs = std::array::from_fn(|slot| {
            let level = (slot % 5) as u8 + 1;
            Job::new(slot as u16, level, level, level).unwrap()
        });
        JobTable::from_jobs(jobs).unwrap()
    }

    #[test]
    fn test_avoiding_moods_filter_ascending() {
        let table = graded_table();
        // Levels 1 and 2 pass the < 3 filter: slots 0, 1, 5, 6
        for mood in [Mood::AvoidHeavy, Mood::AvoidDirty, Mood::AvoidSlow] {
            assert_eq!(mood.candidates(&table), vec![0, 1, 5, 6], "{}", mood);
        }
    }

    #[test]
    fn test_prefer_high_value() {
        let table = graded_table();
        // Level 5 gives 5 × 10 = 50; level 4 gives 4 × 8 = 32
        assert_eq!(Mood::PreferHighValue.candidates(&table), vec![4, 9]);
    }

    #[test]
    fn test_cooperative_scans_in_reverse() {
        let mut table = graded_table();
        table.claim(9, 0).unwrap();
        table.claim(3, 1).unwrap();

        assert_eq!(
            Mood::Cooperative.candidates(&table),
            vec![8, 7, 6, 5, 4, 2, 1, 0]
        );
    }

    #[test]
    fn test_candidates_skip_unavailable() {
        let mut table = graded_table();
        table.claim(0, 1).unwrap();
        table.claim(5, 1).unwrap();
        table.complete(5, 1).unwrap();

        assert_eq!(Mood::AvoidSlow.candidates(&table), vec![1, 6]);
        assert!(table.iter().any(|job| job.status() == JobStatus::Complete));
    }

    #[test]
    fn test_random_covers_every_mood() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(Mood::random(&mut rng));
        }
        assert_eq!(seen.len(), Mood::ALL.len());
    }

    #[test]
    fn test_mood_names() {
        for mood in Mood::ALL {
            assert_eq!(mood.to_string(), mood.as_str());
        }
        assert_eq!(Mood::PreferHighValue.as_str(), "prefer-high-value");
    }
}
