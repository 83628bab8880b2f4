/// Seeded sampling: LCG-driven Fisher-Yates shuffle, then a prefix
///
/// The generator is the classic `seed = (seed * 9301 + 49297) mod 233280` sequence,
/// so a given seed always selects the same rows in the same order. The output
/// identity is keyed on the input id, seed and size, so repeated runs are equal
/// tables, not just equal rows.

use crate::types::{InsightError, SampleConfig, SampleSize, Table};

/// Linear congruential generator over `[0, 1)`.
#[derive(Debug, Clone)]
pub struct Lcg {
    state: u64,
}

impl Lcg {
    const MULTIPLIER: u64 = 9301;
    const INCREMENT: u64 = 49297;
    const MODULUS: u64 = 233_280;

    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self { state: seed % Self::MODULUS }
    }

    pub fn next_f64(&mut self) -> f64 {
        self.state = (self.state * Self::MULTIPLIER + Self::INCREMENT) % Self::MODULUS;
        self.state as f64 / Self::MODULUS as f64
    }

    /// Uniform index in `0..=upper`.
    pub fn next_index(&mut self, upper: usize) -> usize {
        let r = self.next_f64();
        ((r * (upper + 1) as f64) as usize).min(upper)
    }
}

pub struct SampleExecutor;

impl SampleExecutor {
    pub fn apply(table: &Table, config: &SampleConfig) -> Result<Table, InsightError> {
        let take = Self::sample_size(table.row_count(), &config.size)?;

        let mut order: Vec<usize> = (0..table.row_count()).collect();
        let mut rng = Lcg::new(config.seed);
        for i in (1..order.len()).rev() {
            let j = rng.next_index(i);
            order.swap(i, j);
        }

        let rows = order
            .into_iter()
            .take(take)
            .map(|i| table.rows[i].clone())
            .collect();
        let salt = format!("sample:{}:{:?}", config.seed, config.size);
        Ok(table.derive_keyed(&salt, table.columns.clone(), rows))
    }

    fn sample_size(row_count: usize, size: &SampleSize) -> Result<usize, InsightError> {
        match size {
            SampleSize::Count { count } => Ok((*count).min(row_count)),
            SampleSize::Percentage { percentage } => {
                if !(0.0..=100.0).contains(percentage) {
                    return Err(InsightError::InvalidOperation(format!(
                        "sample percentage {percentage} is outside 0..=100"
                    )));
                }
                Ok(((row_count as f64 * percentage / 100.0).floor() as usize).min(row_count))
            }
        }
    }
}
