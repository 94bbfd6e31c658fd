//! Ticket numbering
//!
//! Issues ticket numbers and tracks every number handed out. The used set
//! keeps numbers of deleted tickets too, so a freshly deleted number is not
//! reissued right away.

use crate::error::ValidationError;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Smallest random draw
pub const RANDOM_MIN: u32 = 10;
/// Largest random draw
pub const RANDOM_MAX: u32 = 99;
/// Default bound on random draws before falling back
pub const DEFAULT_MAX_ATTEMPTS: u32 = 500;

/// How new ticket numbers are chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NumberingMode {
    /// Uniform two-digit draw avoiding used numbers
    #[default]
    Random,
    /// One past the largest used number
    Sequential,
}

/// Numbering policy with its used-number set
#[derive(Debug, Clone)]
pub struct NumberingPolicy {
    mode: NumberingMode,
    used: BTreeSet<u32>,
    max_attempts: u32,
    rng: StdRng,
}

impl NumberingPolicy {
    /// Create policy seeded from the OS
    #[must_use]
    pub fn new(mode: NumberingMode) -> Self {
        Self {
            mode,
            used: BTreeSet::new(),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            rng: StdRng::from_os_rng(),
        }
    }

    /// Use a deterministic generator
    #[inline]
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Bound random draws
    #[inline]
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Current mode
    #[inline]
    #[must_use]
    pub fn mode(&self) -> NumberingMode {
        self.mode
    }

    /// Switch mode; the used set is kept
    #[inline]
    pub fn set_mode(&mut self, mode: NumberingMode) {
        self.mode = mode;
    }

    /// Mark numbers as used, e.g. after loading tickets
    pub fn seed_used(&mut self, numbers: impl IntoIterator<Item = u32>) {
        self.used.extend(numbers);
    }

    /// Forget every number
    #[inline]
    pub fn clear(&mut self) {
        self.used.clear();
    }

    /// Check if a number has been issued
    #[inline]
    #[must_use]
    pub fn is_used(&self, number: u32) -> bool {
        self.used.contains(&number)
    }

    /// Used numbers in ascending order
    pub fn used(&self) -> impl Iterator<Item = u32> + '_ {
        self.used.iter().copied()
    }

    /// Issue the next number and mark it used
    pub fn next_number(&mut self) -> u32 {
        let number = match self.mode {
            NumberingMode::Random => self.draw_random(),
            NumberingMode::Sequential => self.next_sequential(),
        };
        self.used.insert(number);
        number
    }

    /// Validate a manually chosen number
    ///
    /// `previous` is the number the ticket holds today, which it may keep.
    ///
    /// # Errors
    /// - `ValidationError::InvalidNumber` for zero
    /// - `ValidationError::DuplicateNumber` if already used
    pub fn validate(&self, candidate: u32, previous: Option<u32>) -> Result<(), ValidationError> {
        if candidate == 0 {
            return Err(ValidationError::InvalidNumber(candidate));
        }
        if previous != Some(candidate) && self.used.contains(&candidate) {
            return Err(ValidationError::DuplicateNumber(candidate));
        }
        Ok(())
    }

    /// Claim a number for a new ticket
    ///
    /// # Errors
    /// Same as [`NumberingPolicy::validate`] with no previous number.
    pub fn claim(&mut self, number: u32) -> Result<(), ValidationError> {
        self.validate(number, None)?;
        self.used.insert(number);
        Ok(())
    }

    /// Return a claimed number whose ticket was never created
    #[inline]
    pub fn release(&mut self, number: u32) {
        self.used.remove(&number);
    }

    /// Swap a ticket's number for a new one
    ///
    /// # Errors
    /// Same as [`NumberingPolicy::validate`].
    pub fn replace(&mut self, previous: u32, number: u32) -> Result<(), ValidationError> {
        self.validate(number, Some(previous))?;
        self.used.remove(&previous);
        self.used.insert(number);
        Ok(())
    }

    fn next_sequential(&self) -> u32 {
        self.used
            .last()
            .copied()
            .unwrap_or(0)
            .saturating_add(1)
    }

    fn draw_random(&mut self) -> u32 {
        for _ in 0..self.max_attempts {
            let candidate = self.rng.random_range(RANDOM_MIN..=RANDOM_MAX);
            if !self.used.contains(&candidate) {
                return candidate;
            }
        }

        // Range exhausted; issue past the max.
        let fallback = self.next_sequential();
        tracing::warn!(
            attempts = self.max_attempts,
            fallback,
            "random ticket numbers exhausted, issuing sequential number"
        );
        fallback
    }
}

impl Default for NumberingPolicy {
    fn default() -> Self {
        Self::new(NumberingMode::default())
    }
}
