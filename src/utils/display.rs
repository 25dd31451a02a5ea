//! Utilities related to displaying things.

use std::fmt;

use num_format::Locale;
use num_format::ToFormattedString;
use tracing::info;

use crate::utils::args::NumberOfRecords;

/// How often, in records, progress is logged by default.
pub const DEFAULT_LOG_EVERY: usize = 1_000_000;

/// Displays a part of a whole as a percentage. The first item is the
/// numerator and the second item is the denominator.
pub struct PercentageFormat(pub usize, pub usize);

impl fmt::Display for PercentageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.1 == 0 {
            f.write_str("N/A")
        } else {
            let (a, b) = (self.0 as f64, self.1 as f64);
            write!(f, "{:.2}%", a / b * 100.0)
        }
    }
}

/// Displays a count with thousands separators.
pub struct CountFormat(pub usize);

impl fmt::Display for CountFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.to_formatted_string(&Locale::en))
    }
}

/// Uniformly counts and reports the number of records processed.
#[derive(Debug)]
pub struct RecordCounter {
    /// The number of records processed.
    count: usize,

    /// The number of records to log every.
    log_every: usize,
}

impl Default for RecordCounter {
    fn default() -> Self {
        RecordCounter::new(None)
    }
}

impl RecordCounter {
    /// Creates a new `RecordCounter` that logs every `log_every` records
    /// ([`DEFAULT_LOG_EVERY`] if `None`).
    pub fn new(log_every: Option<usize>) -> Self {
        RecordCounter {
            count: 0,
            log_every: log_every.unwrap_or(DEFAULT_LOG_EVERY).max(1),
        }
    }

    /// Gets the current number of records counted.
    pub fn get(&self) -> usize {
        self.count
    }

    /// Increments the counter and reports the number of records processed (if
    /// appropriate).
    pub fn inc(&mut self) {
        self.count += 1;

        if self.count % self.log_every == 0 {
            info!("  [*] Processed {} records.", CountFormat(self.count));
        }
    }

    /// Indicates whether a record loop should stop because `limit` records
    /// have been processed.
    pub fn time_to_break(&self, limit: &NumberOfRecords) -> bool {
        match limit {
            NumberOfRecords::Some(v) => self.count >= *v,
            NumberOfRecords::All => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_formats_percentages_and_counts() {
        assert_eq!(PercentageFormat(1, 8).to_string(), "12.50%");
        assert_eq!(PercentageFormat(1, 0).to_string(), "N/A");
        assert_eq!(CountFormat(1234567).to_string(), "1,234,567");
    }

    #[test]
    fn it_breaks_at_the_record_limit() {
        let mut counter = RecordCounter::new(Some(2));
        let limit = NumberOfRecords::from(Some(3));

        for _ in 0..2 {
            counter.inc();
            assert!(!counter.time_to_break(&limit));
        }

        counter.inc();
        assert_eq!(counter.get(), 3);
        assert!(counter.time_to_break(&limit));
        assert!(!counter.time_to_break(&NumberOfRecords::All));
    }
}
