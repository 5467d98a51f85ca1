//! Utility modules for the archiver.

pub mod errors;
pub mod format;
pub mod logger;
pub mod process;

pub use errors::{ArchiverError, Result};

/// Number of worker threads handed to xtrabackup.
///
/// Positive values are taken as-is, zero means every core and negative values
/// leave that many cores unused. Never returns less than one.
pub fn calc_parallelism(desired: i32) -> usize {
    calc_parallelism_for(desired, num_cpus::get())
}

fn calc_parallelism_for(desired: i32, cores: usize) -> usize {
    if desired > 0 {
        return desired as usize;
    }
    let remaining = cores as i64 + i64::from(desired);
    if remaining > 0 {
        remaining as usize
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calc_parallelism() {
        assert_eq!(calc_parallelism_for(4, 16), 4);
        assert_eq!(calc_parallelism_for(0, 8), 8);
        assert_eq!(calc_parallelism_for(-2, 8), 6);
        assert_eq!(calc_parallelism_for(-8, 8), 1);
        assert_eq!(calc_parallelism_for(-20, 8), 1);
        assert!(calc_parallelism(0) >= 1);
    }
}
