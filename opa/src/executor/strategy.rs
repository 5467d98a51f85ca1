//! Backup strategies and the free-space preflight.

use std::fmt;

use crate::config::MainConfig;
use crate::{ArchiverError, Result};

/// How the backup is taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Plain copy into `<generation>/backup`, optionally prepared and archived.
    Regular { prepare: bool, archive: bool },
    /// xbstream with built-in compression written to `backup.xbstream`.
    StreamCompressed,
}

impl Strategy {
    pub fn from_config(main: &MainConfig) -> Self {
        if main.streamcompress {
            Strategy::StreamCompressed
        } else {
            Strategy::Regular {
                prepare: main.prepare,
                archive: main.tgz,
            }
        }
    }

    /// Free space needed, as a percentage of the source size.
    pub fn required_percent(&self) -> u64 {
        match self {
            Strategy::StreamCompressed => 30,
            Strategy::Regular { archive: false, .. } => 120,
            Strategy::Regular { archive: true, .. } => 150,
        }
    }

    /// Free space needed for `source_bytes`, rounded up.
    pub fn required_bytes(&self, source_bytes: u64) -> u64 {
        let required = u128::from(source_bytes) * u128::from(self.required_percent());
        u64::try_from(required.div_ceil(100)).unwrap_or(u64::MAX)
    }

    /// Fail with [`ArchiverError::InsufficientSpace`] when the backup would
    /// not fit. Equality passes.
    pub fn preflight(&self, source_bytes: u64, free_bytes: u64) -> Result<u64> {
        let required = self.required_bytes(source_bytes);

        // Exact comparison on the unrounded product
        let needed = u128::from(source_bytes) * u128::from(self.required_percent());
        if needed > u128::from(free_bytes) * 100 {
            return Err(ArchiverError::InsufficientSpace {
                required,
                available: free_bytes,
            });
        }

        Ok(required)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::StreamCompressed => write!(f, "streamcompress"),
            Strategy::Regular { prepare, archive } => {
                write!(f, "regular")?;
                if *prepare {
                    write!(f, "+prepare")?;
                }
                if *archive {
                    write!(f, "+tgz")?;
                }
                Ok(())
            }
        }
    }
}
