//! Client for the national NFS-e API (ADN) and the emission log.
//!
//! Transmission goes through [`NfseTransport`]: [`HttpTransport`] talks to
//! the API over mutual TLS with the signing certificate, [`DryRunTransport`]
//! simulates a successful emission without network access.

mod http;
mod log;
mod submit;
mod transport;

pub use http::HttpTransport;
pub use log::*;
pub use submit::{Submission, write_artifact};
pub use transport::*;

/// How much the pipeline reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Errors only.
    Silent,
    #[default]
    Normal,
    /// Debug events, including API response bodies.
    Verbose,
}

impl Verbosity {
    /// `--silent` wins over `--verbose`.
    pub fn from_flags(verbose: bool, silent: bool) -> Self {
        match (verbose, silent) {
            (_, true) => Self::Silent,
            (true, false) => Self::Verbose,
            (false, false) => Self::Normal,
        }
    }

    /// `tracing-subscriber` filter directive for this level.
    pub fn filter_directive(self) -> &'static str {
        match self {
            Self::Silent => "error",
            Self::Normal => "info",
            Self::Verbose => "debug",
        }
    }

    pub fn is_verbose(self) -> bool {
        self == Self::Verbose
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags() {
        assert_eq!(Verbosity::from_flags(false, false), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(true, false), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(true, true), Verbosity::Silent);
        assert_eq!(Verbosity::Verbose.filter_directive(), "debug");
    }
}
