use std::io;

use thiserror::Error;

use crate::circuit::{CircuitError, Nanos};
use crate::config::ConfigError;

/// the circuit wouldn't take the clock/reset drive
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SequencerFault {
    #[error("port `{port}` did not follow the driven level within {waited_ns}ns")]
    NotResponding { port: String, waited_ns: Nanos },
    #[error("driving port `{port}` failed: {source}")]
    Drive {
        port: String,
        #[source]
        source: CircuitError,
    },
}

/// fatal errors; anything that ends a run early
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("sequencer fault: {0}")]
    Sequencer(#[from] SequencerFault),
    #[error("could not open {resource}: {source}")]
    ResourceAcquisition {
        resource: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("display surface failed: {source}")]
    Surface {
        #[source]
        source: io::Error,
    },
}
