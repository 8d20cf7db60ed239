use thiserror::Error;

// NB. times are simulated nanoseconds; region offsets and widths are bytes

/// simulated time in nanoseconds
pub type Nanos = u64;

/// how a region port may be accessed from the harness side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::Read | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::Write | Access::ReadWrite)
    }
}

/// what sits behind a named port of the circuit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Port {
    /// single-bit signal (reset, clk)
    Bit { writable: bool },
    /// memory-mapped slice of circuit state, fixed width in bytes
    Region { width: usize, access: Access },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CircuitError {
    #[error("circuit has no port named `{0}`")]
    UnknownPort(String),
    #[error("port `{0}` is not writable")]
    NotWritable(String),
    #[error("port `{0}` is not readable")]
    NotReadable(String),
    #[error("port `{port}` is a {actual}, not a {expected}")]
    WrongKind {
        port: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("write of {len} bytes at {offset} overruns port `{port}` ({width} bytes wide)")]
    OutOfRange {
        port: String,
        offset: usize,
        len: usize,
        width: usize,
    },
}

/// The simulated circuit as seen from the harness: a fixed capability set of
/// named single-bit ports and memory-mapped regions, plus a simulated clock of
/// its own. Nothing about the circuit's internals leaks through here, so any
/// target that can expose these ports is substitutable.
pub trait Circuit {
    /// describe the port called `name`, if there is one
    fn port(&self, name: &str) -> Option<Port>;

    /// drive a single-bit port to `level`
    fn drive(&mut self, name: &str, level: bool) -> Result<(), CircuitError>;

    /// read back the current level of a single-bit port
    fn sample(&self, name: &str) -> Result<bool, CircuitError>;

    /// get a r/o view of a whole memory-mapped region
    fn read_region(&self, name: &str) -> Result<&[u8], CircuitError>;

    /// write `data` into a memory-mapped region starting at `offset`
    fn write_region(&mut self, name: &str, offset: usize, data: &[u8])
        -> Result<(), CircuitError>;

    /// let `ns` of simulated time pass
    fn advance(&mut self, ns: Nanos);

    /// current simulated time
    fn now(&self) -> Nanos;
}

/// check that `name` exists and is a bit port we can drive
pub fn require_writable_bit(circuit: &impl Circuit, name: &str) -> Result<(), CircuitError> {
    match circuit.port(name) {
        Some(Port::Bit { writable: true }) => Ok(()),
        Some(Port::Bit { writable: false }) => Err(CircuitError::NotWritable(name.to_owned())),
        Some(Port::Region { .. }) => Err(CircuitError::WrongKind {
            port: name.to_owned(),
            expected: "bit",
            actual: "region",
        }),
        None => Err(CircuitError::UnknownPort(name.to_owned())),
    }
}

/// check that `name` is a region with at least `access`, and return its width
pub fn require_region(
    circuit: &impl Circuit,
    name: &str,
    access: Access,
) -> Result<usize, CircuitError> {
    match circuit.port(name) {
        Some(Port::Region { width, access: a }) => {
            if access.readable() && !a.readable() {
                Err(CircuitError::NotReadable(name.to_owned()))
            } else if access.writable() && !a.writable() {
                Err(CircuitError::NotWritable(name.to_owned()))
            } else {
                Ok(width)
            }
        }
        Some(Port::Bit { .. }) => Err(CircuitError::WrongKind {
            port: name.to_owned(),
            expected: "region",
            actual: "bit",
        }),
        None => Err(CircuitError::UnknownPort(name.to_owned())),
    }
}
