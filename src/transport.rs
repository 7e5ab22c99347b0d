use std::fmt;

/// Failure opening or maintaining the receiver device. Fatal to the
/// current session; the manager transitions to Error and re-raises.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportError {
    /// No serial port matched the configured device description.
    PortNotFound(String),
    /// The port was found but could not be opened or kept open.
    Device(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::PortNotFound(desc) => {
                write!(f, "no port found for {}", desc)
            }
            TransportError::Device(msg) => write!(f, "device error: {}", msg),
        }
    }
}

impl std::error::Error for TransportError {}

/// Lifecycle of the byte-framing layer that feeds the event channel.
///
/// Implementations own port discovery, open/close and line splitting; the
/// pipeline only drives start/stop and polls `is_listening` to resync its
/// connection state.
pub trait SentenceTransport {
    fn start(&mut self) -> Result<(), TransportError>;
    fn stop(&mut self);
    fn is_listening(&self) -> bool;
}

/// Scriptable transport for tests and the simulated demo binary.
pub struct MockTransport {
    description: String,
    listening: bool,
    fail_start: bool,
}

impl MockTransport {
    pub fn new(description: &str) -> Self {
        MockTransport {
            description: description.to_string(),
            listening: false,
            fail_start: false,
        }
    }

    /// Make the next `start` call fail as if no port matched.
    pub fn failing(description: &str) -> Self {
        let mut t = Self::new(description);
        t.fail_start = true;
        t
    }

    /// Simulate the device dropping off the bus without a stop call.
    pub fn drop_device(&mut self) {
        self.listening = false;
    }

    /// Let a previously failing transport start succeeding again.
    pub fn allow_start(&mut self) {
        self.fail_start = false;
    }
}

impl SentenceTransport for MockTransport {
    fn start(&mut self) -> Result<(), TransportError> {
        if self.fail_start {
            return Err(TransportError::PortNotFound(self.description.clone()));
        }
        self.listening = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.listening = false;
    }

    fn is_listening(&self) -> bool {
        self.listening
    }
}
