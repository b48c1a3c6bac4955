//! Instrument handles and the reconnect/retry policy around them.
//!
//! A [`Device`] is a request/response handle over an addressable instrument.
//! [`ReconnectingDevice`] wraps any device with the lab's at-least-once
//! recovery behaviour: on failure the device is marked disconnected, the
//! connection is re-established under a [`RetryPolicy`], and the original
//! operation is re-issued. The default policy retries indefinitely at a
//! fixed interval — no backoff growth, no circuit breaker — which suits a
//! human-supervised bench where someone will eventually replug the cable.

use std::thread;
use std::time::Duration;

use crate::error::BifmapError;

/// Request/response handle over an instrument resource.
pub trait Device {
    fn write(&mut self, command: &str) -> Result<(), BifmapError>;

    fn query(&mut self, command: &str) -> Result<String, BifmapError>;

    /// Binary-waveform query variant, for devices that stream samples.
    fn query_waveform(&mut self, command: &str) -> Result<Vec<f64>, BifmapError> {
        let _ = command;
        Err(BifmapError::Device(
            "waveform queries not supported by this device".into(),
        ))
    }

    /// Re-establish the underlying connection.
    fn reconnect(&mut self) -> Result<(), BifmapError>;
}

/// Explicit retry policy: how often and how many times to re-attempt a
/// transient failure.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// `None` retries forever.
    pub max_attempts: Option<usize>,
    /// Fixed delay between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unbounded(Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn unbounded(delay: Duration) -> Self {
        Self {
            max_attempts: None,
            delay,
        }
    }

    pub fn bounded(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts: Some(max_attempts),
            delay,
        }
    }

    /// Run an operation under this policy.
    ///
    /// Transient errors are retried after the fixed delay until the attempt
    /// budget runs out, which yields [`BifmapError::RetriesExhausted`].
    /// Non-transient errors (configuration mistakes) propagate immediately.
    pub fn run<T>(
        &self,
        mut op: impl FnMut() -> Result<T, BifmapError>,
    ) -> Result<T, BifmapError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_transient() => return Err(err),
                Err(err) => {
                    if let Some(max) = self.max_attempts {
                        if attempts >= max {
                            return Err(BifmapError::RetriesExhausted {
                                attempts,
                                last: err.to_string(),
                            });
                        }
                    }
                    log::warn!("device operation failed ({err}), retrying in {:?}", self.delay);
                    thread::sleep(self.delay);
                }
            }
        }
    }
}

/// Reconnect-on-failure wrapper around any [`Device`].
///
/// Every operation is at-least-once: a transient failure marks the device
/// disconnected and the policy re-establishes the connection before the
/// operation is re-issued, so an operation may execute more than once on
/// the instrument.
pub struct ReconnectingDevice<D: Device> {
    inner: D,
    policy: RetryPolicy,
    connected: bool,
}

impl<D: Device> ReconnectingDevice<D> {
    pub fn new(inner: D, policy: RetryPolicy) -> Self {
        Self {
            inner,
            policy,
            connected: true,
        }
    }

    pub fn into_inner(self) -> D {
        self.inner
    }

    fn with_reconnect<T>(
        &mut self,
        mut op: impl FnMut(&mut D) -> Result<T, BifmapError>,
    ) -> Result<T, BifmapError> {
        let policy = self.policy;
        policy.run(|| {
            if !self.connected {
                self.inner.reconnect()?;
                self.connected = true;
                log::info!("device reconnected");
            }
            match op(&mut self.inner) {
                Ok(value) => Ok(value),
                Err(err) => {
                    if err.is_transient() {
                        self.connected = false;
                    }
                    Err(err)
                }
            }
        })
    }
}

impl<D: Device> Device for ReconnectingDevice<D> {
    fn write(&mut self, command: &str) -> Result<(), BifmapError> {
        self.with_reconnect(|d| d.write(command))
    }

    fn query(&mut self, command: &str) -> Result<String, BifmapError> {
        self.with_reconnect(|d| d.query(command))
    }

    fn query_waveform(&mut self, command: &str) -> Result<Vec<f64>, BifmapError> {
        self.with_reconnect(|d| d.query_waveform(command))
    }

    fn reconnect(&mut self) -> Result<(), BifmapError> {
        self.inner.reconnect()?;
        self.connected = true;
        Ok(())
    }
}

/// Command helper for the arbitrary-waveform generator driving the circuit.
///
/// Voltage and frequency settings are rounded to three decimals on the wire.
pub struct AwgHandle<D: Device> {
    device: D,
}

impl<D: Device> AwgHandle<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }

    pub fn set_voltage(&mut self, volts: f64) -> Result<(), BifmapError> {
        self.device.write(&format!("volt:{volts:.3}"))
    }

    pub fn set_frequency(&mut self, hz: f64) -> Result<(), BifmapError> {
        self.device.write(&format!("freq:{hz:.3}"))
    }

    pub fn voltage(&mut self) -> Result<f64, BifmapError> {
        parse_reply(&self.device.query("volt")?)
    }

    pub fn frequency(&mut self) -> Result<f64, BifmapError> {
        parse_reply(&self.device.query("freq")?)
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }
}

fn parse_reply(raw: &str) -> Result<f64, BifmapError> {
    raw.trim()
        .parse()
        .map_err(|_| BifmapError::Device(format!("unparseable numeric reply: {raw:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Device stub that fails its first `failures` operations.
    struct FlakyDevice {
        failures: usize,
        commands: Vec<String>,
        reconnects: usize,
    }

    impl FlakyDevice {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                commands: Vec::new(),
                reconnects: 0,
            }
        }

        fn attempt(&mut self) -> Result<(), BifmapError> {
            if self.failures > 0 {
                self.failures -= 1;
                return Err(BifmapError::Device("timeout".into()));
            }
            Ok(())
        }
    }

    impl Device for FlakyDevice {
        fn write(&mut self, command: &str) -> Result<(), BifmapError> {
            self.attempt()?;
            self.commands.push(command.to_string());
            Ok(())
        }

        fn query(&mut self, command: &str) -> Result<String, BifmapError> {
            self.attempt()?;
            self.commands.push(command.to_string());
            Ok("2.500".into())
        }

        fn reconnect(&mut self) -> Result<(), BifmapError> {
            self.reconnects += 1;
            Ok(())
        }
    }

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::bounded(max_attempts, Duration::from_millis(0))
    }

    #[test]
    fn test_retry_policy_recovers() {
        let mut remaining = 2;
        let result = fast_policy(5).run(|| {
            if remaining > 0 {
                remaining -= 1;
                Err(BifmapError::Device("timeout".into()))
            } else {
                Ok(7)
            }
        });
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_retry_policy_exhaustion() {
        let result: Result<(), _> =
            fast_policy(3).run(|| Err(BifmapError::Device("timeout".into())));
        assert!(matches!(
            result.unwrap_err(),
            BifmapError::RetriesExhausted { attempts: 3, .. }
        ));
    }

    #[test]
    fn test_retry_policy_skips_fatal_errors() {
        let mut calls = 0;
        let result: Result<(), _> = fast_policy(5).run(|| {
            calls += 1;
            Err(BifmapError::InvalidWindowSize)
        });
        assert!(matches!(result.unwrap_err(), BifmapError::InvalidWindowSize));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_reconnecting_device_reissues_operation() {
        let device = FlakyDevice::new(1);
        let mut wrapped = ReconnectingDevice::new(device, fast_policy(5));
        wrapped.write("volt:1.000").unwrap();
        let inner = wrapped.into_inner();
        assert_eq!(inner.commands, vec!["volt:1.000"]);
        assert_eq!(inner.reconnects, 1);
    }

    #[test]
    fn test_awg_command_format() {
        let mut awg = AwgHandle::new(FlakyDevice::new(0));
        awg.set_voltage(2.5).unwrap();
        awg.set_frequency(25_000.0).unwrap();
        assert_eq!(
            awg.device_mut().commands,
            vec!["volt:2.500", "freq:25000.000"]
        );
        assert_eq!(awg.voltage().unwrap(), 2.5);
    }
}
