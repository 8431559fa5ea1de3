//! Modbus-RTU over a serial port, using the `tokio-modbus` RTU client.
//!
//! The client runs on a private single-threaded runtime and each transaction is driven to
//! completion before `call` returns. The serial stream is wrapped in a [`TurnaroundStream`] which
//! reports when a request has been flushed, so that the transceiver is switched to receive mode
//! before the response comes in.

use std::future::{self, Future};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::runtime::{self, Runtime};
use tokio::time;
use tokio_modbus;
use tokio_modbus::client::{self, Reader, Writer};
use tokio_modbus::Slave;
use tokio_serial::{self, DataBits, Parity, SerialStream, StopBits};
use constants::{DEFAULT_BAUD_RATE, DEFAULT_RESPONSE_TIMEOUT_MS, DEFAULT_SLAVE_ADDRESS};
use errors::*;
use transaction::{ExchangeHooks, Request, Response, Transport};

/// Serial line parameters of the controller link.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    pub device: String,
    pub slave: u8,
    pub baud_rate: u32,
    pub stop_bits: StopBits,
    /// Bounded wait for each response.
    pub timeout: Duration,
}

impl LinkSettings {
    /// Settings matching the factory configuration of the controller's RS485 port.
    pub fn new (device: &str) -> LinkSettings {
        LinkSettings {
            device: device.to_owned(),
            slave: DEFAULT_SLAVE_ADDRESS,
            baud_rate: DEFAULT_BAUD_RATE,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis (DEFAULT_RESPONSE_TIMEOUT_MS),
        }
    }
}

/// Raised by a [`TurnaroundStream`] once written bytes have been flushed.
pub type SentSignal = Arc<AtomicBool>;

/// Wraps a byte stream and raises a [`SentSignal`] each time a flush completes after a write.
///
/// On unix the flush of a serial stream drains the UART, so the last byte is on the wire when
/// the signal goes up.
#[derive(Debug)]
pub struct TurnaroundStream<S> {
    inner: S,
    sent: SentSignal,
    unflushed: bool,
}

impl<S> TurnaroundStream<S> {
    pub fn new (inner: S, sent: SentSignal) -> TurnaroundStream<S> {
        TurnaroundStream { inner, sent, unflushed: false }
    }

    pub fn get_ref (&self) -> &S { &self.inner }
}

impl<S: AsyncRead + Unpin> AsyncRead for TurnaroundStream<S> {
    fn poll_read (self: Pin<&mut Self>, cx: &mut Context, buf: &mut ReadBuf) -> Poll<io::Result<()>> {
        Pin::new (&mut self.get_mut().inner).poll_read (cx, buf)
    }
}

impl<S: AsyncWrite + Unpin> AsyncWrite for TurnaroundStream<S> {
    fn poll_write (self: Pin<&mut Self>, cx: &mut Context, buf: &[u8]) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new (&mut this.inner).poll_write (cx, buf);
        if let Poll::Ready(Ok(written)) = poll {
            this.unflushed |= written > 0;
        }
        poll
    }

    fn poll_flush (self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let poll = Pin::new (&mut this.inner).poll_flush (cx);
        if let Poll::Ready(Ok(())) = poll {
            if this.unflushed {
                this.unflushed = false;
                this.sent.store (true, Ordering::SeqCst);
            }
        }
        poll
    }

    fn poll_shutdown (self: Pin<&mut Self>, cx: &mut Context) -> Poll<io::Result<()>> {
        Pin::new (&mut self.get_mut().inner).poll_shutdown (cx)
    }
}

/// The RS485 link to a controller. Framing and CRC are handled by `tokio-modbus`.
pub struct RtuTransport {
    runtime: Runtime,
    ctx: client::Context,
    sent: SentSignal,
    timeout: Duration,
}

impl RtuTransport {
    /// Opens the serial port and attaches to the configured slave.
    pub fn open (settings: &LinkSettings) -> Result<RtuTransport> {
        let builder = tokio_serial::new (settings.device.as_str(), settings.baud_rate)
            .data_bits (DataBits::Eight)
            .parity (Parity::None)
            .stop_bits (settings.stop_bits);
        let runtime = runtime::Builder::new_current_thread()
            .enable_io()
            .enable_time()
            .build()?;
        // the serial stream registers with the reactor of the current runtime
        let serial = {
            let _entered = runtime.enter();
            SerialStream::open (&builder)
                .chain_err (|| format!("unable to open serial port {}", settings.device))?
        };
        let sent = SentSignal::default();
        let ctx = client::rtu::attach_slave (
            TurnaroundStream::new (serial, sent.clone()), Slave(settings.slave));
        info!("connected to slave {} on {} ({} baud)",
            settings.slave, settings.device, settings.baud_rate);
        Ok(RtuTransport { runtime, ctx, sent, timeout: settings.timeout })
    }
}

/// Drives `wire` to completion within `timeout`, reporting the turnaround and the waits to
/// `hooks`.
fn exchange<F, T> (
    runtime: &Runtime,
    sent: &SentSignal,
    timeout: Duration,
    wire: F,
    hooks: &mut dyn ExchangeHooks
) -> Result<T>
    where F: Future<Output = tokio_modbus::Result<T>>
{
    sent.store (false, Ordering::SeqCst);
    let mut bounded = {
        let _entered = runtime.enter();
        Box::pin (time::timeout (timeout, wire))
    };
    let outcome = runtime.block_on (future::poll_fn (|cx| {
        let poll = bounded.as_mut().poll (cx);
        if sent.swap (false, Ordering::SeqCst) {
            hooks.request_sent();
        }
        if poll.is_pending() {
            hooks.idle();
        }
        poll
    }));
    match outcome {
        Ok(result) => flatten (result),
        Err(_) => bail!(ErrorKind::BusTimeout),
    }
}

/// Flattens the nested `tokio-modbus` result into our error kinds.
fn flatten<T> (result: tokio_modbus::Result<T>) -> Result<T> {
    match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(exception)) => bail!(ErrorKind::FramingError(format!("exception {:?}", exception))),
        Err(tokio_modbus::Error::Transport(ref error)) if error.kind() == io::ErrorKind::TimedOut =>
            bail!(ErrorKind::BusTimeout),
        Err(tokio_modbus::Error::Transport(error)) =>
            bail!(ErrorKind::FramingError(error.to_string())),
        Err(other) => bail!(ErrorKind::UnexpectedResponse(other.to_string())),
    }
}

impl Transport for RtuTransport {
    fn call (&mut self, request: &Request, hooks: &mut dyn ExchangeHooks) -> Result<Response> {
        let RtuTransport { ref runtime, ref mut ctx, ref sent, timeout } = *self;
        match *request {
            Request::ReadInputRegisters(address, count) =>
                exchange (runtime, sent, timeout, ctx.read_input_registers (address, count), hooks)
                    .map (Response::ReadInputRegisters),
            Request::ReadCoils(address, count) =>
                exchange (runtime, sent, timeout, ctx.read_coils (address, count), hooks)
                    .map (Response::ReadCoils),
            Request::WriteSingleCoil(address, value) =>
                exchange (runtime, sent, timeout, ctx.write_single_coil (address, value), hooks)
                    .map (|()| Response::WriteSingleCoil(address, value)),
            Request::WriteMultipleRegisters(address, ref words) =>
                exchange (runtime, sent, timeout, ctx.write_multiple_registers (address, words), hooks)
                    .map (|()| Response::WriteMultipleRegisters(address, words.len() as u16)),
        }
    }
}
