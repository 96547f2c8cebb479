use crate::config::SessionConfig;
use crate::types::{DeviceEvent, Diagnostic};
use crate::{Result, VrError};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Lifecycle of a [`Session`]. `Stopping` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
}

/// Non-blocking producer side of a session's event channel.
#[derive(Clone)]
pub struct EventSink {
    sender: Sender<DeviceEvent>,
}

impl EventSink {
    pub fn new(sender: Sender<DeviceEvent>) -> Self {
        Self { sender }
    }

    /// Delivers `event`, dropping it if the consumer is not keeping up.
    pub fn emit(&self, event: DeviceEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                log::trace!("Event channel full, dropping {:?}", event);
            }
            Err(TrySendError::Disconnected(_)) => {
                log::trace!("Event channel closed");
            }
        }
    }

    pub fn diagnostic(&self, diagnostic: Diagnostic) {
        self.emit(DeviceEvent::Diagnostic(diagnostic));
    }
}

/// Shared state a driver sees while it runs.
#[derive(Clone)]
pub struct SessionContext {
    pub events: EventSink,
    /// Requested IR LED mode: blinking (true) or steady (false).
    pub flicker: Arc<AtomicBool>,
}

impl SessionContext {
    pub fn flicker(&self) -> bool {
        self.flicker.load(Ordering::Relaxed)
    }
}

/// One hardware family's start/poll/stop behavior.
///
/// `start` runs on the caller's thread. `poll` runs on the session thread and
/// performs one bounded wait plus decode; returning an error ends the session.
/// `stop` runs on the session thread after the last `poll`.
pub trait DeviceDriver: Send {
    fn name(&self) -> &str;

    fn start(&mut self, ctx: &SessionContext) -> Result<()>;

    fn poll(&mut self, ctx: &SessionContext) -> Result<()>;

    fn stop(&mut self, ctx: &SessionContext);
}

/// Handle to a running device.
///
/// Owns the driver and the thread that polls it, and hands decoded events to
/// the consumer through a bounded channel.
pub struct Session {
    name: String,
    state: Arc<Mutex<SessionState>>,
    active: Arc<AtomicBool>,
    flicker: Arc<AtomicBool>,
    receiver: Receiver<DeviceEvent>,
    /// Moved into the poll thread on start so the channel closes when it exits.
    ctx: Option<SessionContext>,
    driver: Option<Box<dyn DeviceDriver>>,
    thread: Option<std::thread::JoinHandle<()>>,
}

impl Session {
    pub fn new(driver: Box<dyn DeviceDriver>, config: &SessionConfig) -> Session {
        let (sender, receiver) = crossbeam_channel::bounded(config.channel_capacity);
        let flicker = Arc::new(AtomicBool::new(config.blink));
        Session {
            name: driver.name().to_string(),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            active: Arc::new(AtomicBool::new(false)),
            flicker: flicker.clone(),
            receiver,
            ctx: Some(SessionContext {
                events: EventSink::new(sender),
                flicker,
            }),
            driver: Some(driver),
            thread: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
    }

    /// Runs the driver's start sequence, then spawns the poll thread.
    ///
    /// A failed start leaves the session in `Stopping` with the device released.
    pub fn start(&mut self) -> Result<()> {
        let state = self.state();
        if state != SessionState::Idle {
            return Err(VrError::InvalidState {
                from: state,
                op: "start",
            });
        }
        let (mut driver, ctx) = match (self.driver.take(), self.ctx.take()) {
            (Some(driver), Some(ctx)) => (driver, ctx),
            _ => {
                return Err(VrError::InvalidState {
                    from: state,
                    op: "start",
                })
            }
        };

        self.set_state(SessionState::Starting);
        log::info!("{}: Starting", self.name);
        if let Err(e) = driver.start(&ctx) {
            log::warn!("{}: Start failed: {}", self.name, e);
            self.set_state(SessionState::Stopping);
            return Err(e);
        }

        self.active.store(true, Ordering::Relaxed);
        self.set_state(SessionState::Active);

        let active = self.active.clone();
        let state = self.state.clone();
        let name = self.name.clone();
        let thread = std::thread::Builder::new()
            .name(format!("vrtrack-{}", self.name))
            .spawn(move || poll_loop(driver, ctx, active, state, name))
            .map_err(|e| VrError::Thread(format!("Failed to spawn poll thread: {}", e)));

        match thread {
            Ok(thread) => {
                self.thread = Some(thread);
                Ok(())
            }
            Err(e) => {
                self.active.store(false, Ordering::Relaxed);
                self.set_state(SessionState::Stopping);
                Err(e)
            }
        }
    }

    /// Signals the poll thread and waits for it to run the stop sequence.
    ///
    /// Stopping an idle session releases the device without starting it.
    pub fn stop(&mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.active.store(false, Ordering::Relaxed);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::warn!("{}: Poll thread panicked", self.name);
            }
        }
        self.driver = None;
        self.ctx = None;
        self.set_state(SessionState::Stopping);
    }

    /// True while the poll thread is running.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Relaxed) && self.state() == SessionState::Active
    }

    /// Switches the IR LEDs between blinking patterns and steady light.
    pub fn set_flicker(&self, flicker: bool) {
        self.flicker.store(flicker, Ordering::Relaxed);
    }

    pub fn flicker(&self) -> bool {
        self.flicker.load(Ordering::Relaxed)
    }

    /// Receive the next event (blocks until available).
    pub fn recv(&self) -> Result<DeviceEvent> {
        self.receiver.recv().map_err(|_| VrError::StreamStopped)
    }

    /// Try to receive an event without blocking.
    pub fn try_recv(&self) -> Option<DeviceEvent> {
        self.receiver.try_recv().ok()
    }

    /// Receive an event with a timeout.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<DeviceEvent> {
        self.receiver.recv_timeout(timeout).map_err(|e| match e {
            crossbeam_channel::RecvTimeoutError::Timeout => VrError::Timeout,
            crossbeam_channel::RecvTimeoutError::Disconnected => VrError::StreamStopped,
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn poll_loop(
    mut driver: Box<dyn DeviceDriver>,
    ctx: SessionContext,
    active: Arc<AtomicBool>,
    state: Arc<Mutex<SessionState>>,
    name: String,
) {
    log::info!("{}: Poll loop started", name);

    while active.load(Ordering::Relaxed) {
        if let Err(e) = driver.poll(&ctx) {
            log::warn!("{}: Stopping after fatal error: {}", name, e);
            break;
        }
    }

    active.store(false, Ordering::Relaxed);
    *state.lock().unwrap_or_else(PoisonError::into_inner) = SessionState::Stopping;
    driver.stop(&ctx);
    log::info!("{}: Stopped", name);
}
