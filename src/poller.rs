use crate::error::IoError;
use crate::hid::Transport;
use crate::protocol::MAX_REPORT_SIZE;
use crate::{Result, VrError};
use crossbeam_channel::{Receiver, Select, Sender, TryRecvError, TrySendError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Granularity at which reader threads notice the stop flag.
const READ_SLICE: Duration = Duration::from_millis(100);
/// Reports buffered per interface before new ones are dropped.
const QUEUE_DEPTH: usize = 64;

type Input = std::result::Result<Vec<u8>, IoError>;

/// Waits on several input interfaces at once.
///
/// Each interface gets a reader thread that pushes raw reports into its own
/// bounded queue. [`InputPoller::wait`] blocks until any queue has data and
/// then takes at most one report per interface, in interface order.
pub struct InputPoller {
    receivers: Vec<Receiver<Input>>,
    stop_flag: Arc<AtomicBool>,
    threads: Vec<JoinHandle<()>>,
}

impl InputPoller {
    pub fn spawn(name: &str, inputs: Vec<Box<dyn Transport>>) -> Result<InputPoller> {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let mut poller = InputPoller {
            receivers: Vec::with_capacity(inputs.len()),
            stop_flag: stop_flag.clone(),
            threads: Vec::with_capacity(inputs.len()),
        };

        for (interface, input) in inputs.into_iter().enumerate() {
            let (sender, receiver) = crossbeam_channel::bounded(QUEUE_DEPTH);
            let stop = stop_flag.clone();
            let thread_name = format!("{}-in{}", name, interface);
            let thread = std::thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || reader_loop(thread_name, input, sender, stop))
                .map_err(|e| VrError::Thread(format!("Failed to spawn reader thread: {}", e)))?;
            poller.receivers.push(receiver);
            poller.threads.push(thread);
        }

        Ok(poller)
    }

    pub fn interfaces(&self) -> usize {
        self.receivers.len()
    }

    /// Returns `(interface, report)` pairs, or an empty list on timeout.
    ///
    /// A fatal transport error on any interface, or a reader that has gone
    /// away, is returned as an error.
    pub fn wait(&self, timeout: Duration) -> std::result::Result<Vec<(usize, Vec<u8>)>, IoError> {
        let mut select = Select::new();
        for receiver in &self.receivers {
            select.recv(receiver);
        }
        if select.ready_timeout(timeout).is_err() {
            return Ok(Vec::new());
        }

        let mut ready = Vec::new();
        for (interface, receiver) in self.receivers.iter().enumerate() {
            match receiver.try_recv() {
                Ok(Ok(report)) => ready.push((interface, report)),
                Ok(Err(e)) => return Err(e),
                Err(TryRecvError::Empty) => {}
                Err(TryRecvError::Disconnected) => return Err(IoError::Disconnected),
            }
        }
        Ok(ready)
    }

    pub fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        for thread in self.threads.drain(..) {
            let _ = thread.join();
        }
    }
}

impl Drop for InputPoller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn reader_loop(name: String, input: Box<dyn Transport>, sender: Sender<Input>, stop_flag: Arc<AtomicBool>) {
    let mut buf = [0u8; MAX_REPORT_SIZE];

    log::debug!("{}: reader started", name);

    while !stop_flag.load(Ordering::Relaxed) {
        let len = match input.read_input(&mut buf, READ_SLICE) {
            Ok(0) => continue,
            Ok(n) => n,
            Err(e) if e.is_fatal() => {
                log::warn!("{}: {}", name, e);
                let _ = sender.try_send(Err(e));
                break;
            }
            Err(e) => {
                log::warn!("{}: Read error: {}", name, e);
                continue;
            }
        };

        match sender.try_send(Ok(buf[..len].to_vec())) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                log::trace!("{}: queue full, dropping report", name);
            }
            Err(TrySendError::Disconnected(_)) => break,
        }
    }

    log::debug!("{}: reader stopped", name);
}
