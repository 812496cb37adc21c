use std::{
    collections::{BTreeSet, HashMap},
    io, thread,
    time::Instant,
};

use flume::{Receiver, RecvTimeoutError, Sender};

#[derive(Eq, Hash, Clone, Copy, PartialEq, Debug, PartialOrd, Ord)]
pub(crate) enum TimerId {
    /// A granted authorization waiting for its transaction to start.
    Authorization(usize),
    /// An EV plugged in without a token; the plug-in goes stale.
    PlugIn(usize),
    Reservation(i32),
}

#[derive(Debug)]
enum TimerCommand {
    AddOrUpdate(TimerId, Instant),
    Remove(TimerId),
}

/// Handle used under the handler lock to arm and disarm timers. Sending never
/// blocks; the timer thread owns the deadlines.
pub(crate) struct TimerDriver {
    tx: Sender<TimerCommand>,
}

pub(crate) struct TimerThread {
    rx: Receiver<TimerCommand>,
}

pub(crate) fn channel() -> (TimerDriver, TimerThread) {
    let (tx, rx) = flume::unbounded();
    (TimerDriver { tx }, TimerThread { rx })
}

impl TimerDriver {
    pub fn add_or_update(&self, id: TimerId, deadline: Instant) {
        log::trace!(
            "add timeout, id: {:?}, deadline: {:?}",
            id,
            deadline.saturating_duration_since(Instant::now())
        );
        if self.tx.send(TimerCommand::AddOrUpdate(id, deadline)).is_err() {
            log::warn!("timer thread is gone, dropping timeout {:?}", id);
        }
    }

    pub fn remove(&self, id: TimerId) {
        log::trace!("remove timeout, id: {:?}", id);
        if self.tx.send(TimerCommand::Remove(id)).is_err() {
            log::warn!("timer thread is gone, cannot remove timeout {:?}", id);
        }
    }
}

impl TimerThread {
    /// Runs the timers on their own thread. `on_timeout` returns false once
    /// nobody is interested in timeouts anymore, which ends the thread; so does
    /// dropping the [`TimerDriver`].
    pub fn spawn<F>(self, on_timeout: F) -> io::Result<()>
    where
        F: FnMut(TimerId) -> bool + Send + 'static,
    {
        thread::Builder::new()
            .name("auth-timers".into())
            .spawn(move || TimerManager::new().run(self.rx, on_timeout))?;
        Ok(())
    }
}

struct TimerManager {
    timer_deadlines: HashMap<TimerId, Instant>,
    deadline_queue: BTreeSet<(Instant, TimerId)>,
}

impl TimerManager {
    fn new() -> Self {
        Self {
            timer_deadlines: HashMap::new(),
            deadline_queue: BTreeSet::new(),
        }
    }

    fn next_deadline(&self) -> Option<(Instant, TimerId)> {
        self.deadline_queue.iter().next().copied()
    }

    fn add_or_update(&mut self, id: TimerId, when: Instant) {
        if let Some(prev) = self.timer_deadlines.insert(id, when) {
            self.deadline_queue.remove(&(prev, id));
        }
        self.deadline_queue.insert((when, id));
    }

    fn remove(&mut self, id: TimerId) {
        if let Some(prev) = self.timer_deadlines.remove(&id) {
            self.deadline_queue.remove(&(prev, id));
        }
    }

    fn apply(&mut self, command: TimerCommand) {
        match command {
            TimerCommand::AddOrUpdate(id, when) => self.add_or_update(id, when),
            TimerCommand::Remove(id) => self.remove(id),
        }
    }

    fn run<F>(mut self, rx: Receiver<TimerCommand>, mut on_timeout: F)
    where
        F: FnMut(TimerId) -> bool,
    {
        loop {
            let command = match self.next_deadline() {
                Some((deadline, id)) => match rx.recv_deadline(deadline) {
                    Ok(command) => command,
                    Err(RecvTimeoutError::Timeout) => {
                        self.remove(id);
                        log::trace!("id timedout: {:?}", id);
                        if !on_timeout(id) {
                            break;
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                },
                None => match rx.recv() {
                    Ok(command) => command,
                    Err(_) => break,
                },
            };
            self.apply(command);
        }
        log::debug!("timer thread stopped");
    }
}
