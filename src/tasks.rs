use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

pub enum SlotPoll<T> {
    Idle,
    Busy,
    Finished(Result<T, String>),
}

/// One background request per UI action.
///
/// While a request is in flight the slot refuses new submissions, so the
/// triggering control cannot queue duplicates. In-flight work is never
/// cancelled; dropping the slot only stops listening for its result.
pub struct ActionSlot<T> {
    receiver: Option<Receiver<Result<T, String>>>,
}

impl<T> Default for ActionSlot<T> {
    fn default() -> Self {
        Self { receiver: None }
    }
}

impl<T: Send + 'static> ActionSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_busy(&self) -> bool {
        self.receiver.is_some()
    }

    /// Runs `job` on a worker thread. Returns `false` without spawning when
    /// a previous job is still pending.
    pub fn start<F>(&mut self, job: F) -> bool
    where
        F: FnOnce() -> Result<T, String> + Send + 'static,
    {
        if self.is_busy() {
            return false;
        }
        let (tx, rx) = mpsc::channel::<Result<T, String>>();
        thread::spawn(move || {
            let _ = tx.send(job());
        });
        self.receiver = Some(rx);
        true
    }

    pub fn poll(&mut self) -> SlotPoll<T> {
        let Some(receiver) = self.receiver.take() else {
            return SlotPoll::Idle;
        };

        match receiver.try_recv() {
            Ok(result) => SlotPoll::Finished(result),
            Err(TryRecvError::Empty) => {
                self.receiver = Some(receiver);
                SlotPoll::Busy
            }
            Err(TryRecvError::Disconnected) => {
                SlotPoll::Finished(Err("Background worker disconnected.".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc::channel;
    use std::time::{Duration, Instant};

    fn wait_for<T: Send + 'static>(slot: &mut ActionSlot<T>) -> Result<T, String> {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match slot.poll() {
                SlotPoll::Finished(result) => return result,
                SlotPoll::Idle => panic!("slot went idle without a result"),
                SlotPoll::Busy => {
                    assert!(Instant::now() < deadline, "worker timed out");
                    thread::sleep(Duration::from_millis(2));
                }
            }
        }
    }

    #[test]
    fn idle_slot_polls_idle() {
        let mut slot = ActionSlot::<u32>::new();
        assert!(!slot.is_busy());
        assert!(matches!(slot.poll(), SlotPoll::Idle));
    }

    #[test]
    fn finished_result_is_delivered_once() {
        let mut slot = ActionSlot::new();
        assert!(slot.start(|| Ok(7_u32)));
        assert_eq!(wait_for(&mut slot), Ok(7));
        assert!(!slot.is_busy());
        assert!(matches!(slot.poll(), SlotPoll::Idle));
    }

    #[test]
    fn errors_are_delivered_verbatim() {
        let mut slot = ActionSlot::<()>::new();
        slot.start(|| Err("Failed to edit image. HTTP 500".to_string()));
        assert_eq!(
            wait_for(&mut slot),
            Err("Failed to edit image. HTTP 500".to_string())
        );
    }

    #[test]
    fn busy_slot_refuses_duplicate_submissions() {
        let (release_tx, release_rx) = channel::<()>();
        let mut slot = ActionSlot::new();
        assert!(slot.start(move || {
            let _ = release_rx.recv();
            Ok("first")
        }));
        assert!(slot.is_busy());
        assert!(!slot.start(|| Ok("second")));

        release_tx.send(()).expect("worker should be waiting");
        assert_eq!(wait_for(&mut slot), Ok("first"));
        assert!(slot.start(|| Ok("third")));
        assert_eq!(wait_for(&mut slot), Ok("third"));
    }

    #[test]
    fn panicking_worker_reports_disconnect() {
        let mut slot = ActionSlot::<u8>::new();
        slot.start(|| panic!("worker failure"));
        let result = wait_for(&mut slot);
        assert!(result.is_err());
    }
}
