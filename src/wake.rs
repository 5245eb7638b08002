// src/wake.rs
use std::{
    sync::{mpsc, Arc},
    task::{Wake, Waker},
    time::Duration,
};

use crate::task::TaskId;

#[derive(Debug)]
pub(crate) enum WakeRecvTimeout {
    Msg(TaskId),
    Timeout,
    Disconnected,
}

// The only handle that may cross threads: a `Waker` can be moved anywhere,
// so the channel is a real `mpsc` even though everything else is local.
#[derive(Clone)]
pub(crate) struct WakeTx {
    tx: mpsc::Sender<TaskId>,
}

pub(crate) struct WakeRx {
    rx: mpsc::Receiver<TaskId>,
}

pub(crate) fn wake_channel() -> (WakeTx, WakeRx) {
    let (tx, rx) = mpsc::channel();
    (WakeTx { tx }, WakeRx { rx })
}

impl WakeTx {
    #[inline]
    pub(crate) fn send(&self, id: TaskId) {
        let _ = self.tx.send(id);
    }
}

impl WakeRx {
    #[inline]
    pub(crate) fn try_recv(&self) -> Option<TaskId> {
        self.rx.try_recv().ok()
    }

    #[inline]
    pub(crate) fn recv_timeout(&self, dur: Duration) -> WakeRecvTimeout {
        match self.rx.recv_timeout(dur) {
            Ok(id) => WakeRecvTimeout::Msg(id),
            Err(mpsc::RecvTimeoutError::Timeout) => WakeRecvTimeout::Timeout,
            Err(mpsc::RecvTimeoutError::Disconnected) => WakeRecvTimeout::Disconnected,
        }
    }

    #[inline]
    pub(crate) fn recv(&self) -> Option<TaskId> {
        self.rx.recv().ok()
    }
}

struct TaskWaker {
    id: TaskId,
    tx: WakeTx,
}

impl Wake for TaskWaker {
    fn wake(self: Arc<Self>) {
        self.tx.send(self.id);
    }

    fn wake_by_ref(self: &Arc<Self>) {
        self.tx.send(self.id);
    }
}

pub(crate) fn task_waker(id: TaskId, tx: WakeTx) -> Waker {
    Waker::from(Arc::new(TaskWaker { id, tx }))
}
