use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use tracing::debug;

/// Shared flag telling a running reflow to stop before it publishes anything.
/// 通知執行中的重新排版在發佈結果前停止的共享旗標。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Handle for one reflow request: its sequence number and cancellation token.
/// 單次重新排版請求的憑證：序號與取消權杖。
#[derive(Debug, Clone)]
pub struct ReflowTicket {
    pub sequence: u64,
    pub cancel: CancelToken,
}

/// A result published by [`ReflowCoordinator::commit`].
#[derive(Debug)]
pub struct Committed<T> {
    pub sequence: u64,
    pub value: T,
}

/// Serialises reflow results so a stale run never overwrites a newer one.
///
/// Every [`begin`](Self::begin) cancels the previous ticket; [`commit`](Self::commit)
/// publishes only the newest, uncancelled ticket's result.
/// 確保較舊的重新排版結果不會覆蓋較新的結果。
#[derive(Debug)]
pub struct ReflowCoordinator<T> {
    latest: AtomicU64,
    active: Mutex<Option<CancelToken>>,
    committed: Mutex<Option<Arc<Committed<T>>>>,
}

impl<T> Default for ReflowCoordinator<T> {
    fn default() -> Self {
        Self {
            latest: AtomicU64::new(0),
            active: Mutex::new(None),
            committed: Mutex::new(None),
        }
    }
}

impl<T> ReflowCoordinator<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new request, cancelling the one before it.
    pub fn begin(&self) -> ReflowTicket {
        let cancel = CancelToken::new();
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        let sequence = self.latest.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(previous) = active.replace(cancel.clone()) {
            previous.cancel();
        }
        ReflowTicket { sequence, cancel }
    }

    /// Publishes `value` if `ticket` is still the newest request. Returns whether it did.
    pub fn commit(&self, ticket: &ReflowTicket, value: T) -> bool {
        let mut committed = self
            .committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let newest = self.latest.load(Ordering::SeqCst);
        let superseded = committed
            .as_ref()
            .is_some_and(|current| current.sequence >= ticket.sequence);
        if ticket.cancel.is_cancelled() || ticket.sequence != newest || superseded {
            debug!(
                sequence = ticket.sequence,
                newest, "discarding stale reflow result"
            );
            return false;
        }
        *committed = Some(Arc::new(Committed {
            sequence: ticket.sequence,
            value,
        }));
        true
    }

    /// Latest published result, if any.
    pub fn current(&self) -> Option<Arc<Committed<T>>> {
        self.committed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn latest_sequence(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }
}

impl<T: Send + Sync + 'static> ReflowCoordinator<T> {
    /// Runs `job` on a worker thread under a fresh ticket and commits its `Ok` value.
    ///
    /// The join handle yields whether the result was published.
    pub fn spawn<E, F>(self: &Arc<Self>, job: F) -> JoinHandle<bool>
    where
        E: Send + 'static,
        F: FnOnce(&CancelToken) -> Result<T, E> + Send + 'static,
    {
        let ticket = self.begin();
        let coordinator = Arc::clone(self);
        thread::spawn(move || match job(&ticket.cancel) {
            Ok(value) => coordinator.commit(&ticket, value),
            Err(_) => false,
        })
    }
}

/// Classification of a sheet settings edit.
/// 版面設定變更的分類。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SheetChange {
    Landscape,
    Margins,
    Rows,
    Columns,
    Padding,
    ContentFont,
    LineNumbers,
    LineNumberSeparator,
    TabSpaces,
    NewPageOnFormFeed,
    ContentDiagnostics,
    HeaderFooterFont,
    HeaderFooterEnabled,
    HeaderFooterPadding,
    PageSeparator,
    HeaderFooterText,
    HeaderFooterBorders,
    Colors,
}

impl SheetChange {
    /// Whether the edit changes line breaks or tile geometry, as opposed to only the
    /// painted output.
    pub fn requires_reflow(self) -> bool {
        !matches!(
            self,
            SheetChange::PageSeparator
                | SheetChange::HeaderFooterText
                | SheetChange::HeaderFooterBorders
                | SheetChange::Colors
        )
    }
}
