use crate::display::PrintDisplayList;
use crate::geometry::{Point, Size};
use crate::job::{PrintJobId, PrintJobOptions};
#[cfg(test)]
use std::sync::{Arc, Mutex};

/// A painted physical sheet queued for spooling.
/// 表示待送往列印佇列的一張實體紙。
#[derive(Debug, Clone)]
pub struct SpoolSheet {
    pub job_id: PrintJobId,
    pub sheet_number: usize,
    /// Paper size after rotation, in points.
    pub paper: Size,
    /// Subtract from display-list coordinates when the device origin is the corner of the
    /// printable area.
    pub device_offset: Point,
    pub display_list: PrintDisplayList,
}

/// Handle returned when a platform adapter begins a job.
/// 平台列印介面開始作業時回傳的控制物件。
pub trait PlatformJobHandle {
    type Error;

    fn submit_sheet(&mut self, sheet: SpoolSheet) -> Result<(), Self::Error>;
    fn finish(self) -> Result<(), Self::Error>;
    fn abort(self, reason: &str);
}

/// Abstraction over platform-specific print APIs.
/// 平台列印 API 的抽象介面。
pub trait PlatformAdapter: Send + Sync {
    type Error;
    type JobHandle: PlatformJobHandle<Error = Self::Error>;

    fn begin_job(&self, options: &PrintJobOptions) -> Result<Self::JobHandle, Self::Error>;
}

/// Recorded job metadata produced by the mock adapter.
/// 模擬介面所記錄的列印作業中繼資料。
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedJob {
    pub options: PrintJobOptions,
    pub sheets: Vec<SpoolSheet>,
    pub aborted: bool,
    pub abort_reason: Option<String>,
}

/// In-memory implementation of [`PlatformAdapter`] used for tests.
/// 測試使用的記憶體內部平台介面實作。
#[cfg(test)]
#[derive(Clone, Default)]
pub struct MockPlatformAdapter {
    jobs: Arc<Mutex<Vec<RecordedJob>>>,
    /// Rejects the sheet with this number, if set.
    pub fail_on_sheet: Option<usize>,
}

#[cfg(test)]
impl MockPlatformAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(sheet_number: usize) -> Self {
        Self {
            fail_on_sheet: Some(sheet_number),
            ..Self::default()
        }
    }

    pub fn drain_jobs(&self) -> Vec<RecordedJob> {
        self.jobs.lock().expect("lock poisoned").drain(..).collect()
    }
}

#[cfg(test)]
pub struct MockJobHandle {
    options: PrintJobOptions,
    sheets: Vec<SpoolSheet>,
    fail_on_sheet: Option<usize>,
    sink: Arc<Mutex<Vec<RecordedJob>>>,
}

#[cfg(test)]
impl PlatformAdapter for MockPlatformAdapter {
    type Error = String;
    type JobHandle = MockJobHandle;

    fn begin_job(&self, options: &PrintJobOptions) -> Result<Self::JobHandle, Self::Error> {
        Ok(MockJobHandle {
            options: options.clone(),
            sheets: Vec::new(),
            fail_on_sheet: self.fail_on_sheet,
            sink: self.jobs.clone(),
        })
    }
}

#[cfg(test)]
impl PlatformJobHandle for MockJobHandle {
    type Error = String;

    fn submit_sheet(&mut self, sheet: SpoolSheet) -> Result<(), Self::Error> {
        if self.fail_on_sheet == Some(sheet.sheet_number) {
            return Err(format!("printer rejected sheet {}", sheet.sheet_number));
        }
        self.sheets.push(sheet);
        Ok(())
    }

    fn finish(self) -> Result<(), Self::Error> {
        let mut guard = self.sink.lock().expect("lock poisoned");
        guard.push(RecordedJob {
            options: self.options,
            sheets: self.sheets,
            aborted: false,
            abort_reason: None,
        });
        Ok(())
    }

    fn abort(self, reason: &str) {
        let mut guard = self.sink.lock().expect("lock poisoned");
        guard.push(RecordedJob {
            options: self.options,
            sheets: Vec::new(),
            aborted: true,
            abort_reason: Some(reason.to_string()),
        });
    }
}
