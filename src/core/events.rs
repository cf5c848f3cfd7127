use super::models::{ScanId, TaskRef};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Started {
        id: ScanId,
        tool: String,
        task_ref: TaskRef,
    },
    Completed {
        id: ScanId,
        records: usize,
        degraded: bool,
    },
    Failed {
        id: ScanId,
        message: String,
    },
    Cancelled {
        id: ScanId,
    },
}

impl ScanEvent {
    pub fn scan_id(&self) -> ScanId {
        match self {
            ScanEvent::Started { id, .. }
            | ScanEvent::Completed { id, .. }
            | ScanEvent::Failed { id, .. }
            | ScanEvent::Cancelled { id } => *id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, ScanEvent::Started { .. })
    }
}
