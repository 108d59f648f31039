use std::fmt;

/// 快照来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotSource {
    /// 实时订阅 mesh.telemetry.*
    Realtime,
    /// 周期性轮询 KV 快照
    Poll,
}

impl SnapshotSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            SnapshotSource::Realtime => "realtime",
            SnapshotSource::Poll => "poll",
        }
    }
}

impl fmt::Display for SnapshotSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
