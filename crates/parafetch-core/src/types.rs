use std::path::PathBuf;

/// Half-open byte interval `[start, end)` over a resource.
///
/// Two ranges produced by the planner for the same download are disjoint and
/// their union equals `[offset, total)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Range {
    pub start: u64,
    pub end: u64,
}

impl Range {
    pub fn new(start: u64, end: u64) -> Self {
        debug_assert!(start < end, "range must be non-empty: {start}..{end}");
        Self { start, end }
    }

    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// The inclusive upper bound used on the wire (`Range: bytes=start-end`).
    pub fn inclusive_end(&self) -> u64 {
        self.end - 1
    }
}

impl std::fmt::Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Result of discovery: resolved final URL, total size, resumability, and the
/// ordered plan of ranges to fetch.
#[derive(Debug, Clone)]
pub struct DownloadPlan {
    pub final_url: url::Url,
    pub total: u64,
    pub resumable: bool,
    pub mime_type: Option<String>,
    pub output_path: PathBuf,
    pub offset: u64,
    pub ranges: Vec<Range>,
    /// Connection count after capping to `ranges.len()`.
    pub conns: u32,
}

/// Owned byte buffer produced by one successful fetch task, tagged with its
/// range. Created on HTTP success; briefly staged keyed by `range.start`;
/// consumed and freed by the commit pipeline.
#[derive(Debug)]
pub struct ChunkBuffer {
    pub range: Range,
    pub data: Vec<u8>,
}

/// Lifecycle phase of one fetch task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Pending,
    Running,
    Done,
    Failed,
    Cancelled,
}

/// Per-fetch bookkeeping. `num` is assigned at enqueue time, monotonically
/// increasing starting at 1.
#[derive(Debug, Clone)]
pub struct TaskState {
    pub num: u32,
    pub range: Range,
    pub bytes_received: u64,
    pub total_expected: Option<u64>,
    pub phase: TaskPhase,
}

/// Result of a probe request.
#[derive(Debug, Clone)]
pub struct ProbeResult {
    pub final_url: url::Url,
    pub content_length: u64,
    pub total_size: u64,
    pub resumable: bool,
    pub mime_type: Option<String>,
}

/// Transport-level failure kinds underlying `EngineError::Transport`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportKind {
    ConnectionRefused,
    Dns,
    Timeout,
    Tls,
    Aborted,
    Cancelled,
    Unknown,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::ConnectionRefused => "connection refused",
            Self::Dns => "dns failure",
            Self::Timeout => "timeout",
            Self::Tls => "tls failure",
            Self::Aborted => "aborted",
            Self::Cancelled => "cancelled",
            Self::Unknown => "unknown network error",
        };
        f.write_str(s)
    }
}

/// Error taxonomy: one variant per distinct failure category callers need to
/// branch on (transport vs. HTTP status vs. malformed data vs. policy/IO).
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("transport error: {0}")]
    Transport(TransportKind),

    #[error("client error: HTTP {0}")]
    ClientError(u16),

    #[error("server error: HTTP {0}")]
    ServerError(u16),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("empty response body")]
    EmptyBody,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("policy violation: {0}")]
    Policy(String),

    #[error("cancelled")]
    Cancelled,

    #[error("url parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("short write: expected {expected} bytes, wrote {actual}")]
    WriteShort { expected: usize, actual: usize },
}

impl From<reqwest::Error> for EngineError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            return EngineError::Transport(TransportKind::Timeout);
        }
        if err.is_connect() {
            return EngineError::Transport(TransportKind::ConnectionRefused);
        }
        EngineError::Transport(TransportKind::Unknown)
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
