use termed_core::specification::{CompileError, Engine};
use termed_core::DocumentError;

/// Every failure the index engine reports.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("index I/O failed during {op}: {source}")]
    Io {
        op: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("could not map value for key {key}: {source}")]
    Encode {
        key: String,
        #[source]
        source: DocumentError,
    },

    #[error("could not decode document {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: DocumentError,
    },

    #[error("index commit file is unreadable during {op}: {source}")]
    Persist {
        op: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("term dictionary build failed: {0}")]
    Dictionary(#[from] fst::Error),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error("query targets the {0} engine")]
    WrongEngine(Engine),

    #[error("background index task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("index is closed")]
    Closed,

    #[error("index must be opened inside a tokio runtime")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, IndexError>;

impl IndexError {
    pub(crate) fn io(op: &'static str) -> impl FnOnce(std::io::Error) -> IndexError {
        move |source| IndexError::Io { op, source }
    }

    pub(crate) fn persist(op: &'static str) -> impl FnOnce(serde_json::Error) -> IndexError {
        move |source| IndexError::Persist { op, source }
    }
}
