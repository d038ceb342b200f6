// Tasklist - local task list with snapshot persistence

pub mod config;
pub mod error;
pub mod filter;
pub mod ids;
pub mod session;
pub mod snapshot;
pub mod storage;
pub mod store;
pub mod task;
pub mod view;

// Re-export main types for convenience
pub use error::StoreError;
pub use filter::TaskFilter;
pub use ids::{IdGenerator, now_ms};
pub use session::{Confirm, Level, Notification, Notify, Session, ViewRow};
pub use storage::{FileStorage, MemoryStorage, SnapshotStorage, SqliteStorage};
pub use store::TaskStore;
pub use task::{MAX_NAME_LEN, Task, TaskId};
pub use view::{Projection, project};
