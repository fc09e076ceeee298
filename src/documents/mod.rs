//! Document store: filename policy, content rendering, and whole-file persistence
//! behind a swappable repository interface.

pub mod names;
pub mod render;
pub mod repo;
pub mod store;

pub use names::{classify_extension, derive_copy_name, validate_new_name, RenderMode, ALLOWED_EXTENSIONS, MAX_NAME_LEN};
pub use render::{render, render_bytes};
pub use repo::{DocumentRepository, FsRepository, MemoryRepository};
pub use store::DocumentStore;
