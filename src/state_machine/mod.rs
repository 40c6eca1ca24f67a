//! Task mining lifecycle.
//!
//! The external mining engine owns every state transition. This module holds
//! the state enums, the pure merge applied to driver responses, the single
//! locally decided predicate (schedule another import round) and the
//! re-entrancy guards of the import continuation.

pub mod errors;
pub mod guards;
pub mod snapshot;
pub mod states;

pub use errors::{GuardError, GuardResult};
pub use guards::{AtomicImportGuard, BestEffortImportGuard, ImportGuard, ImportGuardKind};
pub use snapshot::{merge_task_state, needs_import_continuation, TaskStateSnapshot};
pub use states::{ImportState, TaskState};
