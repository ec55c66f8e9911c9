pub mod core;
pub mod error;
pub mod export;
pub mod join;
pub mod live;
pub mod paging;
pub mod rollup;

pub use error::{Error, Result};
pub use export::{ExportBuilder, ExportFormat};
pub use join::{JoinResolver, MISSING_LABEL, ResidentCache, ResolvedOrder, ResolvedProject};
pub use live::{SessionEvent, SlotKey, SubscriptionManager, ViewSession};
pub use paging::{DEFAULT_PAGE_SIZE, PagedProject, ProjectPage, ProjectPager};
pub use rollup::{AggregateInput, DateRange, ViewFilters, ViewKind, ViewRow, aggregate};
