mod fixtures;
pub use fixtures::*;

// Re-export commonly used types so test files pull everything from common.
pub use opsledger::core::model::{
    AccountStatus, Client, ClientRepository, ClientUpdate, Employee, EmployeeRepository, NewClient,
    NewEmployee, NewOrder, NewProject, Order, OrderRepository, OrderStatus, Project,
    ProjectRepository, ProjectUpdate,
};
pub use opsledger::core::store::{
    ChangeEvent, ChangeKind, CollectionPath, Document, DocumentStore, Query, RecordStore,
    TenantQuery,
};
pub use opsledger::{
    AggregateInput, DateRange, Error, ExportBuilder, ExportFormat, JoinResolver, MISSING_LABEL,
    ProjectPager, ResidentCache, ResolvedOrder, ResolvedProject, ViewFilters, ViewKind, ViewRow,
    ViewSession, aggregate,
};
