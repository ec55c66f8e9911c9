mod client;
mod employee;
mod order;
mod project;
mod status;

pub use client::{Client, ClientRepository, ClientUpdate, NewClient};
pub use employee::{Employee, EmployeeRepository, EmployeeUpdate, NewEmployee};
pub use order::{NewOrder, Order, OrderRepository, OrderUpdate};
pub use project::{NewProject, Project, ProjectRepository, ProjectUpdate};
pub use status::{AccountStatus, OrderStatus};
