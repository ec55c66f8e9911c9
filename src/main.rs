use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, ContentArrangement, Row, Table, presets::UTF8_BORDERS_ONLY};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use opsledger::core::model::{
    AccountStatus, ClientRepository, EmployeeRepository, NewClient, NewEmployee, NewOrder,
    NewProject, OrderRepository, OrderStatus, ProjectRepository,
};
use opsledger::core::store::DocumentStore;
use opsledger::{
    AggregateInput, DEFAULT_PAGE_SIZE, DateRange, ExportBuilder, ExportFormat, JoinResolver,
    ProjectPager, ResidentCache, ViewFilters, ViewKind, ViewRow, aggregate,
};

#[derive(Parser)]
#[command(name = "opsledger")]
#[command(about = "Inspect and export business views from a workspace store")]
struct Cli {
    /// Path to the workspace database file
    #[arg(value_name = "WORKSPACE")]
    workspace: PathBuf,

    /// Business id all commands are scoped to
    #[arg(short, long)]
    business: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert a small demo data set
    Seed,
    /// Print a derived view
    View {
        kind: ViewKind,
        /// Case-insensitive text filter
        #[arg(long)]
        search: Option<String>,
        /// Start of the creation-date window (RFC 3339)
        #[arg(long)]
        from: Option<String>,
        /// End of the creation-date window (RFC 3339)
        #[arg(long)]
        to: Option<String>,
    },
    /// Page through one client's projects
    Projects {
        client_id: String,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
        page_size: u32,
    },
    /// Write a view export to a file
    Export {
        kind: ViewKind,
        #[arg(long, default_value = "csv")]
        format: ExportFormat,
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        business_name: Option<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();
    let store = DocumentStore::open(&args.workspace)
        .await
        .with_context(|| format!("Failed to open workspace {:?}", args.workspace))?;

    match args.command {
        Command::Seed => seed(&store, &args.business).await,
        Command::View {
            kind,
            search,
            from,
            to,
        } => {
            let filters = ViewFilters {
                date_range: parse_range(from.as_deref(), to.as_deref())?,
                search,
            };
            let rows = gather_rows(&store, &args.business, kind, &filters).await?;
            print_rows(&rows);
            Ok(())
        }
        Command::Projects {
            client_id,
            page,
            page_size,
        } => show_projects(&store, &args.business, &client_id, page, page_size).await,
        Command::Export {
            kind,
            format,
            out,
            business_name,
        } => {
            let rows = gather_rows(&store, &args.business, kind, &ViewFilters::default()).await?;
            let mut builder = ExportBuilder::new(&rows, &args.business, OffsetDateTime::now_utc());
            if let Some(name) = business_name.as_deref() {
                builder = builder.business_name(name);
            }
            let blob = builder.build(format)?;
            std::fs::write(&out, &blob)
                .with_context(|| format!("Failed to write export to {out:?}"))?;
            println!("Wrote {} bytes to {:?}", blob.len(), out);
            Ok(())
        }
    }
}

/// Pull everything the resolver would normally have resident from live
/// subscriptions, then run one aggregation pass.
async fn gather_rows(
    store: &DocumentStore,
    business_id: &str,
    kind: ViewKind,
    filters: &ViewFilters,
) -> anyhow::Result<Vec<ViewRow>> {
    let clients = store.get_clients(business_id).await?;
    let employees = store.get_employees(business_id).await?;
    let orders = store.get_orders(business_id).await?;

    let mut resident = ResidentCache::default();
    let mut projects_by_client = Vec::new();
    for client in &clients {
        projects_by_client.push((client.id.clone(), store.get_projects(client).await?));
    }
    resident.replace_clients(clients);
    for (client_id, projects) in projects_by_client {
        resident.replace_projects(&client_id, projects);
    }
    resident.replace_employees(employees);

    let resolver = JoinResolver::new(store, business_id);
    let resolved_orders = resolver.resolve_orders(&orders, &resident).await?;
    let projects = resident.all_projects();
    let resolved_projects = resolver.resolve_projects(&projects, &resident).await?;

    Ok(aggregate(
        &AggregateInput {
            orders: &resolved_orders,
            projects: &resolved_projects,
        },
        kind,
        filters,
    ))
}

fn print_rows(rows: &[ViewRow]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_BORDERS_ONLY)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(Row::from(vec![
        "Name", "Client", "Employee", "Project", "Status", "Amount",
    ]));
    for row in rows {
        table.add_row(Row::from(vec![
            Cell::new(&row.name),
            Cell::new(&row.client_name),
            Cell::new(&row.employee_name),
            Cell::new(&row.project_name),
            Cell::new(row.status),
            Cell::new(format!("{:.2}", row.amount)),
        ]));
    }
    println!("{table}");
    println!("({} rows)", rows.len());
}

async fn show_projects(
    store: &DocumentStore,
    business_id: &str,
    client_id: &str,
    page: u32,
    page_size: u32,
) -> anyhow::Result<()> {
    let mut pager = ProjectPager::new(store.clone(), business_id, page_size);
    // Cursors are built page by page; walk forward to the requested one.
    let mut current = pager.get_page(client_id, 1).await?;
    for next in 2..=page {
        if !current.has_more {
            break;
        }
        current = pager.get_page(client_id, next).await?;
    }

    println!(
        "Page {} of {} projects for client {client_id}:",
        current.page, current.total
    );
    for record in &current.records {
        let deadline = record
            .project
            .deadline
            .format(&Rfc3339)
            .unwrap_or_else(|_| "-".to_string());
        println!(
            "  {:>3}. {} (budget {:.2}, due {deadline})",
            record.serial_no, record.project.name, record.project.budget
        );
    }
    if current.has_more {
        println!("  ... more pages available");
    }
    Ok(())
}

fn parse_range(from: Option<&str>, to: Option<&str>) -> anyhow::Result<Option<DateRange>> {
    match (from, to) {
        (None, None) => Ok(None),
        (Some(from), Some(to)) => {
            let start = OffsetDateTime::parse(from, &Rfc3339)
                .with_context(|| format!("Invalid --from timestamp: {from}"))?;
            let end = OffsetDateTime::parse(to, &Rfc3339)
                .with_context(|| format!("Invalid --to timestamp: {to}"))?;
            anyhow::ensure!(start <= end, "--from must not be later than --to");
            Ok(Some(DateRange { start, end }))
        }
        _ => anyhow::bail!("--from and --to must be given together"),
    }
}

async fn seed(store: &DocumentStore, business_id: &str) -> anyhow::Result<()> {
    let acme = store
        .add_client(
            business_id,
            NewClient {
                name: "Acme Retail".to_string(),
                email: Some("ops@acme.example".to_string()),
                phone: None,
                company: Some("Acme Retail GmbH".to_string()),
                tags: vec!["retail".to_string()],
                budget: 12_000.0,
                status: AccountStatus::Active,
            },
        )
        .await?;
    let nordwind = store
        .add_client(
            business_id,
            NewClient {
                name: "Nordwind Logistics".to_string(),
                email: None,
                phone: Some("+49 40 555 0199".to_string()),
                company: None,
                tags: vec![],
                budget: 8_000.0,
                status: AccountStatus::Active,
            },
        )
        .await?;

    let mara = store
        .add_employee(
            business_id,
            NewEmployee {
                name: "Mara Ellis".to_string(),
                email: Some("mara@example.com".to_string()),
                phone: None,
                skills: vec!["design".to_string(), "frontend".to_string()],
                experience: Some("4 years".to_string()),
                status: AccountStatus::Active,
            },
        )
        .await?;

    let shop = store
        .add_project(
            &acme,
            NewProject {
                name: "Webshop relaunch".to_string(),
                budget: 6_000.0,
                deadline: OffsetDateTime::now_utc(),
                requirements: Some("Storefront, checkout, CMS".to_string()),
                status: None,
            },
        )
        .await?;
    store
        .add_project(
            &nordwind,
            NewProject {
                name: "Fleet dashboard".to_string(),
                budget: 4_500.0,
                deadline: OffsetDateTime::now_utc(),
                requirements: None,
                status: Some(OrderStatus::Pending),
            },
        )
        .await?;

    store
        .add_order(
            business_id,
            NewOrder {
                title: "Storefront design".to_string(),
                description: Some("Design system and templates".to_string()),
                amount: 2_400.0,
                deadline: OffsetDateTime::now_utc(),
                status: OrderStatus::InProgress,
                client_id: acme.id.clone(),
                project_id: Some(shop.id.clone()),
                employee_id: mara.id.clone(),
            },
        )
        .await?;
    store
        .add_order(
            business_id,
            NewOrder {
                title: "Checkout integration".to_string(),
                description: None,
                amount: 1_800.0,
                deadline: OffsetDateTime::now_utc(),
                status: OrderStatus::Pending,
                client_id: acme.id.clone(),
                project_id: Some(shop.id),
                employee_id: mara.id,
            },
        )
        .await?;

    println!("Seeded demo data for business {business_id}:");
    println!("  clients: {} / {}", acme.id, nordwind.id);
    println!("Run 'view projects' or 'view profits' next.");
    Ok(())
}
