mod config;

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDate, NaiveTime};
use clap::{Args, Parser, Subcommand};
use client_core::{
    work_store::combine_date_and_time, ApiClient, CascadeScope, ClientEvent, Dashboard,
    DetailEdit, MenuItemDraft, NewUser, NoticeLevel, Notifier, ProfileUpdate, StaffPayment,
    WorkDraft, WorkEdit,
};
use shared::{
    domain::{MenuItemId, NotificationPrefs, Role, UserId, WorkId, WorkOrder, WorkStatus},
    input::AssigneeRef,
    access::{can_manage_menu, can_manage_work},
    views::{filter_works, is_assigned_to, sort_by_due_date, work_progress, ProgressStage},
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "console", about = "Catering operations admin console")]
struct Cli {
    /// Overrides the configured API base url for this invocation.
    #[arg(long, global = true)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    /// Staff and work counts plus the latest work orders.
    Summary,
    #[command(subcommand)]
    Works(WorksCommand),
    #[command(subcommand)]
    Users(UsersCommand),
    #[command(subcommand)]
    Menu(MenuCommand),
    #[command(subcommand)]
    Categories(CategoriesCommand),
    #[command(subcommand)]
    Profile(ProfileCommand),
}

#[derive(Subcommand, Debug)]
enum WorksCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        /// Only work orders this staff member is assigned to.
        #[arg(long)]
        staff: Option<String>,
        #[arg(long)]
        by_due_date: bool,
    },
    Show {
        work_id: String,
    },
    Create(CreateWorkArgs),
    /// Records a payment to one assigned staff member and deducts it from the budget.
    Pay {
        work_id: String,
        staff_id: String,
        #[arg(long)]
        amount: String,
        #[arg(long = "violation")]
        violations: Vec<String>,
        /// Re-send the net budget once if the budget write and its rollback both fail.
        #[arg(long)]
        resync: bool,
    },
    /// Sets a new allocated budget; payments already made are deducted.
    Budget {
        work_id: String,
        amount: String,
    },
    Status {
        work_id: String,
        #[arg(value_parser = parse_status)]
        status: WorkStatus,
    },
    Delete {
        work_id: String,
    },
}

impl WorksCommand {
    fn is_mutation(&self) -> bool {
        !matches!(self, WorksCommand::List { .. } | WorksCommand::Show { .. })
    }
}

#[derive(Args, Debug)]
struct CreateWorkArgs {
    #[arg(long)]
    title: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    due_date: NaiveDate,
    #[arg(long, value_parser = parse_time)]
    start: Option<NaiveTime>,
    #[arg(long, value_parser = parse_time)]
    end: Option<NaiveTime>,
    #[arg(long)]
    members: Option<String>,
    #[arg(long)]
    budget: String,
    /// Staff user id; repeat for each assignee.
    #[arg(long = "assign", required = true)]
    assigned_to: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum UsersCommand {
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        role: Role,
    },
    Role {
        user_id: String,
        role: Role,
    },
    Delete {
        user_id: String,
    },
}

#[derive(Subcommand, Debug)]
enum MenuCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        category: Option<String>,
    },
    Add(MenuItemArgs),
    Update {
        item_id: String,
        #[command(flatten)]
        item: MenuItemArgs,
    },
    Delete {
        item_id: String,
    },
}

#[derive(Args, Debug)]
struct MenuItemArgs {
    #[arg(long)]
    name: String,
    #[arg(long, default_value = "")]
    description: String,
    #[arg(long)]
    price: String,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    image: String,
}

impl From<MenuItemArgs> for MenuItemDraft {
    fn from(args: MenuItemArgs) -> Self {
        MenuItemDraft {
            name: args.name,
            description: args.description,
            price: Some(args.price.into()),
            category: args.category,
            image: args.image,
        }
    }
}

#[derive(Subcommand, Debug)]
enum CategoriesCommand {
    List,
    Add {
        name: String,
    },
    /// Deletes a category and its items.
    Delete {
        name: String,
        /// Walk every menu page instead of only the loaded one.
        #[arg(long)]
        all_pages: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileCommand {
    Update {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        profile_pic: Option<String>,
    },
    Notifications {
        #[arg(long)]
        email: bool,
        #[arg(long)]
        whatsapp: bool,
    },
}

fn parse_time(raw: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|e| format!("expected HH:MM, {e}"))
}

fn parse_status(raw: &str) -> Result<WorkStatus, String> {
    serde_json::from_value(serde_json::Value::String(raw.trim().to_ascii_lowercase()))
        .map_err(|_| format!("unknown status '{raw}', expected pending, in-progress or completed"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(url) = cli.api_base_url.clone() {
        settings.api_base_url = url;
    }
    settings.validate()?;
    debug!(
        api_base_url = %settings.api_base_url,
        session_db = %settings.session_database_url,
        timeout_secs = settings.request_timeout_secs,
        "console: settings loaded"
    );

    let notifier = Notifier::default();
    let mut events = notifier.subscribe();
    let result = run(cli.command, &settings, notifier).await;
    print_events(&mut events);
    result
}

async fn run(command: Command, settings: &Settings, notifier: Notifier) -> Result<()> {
    let api = Arc::new(ApiClient::new(&settings.api_base_url, settings.request_timeout())?);
    let vault = Arc::new(
        Storage::new(&settings.session_database_url)
            .await
            .with_context(|| format!("opening {}", settings.session_database_url))?,
    );

    if let Command::Login { email, password } = &command {
        let dashboard = Dashboard::login(api, vault, notifier, email, password).await?;
        let user = dashboard.current_user().await?;
        println!("Signed in as {} ({})", user.name, user.role);
        return Ok(());
    }

    let dashboard = Dashboard::restore(api, vault, notifier)
        .await?
        .ok_or_else(|| anyhow!("not signed in or session expired; run `console login` first"))?;

    match command {
        Command::Login { .. } => Ok(()),
        Command::Logout => {
            dashboard.logout().await?;
            println!("Signed out");
            Ok(())
        }
        Command::Whoami => {
            let user = dashboard.current_user().await?;
            println!("{} <{}> {} [{}]", user.name, user.email, user.role, user.id);
            Ok(())
        }
        Command::Summary => {
            let summary = dashboard.summary().await;
            println!("Staff:            {}", summary.staff_count);
            println!("Total works:      {}", summary.total_works);
            println!("Completed works:  {}", summary.completed_works);
            println!("Pending works:    {}", summary.pending_works);
            println!("Latest:");
            for work in &summary.latest {
                print_work_line(work);
            }
            Ok(())
        }
        Command::Works(cmd) => {
            if cmd.is_mutation() {
                require_role(&dashboard, can_manage_work, "manage work orders").await?;
            }
            run_works(&dashboard, cmd).await
        }
        Command::Users(cmd) => run_users(&dashboard, cmd).await,
        Command::Menu(cmd) => {
            if !matches!(cmd, MenuCommand::List { .. }) {
                require_role(&dashboard, can_manage_menu, "manage the menu").await?;
            }
            run_menu(&dashboard, cmd).await
        }
        Command::Categories(cmd) => {
            if !matches!(cmd, CategoriesCommand::List) {
                require_role(&dashboard, can_manage_menu, "manage the menu").await?;
            }
            run_categories(&dashboard, cmd).await
        }
        Command::Profile(cmd) => run_profile(&dashboard, cmd).await,
    }
}

async fn require_role(
    dashboard: &Dashboard,
    allowed: fn(Role) -> bool,
    action: &str,
) -> Result<()> {
    let role = dashboard.current_user().await?.role;
    if allowed(role) {
        Ok(())
    } else {
        Err(anyhow!("a {role} may not {action}"))
    }
}

async fn run_works(dashboard: &Dashboard, cmd: WorksCommand) -> Result<()> {
    match cmd {
        WorksCommand::List {
            search,
            staff,
            by_due_date,
        } => {
            let mut works = dashboard.works().list().await;
            if by_due_date {
                sort_by_due_date(&mut works);
            }
            let staff = staff.map(UserId::new);
            let term = search.unwrap_or_default();
            for work in filter_works(&works, &term)
                .into_iter()
                .filter(|work| staff.as_ref().map_or(true, |id| is_assigned_to(work, id)))
            {
                print_work_line(work);
            }
        }
        WorksCommand::Show { work_id } => {
            let detail = dashboard.open_work(&WorkId::new(work_id)).await?;
            let work = detail.current();
            println!("{} [{}]", work.title, work.id);
            if !work.description.is_empty() {
                println!("  {}", work.description);
            }
            if let Some(due) = work.due_date {
                println!("  due:       {due}");
            }
            println!("  members:   {}", work.total_members);
            println!("  allocated: {}", detail.allocated_budget());
            println!("  paid:      {}", detail.total_paid());
            println!("  remaining: {}", detail.net_budget());
            println!("  progress:  {}% ({})", detail.progress(), detail.stage().label());
            for assignment in detail.staff() {
                println!(
                    "  - {} [{}] paid {} violations {}",
                    assignment.user.name,
                    assignment.user.id,
                    assignment.amount_paid,
                    assignment.violations.len()
                );
            }
        }
        WorksCommand::Create(args) => {
            let draft = WorkDraft {
                title: args.title,
                description: args.description,
                due_date: Some(args.due_date),
                start_time: args.start.map(|t| combine_date_and_time(args.due_date, t)),
                end_time: args.end.map(|t| combine_date_and_time(args.due_date, t)),
                total_members: args.members.map(Into::into),
                budget: Some(args.budget.into()),
                assigned_to: args.assigned_to.into_iter().map(AssigneeRef::user).collect(),
                status: None,
            };
            let work = dashboard.works().create(draft).await?;
            println!("Created {}", work.id);
        }
        WorksCommand::Pay {
            work_id,
            staff_id,
            amount,
            violations,
            resync,
        } => {
            let mut detail = dashboard.open_work(&WorkId::new(work_id)).await?;
            let payment = StaffPayment::amount(amount).with_violations(violations);
            match detail
                .apply_staff_payment(&UserId::new(staff_id), payment)
                .await
            {
                Ok(remaining) => println!("Remaining budget: {remaining}"),
                Err(err) if resync && detail.needs_reconciliation().is_some() => {
                    if let Some(budget) = detail.resync_budget().await? {
                        println!("Budget resent: {budget}");
                    }
                    return Err(err);
                }
                Err(err) => return Err(err),
            }
        }
        WorksCommand::Budget { work_id, amount } => {
            let mut detail = dashboard.open_work(&WorkId::new(work_id)).await?;
            let work = detail
                .update_details(DetailEdit {
                    budget: Some(amount.into()),
                    ..Default::default()
                })
                .await?;
            println!("Remaining budget: {}", work.budget);
        }
        WorksCommand::Status { work_id, status } => {
            dashboard
                .works()
                .update(&WorkId::new(work_id), WorkEdit::status(status))
                .await?;
        }
        WorksCommand::Delete { work_id } => {
            dashboard.works().remove(&WorkId::new(work_id)).await?;
        }
    }
    Ok(())
}

async fn run_users(dashboard: &Dashboard, cmd: UsersCommand) -> Result<()> {
    match cmd {
        UsersCommand::List { search } => {
            let users = match search {
                Some(term) => dashboard.users().search(&term).await,
                None => dashboard.users().visible().await,
            };
            for user in users {
                println!(
                    "{:<24} {:<10} {:<32} {}",
                    user.id.as_str(),
                    user.role.as_str(),
                    user.email,
                    user.name
                );
            }
            let counts = dashboard.users().role_counts().await;
            println!(
                "admins {} managers {} staff {}",
                counts.admins, counts.managers, counts.staff
            );
        }
        UsersCommand::Create {
            name,
            email,
            password,
            role,
        } => {
            let user = dashboard
                .users()
                .create(NewUser {
                    name,
                    email,
                    password,
                    role,
                })
                .await?;
            println!("Created {} [{}]", user.name, user.id);
        }
        UsersCommand::Role { user_id, role } => {
            let actor = dashboard.current_user().await?;
            dashboard
                .users()
                .change_role(actor.role, &UserId::new(user_id), role)
                .await?;
        }
        UsersCommand::Delete { user_id } => {
            if dashboard.delete_user(&UserId::new(user_id)).await? {
                println!("Own account deleted; signed out");
            }
        }
    }
    Ok(())
}

async fn run_menu(dashboard: &Dashboard, cmd: MenuCommand) -> Result<()> {
    let menu = dashboard.menu();
    match cmd {
        MenuCommand::List { page, category } => {
            menu.fetch_page(page).await?;
            let items = match category {
                Some(category) => menu.items_in_category(&category).await,
                None => menu.items().await,
            };
            for item in items {
                println!(
                    "{:<24} {:<16} {:>10} {}",
                    item.id.as_str(),
                    item.category,
                    item.price.to_string(),
                    item.name
                );
            }
            println!("page {} of {}", menu.page().await, menu.total_pages().await);
        }
        MenuCommand::Add(args) => menu.add_item(args.into()).await?,
        MenuCommand::Update { item_id, item } => {
            menu.update_item(&MenuItemId::new(item_id), item.into())
                .await?
        }
        MenuCommand::Delete { item_id } => menu.delete_item(&MenuItemId::new(item_id)).await?,
    }
    Ok(())
}

async fn run_categories(dashboard: &Dashboard, cmd: CategoriesCommand) -> Result<()> {
    let menu = dashboard.menu();
    match cmd {
        CategoriesCommand::List => {
            for tab in menu.category_tabs().await {
                println!("{tab}");
            }
        }
        CategoriesCommand::Add { name } => {
            menu.create_category(&name).await?;
        }
        CategoriesCommand::Delete { name, all_pages } => {
            let scope = if all_pages {
                CascadeScope::AllPages
            } else {
                CascadeScope::LoadedPage
            };
            let report = menu.delete_category(&name, scope).await?;
            println!(
                "Deleted category {} and {} item(s)",
                report.category,
                report.deleted.len()
            );
        }
    }
    Ok(())
}

async fn run_profile(dashboard: &Dashboard, cmd: ProfileCommand) -> Result<()> {
    match cmd {
        ProfileCommand::Update {
            name,
            email,
            password,
            profile_pic,
        } => {
            let user = dashboard
                .update_profile(ProfileUpdate {
                    name,
                    email,
                    password,
                    profile_pic,
                })
                .await?;
            println!("{} <{}>", user.name, user.email);
        }
        ProfileCommand::Notifications { email, whatsapp } => {
            let prefs = dashboard
                .update_notifications(NotificationPrefs { email, whatsapp })
                .await?;
            println!("email {} whatsapp {}", prefs.email, prefs.whatsapp);
        }
    }
    Ok(())
}

fn print_work_line(work: &WorkOrder) {
    let progress = work_progress(work);
    let due = work
        .due_date
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "{:<24} {:<10} {:>4}% {:<12} {:>10} {}",
        work.id.as_str(),
        due,
        progress,
        ProgressStage::from_progress(progress).label(),
        work.budget.to_string(),
        work.title
    );
}

fn print_events(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            ClientEvent::Notice { level, message } => {
                let tag = match level {
                    NoticeLevel::Success => "ok",
                    NoticeLevel::Warning => "warn",
                    NoticeLevel::Error => "error",
                };
                eprintln!("[{tag}] {message}");
            }
            ClientEvent::ReconciliationRequired {
                work_id,
                expected_budget,
            } => {
                eprintln!(
                    "[error] budget of {work_id} needs reconciliation, expected {expected_budget}"
                );
            }
            ClientEvent::SessionEnded => eprintln!("[ok] session ended"),
        }
    }
}
