use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    pages::{IngredientDraft, IngredientEdit, OrdersPage, PizzaDraft, PizzaEdit, StatusFilter},
    AdminClient, ClientEvent, GuardDecision, MutationOutcome, Page, RestGateway, Theme, ThemeStore,
};
use shared::{
    domain::{IngredientId, Order, OrderId, OrderStatus, PizzaId, PizzaSize, Role, UserAccountId},
    protocol::AuthSession,
};
use storage::Storage;
use tokio::sync::broadcast;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;

const SESSION_KEY: &str = "auth.session";

#[derive(Parser, Debug)]
#[command(name = "zahub-admin", about = "Staff console for the pizza shop backend")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Local display preference; needs no backend.
    Theme {
        #[command(subcommand)]
        action: ThemeAction,
    },
    #[command(flatten)]
    Backend(BackendCommand),
}

#[derive(Subcommand, Debug)]
enum BackendCommand {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    Orders {
        #[command(subcommand)]
        action: OrdersAction,
    },
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },
    Pizzas {
        #[command(subcommand)]
        action: PizzasAction,
    },
    Ingredients {
        #[command(subcommand)]
        action: IngredientsAction,
    },
    Dashboard,
}

#[derive(Subcommand, Debug)]
enum OrdersAction {
    List {
        /// ALL or an order status
        #[arg(long, default_value = "ALL")]
        status: StatusFilter,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    SetStatus {
        id: OrderId,
        status: OrderStatus,
    },
    /// Places the canned cash order for `customer`.
    CreateTest {
        #[arg(long)]
        customer: UserAccountId,
    },
}

#[derive(Subcommand, Debug)]
enum UsersAction {
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    ToggleActive {
        id: UserAccountId,
    },
    SetRole {
        id: UserAccountId,
        role: Role,
    },
}

#[derive(Subcommand, Debug)]
enum PizzasAction {
    List,
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "MEDIANA")]
        size: PizzaSize,
        #[arg(long)]
        price: Option<f64>,
    },
    Toggle {
        id: PizzaId,
    },
    Edit {
        id: PizzaId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        size: Option<PizzaSize>,
        #[arg(long)]
        price: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum IngredientsAction {
    List {
        #[arg(long, default_value_t = 1)]
        page: usize,
    },
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        category: String,
        #[arg(long)]
        price: Option<f64>,
    },
    Edit {
        id: IngredientId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        price: Option<f64>,
    },
}

#[derive(Subcommand, Debug)]
enum ThemeAction {
    Show,
    Toggle,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = config::load_settings(&cli.config)?;
    let storage = Storage::new(&settings.database_url).await?;

    let command = match cli.command {
        Command::Theme { action } => return run_theme(&action, ThemeStore::new(storage)).await,
        Command::Backend(command) => command,
    };

    let gateway = Arc::new(
        RestGateway::with_timeout(
            &settings.backend_url,
            settings.anon_key.clone(),
            settings.http_timeout(),
        )
        .context("failed to configure backend client")?,
    );
    if let Some(saved) = storage.get_json::<AuthSession>(SESSION_KEY).await? {
        gateway.restore_session(saved).await;
    }

    let client = AdminClient::new(gateway.clone(), settings.profile_fallback);
    let mut events = client.subscribe_events();
    client.start().await;

    let result = run(command, &client, &storage).await;

    print_notices(&mut events);
    client.shutdown().await;
    result
}

async fn run(command: BackendCommand, client: &AdminClient, storage: &Storage) -> Result<()> {
    match command {
        BackendCommand::Login { email, password } => {
            let session = client.login(&email, &password).await?;
            storage.set_json(SESSION_KEY, &session).await?;
            match client.profile() {
                Some(profile) => println!("signed in as {} ({})", profile.name, profile.role),
                None => println!("signed in"),
            }
            if client.guard() == GuardDecision::PermissionDenied {
                warn!("this account's role cannot use the admin console");
            }
        }
        BackendCommand::Logout => {
            client.logout().await;
            storage.remove(SESSION_KEY).await?;
            println!("signed out");
        }
        BackendCommand::Whoami => {
            let snapshot = client.session().snapshot();
            match (snapshot.current_user, snapshot.current_profile) {
                (Some(user), Some(profile)) => println!(
                    "{} <{}> role={} access={:?}",
                    profile.name,
                    user.email.unwrap_or_default(),
                    profile.role,
                    client.guard()
                ),
                _ => println!("not signed in"),
            }
        }
        BackendCommand::Orders { action } => {
            require_staff(client)?;
            run_orders(action, client).await?;
        }
        BackendCommand::Users { action } => {
            require_staff(client)?;
            run_users(action, client).await?;
        }
        BackendCommand::Pizzas { action } => {
            require_staff(client)?;
            run_pizzas(action, client).await?;
        }
        BackendCommand::Ingredients { action } => {
            require_staff(client)?;
            run_ingredients(action, client).await?;
        }
        BackendCommand::Dashboard => {
            require_staff(client)?;
            let summary = client.dashboard().load().await?;
            println!("orders (last {}): {}", client_core::pages::KITCHEN_WINDOW, summary.total_orders);
            println!("revenue: {:.0}", summary.revenue);
            println!(
                "pending: {}  baking: {}  out for delivery: {}",
                summary.pending, summary.baking, summary.out_for_delivery
            );
            println!("registered users: {}", summary.user_count);
            println!("kitchen load: {:.0}%", summary.kitchen_load_percent);
            println!("latest:");
            for order in &summary.recent {
                print_order(order);
            }
        }
    }
    Ok(())
}

fn require_staff(client: &AdminClient) -> Result<()> {
    match client.guard() {
        GuardDecision::Render => Ok(()),
        GuardDecision::RedirectToLogin => bail!("not signed in; run `zahub-admin login` first"),
        GuardDecision::PermissionDenied => {
            bail!("permission denied: only admin, cashier and kitchen staff may use this command")
        }
    }
}

async fn run_orders(action: OrdersAction, client: &AdminClient) -> Result<()> {
    let page = client.orders_page();
    page.load().await?;
    match action {
        OrdersAction::List { status, page: number } => {
            let shown = page.show(status, number).await;
            for order in &shown.items {
                print_order(order);
            }
            print_footer(&shown);
        }
        OrdersAction::SetStatus { id, status } => {
            report_mutation(page.change_status(id, status).await?, &format!("order {}", id.short()));
        }
        OrdersAction::CreateTest { customer } => {
            let order = page
                .create_order(OrdersPage::sample_order(customer))
                .await?;
            println!("created order {}", order.id);
        }
    }
    Ok(())
}

async fn run_users(action: UsersAction, client: &AdminClient) -> Result<()> {
    let page = client.users_page();
    page.load().await?;
    match action {
        UsersAction::List { search, page: number } => {
            let shown = page.show(&search, number).await;
            for user in &shown.items {
                println!(
                    "{}  {:<24} {:<28} {:<10} {}",
                    user.id,
                    user.display_name(),
                    user.email.as_deref().unwrap_or("-"),
                    user.effective_role(),
                    if user.active { "active" } else { "inactive" }
                );
            }
            print_footer(&shown);
        }
        UsersAction::ToggleActive { id } => {
            report_mutation(page.toggle_active(id).await?, &format!("user {}", id.short()));
        }
        UsersAction::SetRole { id, role } => {
            report_mutation(page.change_role(id, role).await?, &format!("user {}", id.short()));
        }
    }
    Ok(())
}

async fn run_pizzas(action: PizzasAction, client: &AdminClient) -> Result<()> {
    let page = client.pizzas_page();
    page.load().await?;
    match action {
        PizzasAction::List => {
            for pizza in page.pizzas().await {
                println!(
                    "{}  {:<24} {:<9} {:>8.0} {}",
                    pizza.id,
                    pizza.name,
                    pizza.size.map(|s| s.to_string()).unwrap_or_else(|| "-".into()),
                    pizza.base_price,
                    if pizza.active { "active" } else { "inactive" }
                );
            }
        }
        PizzasAction::Create {
            name,
            description,
            size,
            price,
        } => {
            let pizza = page
                .create(PizzaDraft {
                    name,
                    description,
                    size,
                    base_price: price,
                })
                .await?;
            println!("created pizza {} ({})", pizza.name, pizza.id);
        }
        PizzasAction::Toggle { id } => {
            report_mutation(page.toggle_active(id).await?, &format!("pizza {}", id.short()));
        }
        PizzasAction::Edit {
            id,
            name,
            description,
            size,
            price,
        } => {
            let Some(current) = page.controller().find(id).await else {
                bail!("no pizza with id {id}");
            };
            page.quick_edit(
                id,
                PizzaEdit {
                    name: name.unwrap_or(current.name),
                    description: description.or(current.description).unwrap_or_default(),
                    size: size.or(current.size).unwrap_or_default(),
                    base_price: price.unwrap_or(current.base_price),
                },
            )
            .await?;
            println!("pizza {} updated", id.short());
        }
    }
    Ok(())
}

async fn run_ingredients(action: IngredientsAction, client: &AdminClient) -> Result<()> {
    let page = client.ingredients_page();
    page.load().await?;
    match action {
        IngredientsAction::List { page: number } => {
            let shown = page.show(number).await;
            for ingredient in &shown.items {
                println!(
                    "{}  {:<24} {:<14} {:>8.0}",
                    ingredient.id,
                    ingredient.name,
                    ingredient.category.as_deref().unwrap_or("-"),
                    ingredient.extra_price
                );
            }
            print_footer(&shown);
        }
        IngredientsAction::Create {
            name,
            category,
            price,
        } => {
            let ingredient = page
                .create(IngredientDraft {
                    name,
                    category,
                    extra_price: price,
                })
                .await?;
            println!("created ingredient {} ({})", ingredient.name, ingredient.id);
        }
        IngredientsAction::Edit {
            id,
            name,
            category,
            price,
        } => {
            let Some(current) = page.controller().find(id).await else {
                bail!("no ingredient with id {id}");
            };
            page.quick_edit(
                id,
                IngredientEdit {
                    name: name.unwrap_or(current.name),
                    category: category.or(current.category).unwrap_or_default(),
                    extra_price: price.unwrap_or(current.extra_price),
                },
            )
            .await?;
            println!("ingredient {} updated", id.short());
        }
    }
    Ok(())
}

async fn run_theme(action: &ThemeAction, themes: ThemeStore) -> Result<()> {
    let theme = match action {
        ThemeAction::Show => themes.current().await?,
        ThemeAction::Toggle => themes.toggle().await?,
    };
    let class = theme.document_class().unwrap_or("(none)");
    println!("theme: {theme} (document class: {class})");
    if theme == Theme::Dark {
        info!("dark mode enabled");
    }
    Ok(())
}

fn report_mutation(outcome: MutationOutcome, what: &str) {
    match outcome {
        MutationOutcome::Committed => println!("{what} updated"),
        MutationOutcome::RolledBack { error, reloaded } => {
            println!("{what} was not updated: {}", error.message);
            if !reloaded {
                println!("the list could not be refreshed either");
            }
        }
    }
}

fn print_order(order: &Order) {
    println!(
        "{}  {:<16} {:>10.0}  {:<20} {}",
        order.id.short(),
        order.status,
        order.total,
        order.customer_name(),
        order.created_at.format("%Y-%m-%d %H:%M")
    );
}

fn print_footer<T>(page: &Page<T>) {
    if page.total_items == 0 {
        println!("(nothing to show)");
        return;
    }
    println!(
        "page {}/{}  showing {}-{} of {}",
        page.number,
        page.total_pages,
        page.range.start + 1,
        page.range.end,
        page.total_items
    );
}

fn print_notices(events: &mut broadcast::Receiver<ClientEvent>) {
    while let Ok(event) = events.try_recv() {
        if let ClientEvent::Notice(notice) = event {
            eprintln!("[{:?}] {}", notice.category, notice.message);
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
