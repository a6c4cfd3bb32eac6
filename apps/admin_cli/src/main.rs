use std::{path::PathBuf, sync::Arc};

use admin_core::{
    dashboard::{pending_reports, recent_pets, recent_users},
    list_breeds, project_page, AccessValidator, ActionDispatcher, AdminPrincipal, BreedDraft,
    DashboardStats, DisplayRow, ListController, PetUpdate, ReportDecision, ReportTally,
    RowActions, Session, UserUpdate,
};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use gateway::{Gateway, RestGateway};
use shared::{
    domain::{DeletionRequest, Foundation, Pet, Report, Role, User},
    entity::{
        DeletionRequestField, Entity, FoundationField, PetField, ReportField, UserField,
    },
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;
mod output;

use config::{load_settings, Overrides};

#[derive(Parser, Debug)]
#[command(name = "petadmin", version, about = "Back-office console for the pet platform")]
struct Cli {
    /// Config file; defaults to ./petadmin.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    backend_url: Option<String>,
    #[arg(long, global = true)]
    api_key: Option<String>,
    /// Access token of the signed-in admin session.
    #[arg(long, global = true)]
    access_token: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Headline tallies, the newest profiles and pets, and pending reports.
    Stats,
    #[command(subcommand)]
    Users(UserCommand),
    #[command(subcommand)]
    Pets(PetCommand),
    #[command(subcommand)]
    Reports(ReportCommand),
    /// Shelters waiting for verification.
    #[command(subcommand)]
    Foundations(FoundationCommand),
    /// Account deletion requests.
    #[command(subcommand)]
    Deletions(DeletionCommand),
    /// Breed catalogue.
    #[command(subcommand)]
    Breeds(BreedCommand),
}

#[derive(Args, Debug)]
struct PageArg {
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Subcommand, Debug)]
enum UserCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        country: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    Edit {
        id: String,
        #[arg(long)]
        username: String,
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        trust_score: Option<i32>,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        city: Option<String>,
        /// Required when the edit changes the role.
        #[arg(long)]
        yes: bool,
    },
    Ban {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    Unban {
        id: String,
    },
    /// Toggles the manual veterinarian verification.
    Verify {
        id: String,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum PetCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        species: Option<String>,
        #[arg(long, value_parser = ["all", "lost", "adopted", "normal"])]
        status: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    Edit {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: Option<String>,
        #[arg(long)]
        breed: Option<String>,
        #[arg(long)]
        gender: Option<String>,
        #[arg(long)]
        bio: Option<String>,
        #[arg(long)]
        lost: bool,
        #[arg(long)]
        adopted: bool,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum ReportCommand {
    List {
        #[arg(long, value_parser = ["all", "pending", "resolved", "dismissed"])]
        status: Option<String>,
        #[arg(long, value_parser = ["all", "post", "comment"])]
        content_type: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    Resolve {
        id: String,
    },
    Dismiss {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Lowers the reported user's trust score and resolves the report.
    Warn {
        id: String,
    },
    /// Deletes the reported post or comment and resolves the report.
    DeleteContent {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    /// Bans the reported user and resolves the report.
    Ban {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
enum FoundationCommand {
    List {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, value_parser = ["all", "pending", "approved", "rejected"])]
        status: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    /// Approves the foundation and gives its owner the foundation role.
    Approve {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    Reject {
        id: String,
        /// Shown to the applicant.
        #[arg(long, default_value = "")]
        reason: String,
    },
}

#[derive(Subcommand, Debug)]
enum DeletionCommand {
    List {
        #[arg(long, value_parser = ["all", "pending", "completed", "rejected"])]
        status: Option<String>,
        #[command(flatten)]
        page: PageArg,
    },
    /// Permanently deletes the requesting account.
    Process {
        id: String,
        #[arg(long)]
        yes: bool,
    },
    Reject {
        id: String,
    },
}

#[derive(Subcommand, Debug)]
enum BreedCommand {
    List,
    Add {
        name: String,
        #[arg(long, default_value = "dog")]
        species: String,
    },
    Update {
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        species: String,
        #[arg(long)]
        inactive: bool,
    },
    Delete {
        id: String,
        #[arg(long)]
        yes: bool,
    },
}

struct Console {
    gateway: Arc<dyn Gateway>,
    dispatcher: ActionDispatcher,
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings(cli.config.as_deref())?;
    settings.apply_overrides(Overrides {
        backend_url: cli.backend_url,
        api_key: cli.api_key,
        access_token: cli.access_token,
    });
    let gateway: Arc<dyn Gateway> = Arc::new(
        RestGateway::new(settings.gateway_config()?).context("failed to set up store client")?,
    );

    let session = settings
        .access_token
        .as_deref()
        .map(Session::from_access_token)
        .transpose()?;
    let (principal, audit) = AccessValidator::new(gateway.clone())
        .sign_in(
            session.as_ref(),
            Utc::now(),
            Some(settings.user_agent.clone()),
        )
        .await
        .context("admin access denied")?;
    info!(user_id = %principal.user_id, role = principal.role.as_str(), "signed in");

    let console = Console {
        dispatcher: ActionDispatcher::new(gateway.clone(), audit),
        gateway,
    };

    match cli.command {
        Command::Stats => console.stats(&principal).await,
        Command::Users(command) => console.users(command).await,
        Command::Pets(command) => console.pets(command).await,
        Command::Reports(command) => console.reports(command).await,
        Command::Foundations(command) => console.foundations(command).await,
        Command::Deletions(command) => console.deletions(command).await,
        Command::Breeds(command) => console.breeds(command).await,
    }
}

fn confirm(yes: bool, what: &str) -> Result<()> {
    if !yes {
        bail!("refusing to {what} without --yes");
    }
    Ok(())
}

/// Role changes alter what a user may do, so they are confirmed like deletions.
fn confirm_user_edit(id: &str, role: Option<Role>, yes: bool) -> Result<()> {
    match role {
        Some(role) => confirm(
            yes,
            &format!("change the role of user {id} to {}", role.as_str()),
        ),
        None => Ok(()),
    }
}

fn removal_message(noun: &str, id: &str, removed: bool) -> String {
    if removed {
        format!("deleted {noun} {id}")
    } else {
        format!("no {noun} matched {id}; nothing was deleted")
    }
}

fn print_panel(title: &str, empty: &str, rows: &[DisplayRow]) {
    println!("\n{title}");
    if rows.is_empty() {
        println!("{empty}");
    } else {
        print!("{}", output::render_table(rows));
    }
}

impl Console {
    async fn load<E: Entity>(&self) -> Result<ListController<E>> {
        let controller = ListController::new(self.gateway.clone());
        controller
            .load()
            .await
            .with_context(|| format!("failed to load {}", E::TABLE))?;
        Ok(controller)
    }

    async fn stats(&self, principal: &AdminPrincipal) -> Result<()> {
        let stats = DashboardStats::load(self.gateway.as_ref())
            .await
            .context("failed to load dashboard tallies")?;
        let gateway = self.gateway.as_ref();
        let (users, pets, reports) = tokio::try_join!(
            recent_users(gateway),
            recent_pets(gateway),
            pending_reports(gateway)
        )
        .context("failed to load dashboard panels")?;
        let now = Utc::now();

        println!(
            "Signed in as {} ({})\n",
            principal
                .username
                .as_deref()
                .or(principal.email.as_deref())
                .unwrap_or(principal.user_id.as_str()),
            principal.role.label()
        );
        print!("{}", output::render_stats(&stats));
        print_panel("Recent users", "No users yet.", &project_page(&users, now));
        print_panel("Recent pets", "No pets yet.", &project_page(&pets, now));
        print_panel(
            "Pending reports",
            "No reports waiting.",
            &project_page(&reports, now),
        );
        Ok(())
    }

    async fn users(&self, command: UserCommand) -> Result<()> {
        match command {
            UserCommand::List {
                search,
                role,
                country,
                page,
            } => {
                let users = self.load::<User>().await?;
                if let Some(role) = role {
                    users.set_filter(UserField::Role, role).await;
                }
                if let Some(country) = country {
                    users.set_filter(UserField::Country, country).await;
                }
                if let Some(search) = search {
                    users.set_search(search).await;
                }
                users.go_to_page(page.page).await;

                let rows = project_page(&users.current_page_items().await, Utc::now());
                print!("{}", output::render_list("users", &rows, &users.page_info().await));
            }
            UserCommand::Edit {
                id,
                username,
                role,
                trust_score,
                country,
                city,
                yes,
            } => {
                let role = role.map(|r| r.parse::<Role>()).transpose()?;
                confirm_user_edit(&id, role, yes)?;
                let edit = UserUpdate {
                    username,
                    role,
                    trust_score,
                    country,
                    city,
                };
                let user = RowActions::<User>::edit(&self.dispatcher, &id, edit).await?;
                println!("updated user {} ({})", user.id, user.display_name());
            }
            UserCommand::Ban { id, yes } => {
                confirm(yes, &format!("ban user {id}"))?;
                let user = self.dispatcher.ban_user(&id).await?;
                println!("banned user {} ({})", user.id, user.display_name());
            }
            UserCommand::Unban { id } => {
                let user = self.dispatcher.unban_user(&id).await?;
                println!("restored user {} ({})", user.id, user.display_name());
            }
            UserCommand::Verify { id } => {
                let user = self.dispatcher.toggle_vet_verification(&id).await?;
                let state = if user.is_verified_vet() {
                    "verified"
                } else {
                    "no longer verified"
                };
                println!("{} is {state} as a veterinarian", user.display_name());
            }
            UserCommand::Delete { id, yes } => {
                confirm(yes, &format!("delete user {id}"))?;
                let removed = RowActions::<User>::delete(&self.dispatcher, &id).await?;
                println!("{}", removal_message("user", &id, removed));
            }
        }
        Ok(())
    }

    async fn pets(&self, command: PetCommand) -> Result<()> {
        match command {
            PetCommand::List {
                search,
                species,
                status,
                page,
            } => {
                let pets = self.load::<Pet>().await?;
                if let Some(species) = species {
                    pets.set_filter(PetField::Species, species).await;
                }
                if let Some(status) = status {
                    pets.set_filter(PetField::Status, status).await;
                }
                if let Some(search) = search {
                    pets.set_search(search).await;
                }
                pets.go_to_page(page.page).await;

                let rows = project_page(&pets.current_page_items().await, Utc::now());
                print!("{}", output::render_list("pets", &rows, &pets.page_info().await));
            }
            PetCommand::Edit {
                id,
                name,
                species,
                breed,
                gender,
                bio,
                lost,
                adopted,
            } => {
                let edit = PetUpdate {
                    name,
                    species,
                    breed,
                    gender,
                    bio,
                    lost,
                    adopted,
                };
                let pet = RowActions::<Pet>::edit(&self.dispatcher, &id, edit).await?;
                println!(
                    "updated pet {} ({}, {})",
                    pet.id,
                    pet.name.as_deref().unwrap_or("Unnamed"),
                    pet.status.as_deref().unwrap_or("active")
                );
            }
            PetCommand::Delete { id, yes } => {
                confirm(yes, &format!("delete pet {id}"))?;
                let removed = RowActions::<Pet>::delete(&self.dispatcher, &id).await?;
                println!("{}", removal_message("pet", &id, removed));
            }
        }
        Ok(())
    }

    async fn reports(&self, command: ReportCommand) -> Result<()> {
        match command {
            ReportCommand::List {
                status,
                content_type,
                page,
            } => {
                let reports = self.load::<Report>().await?;
                if let Some(status) = status {
                    reports.set_filter(ReportField::Status, status).await;
                }
                if let Some(content_type) = content_type {
                    reports.set_filter(ReportField::ContentType, content_type).await;
                }
                reports.go_to_page(page.page).await;

                let tally = reports
                    .read(|state| ReportTally::from_reports(state.all_items()))
                    .await;
                println!("{}\n", output::render_tally(&tally));
                let rows = project_page(&reports.current_page_items().await, Utc::now());
                print!("{}", output::render_list("reports", &rows, &reports.page_info().await));
            }
            ReportCommand::Resolve { id } => {
                let report = self
                    .dispatcher
                    .decide_report(&id, ReportDecision::Resolve)
                    .await?;
                println!("resolved report {}", report.id);
            }
            ReportCommand::Dismiss { id, yes } => {
                confirm(yes, &format!("dismiss report {id}"))?;
                let report = self
                    .dispatcher
                    .decide_report(&id, ReportDecision::Dismiss)
                    .await?;
                println!("dismissed report {}", report.id);
            }
            ReportCommand::Warn { id } => {
                let report = self.report(&id).await?;
                let Some(user_id) = report.reported_user_id else {
                    bail!("report {id} does not name a reported user");
                };
                let user = self.dispatcher.warn_user(user_id.as_str(), &id).await?;
                println!(
                    "warned {} (trust score now {})",
                    user.display_name(),
                    user.trust_score.unwrap_or_default()
                );
            }
            ReportCommand::DeleteContent { id, yes } => {
                confirm(yes, &format!("delete the content of report {id}"))?;
                let report = self.report(&id).await?;
                self.dispatcher.delete_reported_content(&report).await?;
                println!(
                    "deleted {} of report {id}",
                    report.content_type.as_deref().unwrap_or("content")
                );
            }
            ReportCommand::Ban { id, yes } => {
                confirm(yes, &format!("ban the user reported in {id}"))?;
                let report = self.report(&id).await?;
                let Some(user_id) = report.reported_user_id else {
                    bail!("report {id} does not name a reported user");
                };
                let user = self
                    .dispatcher
                    .ban_user_from_report(user_id.as_str(), &id)
                    .await?;
                println!("banned {} and resolved report {id}", user.display_name());
            }
        }
        Ok(())
    }

    async fn foundations(&self, command: FoundationCommand) -> Result<()> {
        match command {
            FoundationCommand::List {
                search,
                status,
                page,
            } => {
                let foundations = self.load::<Foundation>().await?;
                if let Some(status) = status {
                    foundations
                        .set_filter(FoundationField::Status, status)
                        .await;
                }
                if let Some(search) = search {
                    foundations.set_search(search).await;
                }
                foundations.go_to_page(page.page).await;

                let rows = project_page(&foundations.current_page_items().await, Utc::now());
                let info = foundations.page_info().await;
                print!("{}", output::render_list("foundations", &rows, &info));
            }
            FoundationCommand::Approve { id, yes } => {
                confirm(yes, &format!("approve foundation {id}"))?;
                let foundation = self.dispatcher.approve_foundation(&id).await?;
                println!(
                    "approved foundation {} ({})",
                    foundation.id,
                    foundation.name.as_deref().unwrap_or("Unnamed")
                );
            }
            FoundationCommand::Reject { id, reason } => {
                let foundation = self.dispatcher.reject_foundation(&id, &reason).await?;
                println!("rejected foundation {}", foundation.id);
            }
        }
        Ok(())
    }

    async fn deletions(&self, command: DeletionCommand) -> Result<()> {
        match command {
            DeletionCommand::List { status, page } => {
                let requests = self.load::<DeletionRequest>().await?;
                if let Some(status) = status {
                    requests
                        .set_filter(DeletionRequestField::Status, status)
                        .await;
                }
                requests.go_to_page(page.page).await;

                let rows = project_page(&requests.current_page_items().await, Utc::now());
                let info = requests.page_info().await;
                print!("{}", output::render_list("deletion requests", &rows, &info));
            }
            DeletionCommand::Process { id, yes } => {
                confirm(yes, &format!("permanently delete the account behind request {id}"))?;
                let request = self.dispatcher.process_deletion(&id).await?;
                println!("processed deletion request {}", request.id);
            }
            DeletionCommand::Reject { id } => {
                let request = self.dispatcher.reject_deletion(&id).await?;
                println!("rejected deletion request {}", request.id);
            }
        }
        Ok(())
    }

    async fn breeds(&self, command: BreedCommand) -> Result<()> {
        match command {
            BreedCommand::List => {
                let breeds = list_breeds(self.gateway.as_ref())
                    .await
                    .context("failed to load breeds")?;
                print!("{}", output::render_breeds(&breeds));
            }
            BreedCommand::Add { name, species } => {
                let draft = BreedDraft {
                    name,
                    species,
                    is_active: true,
                };
                let breed = self.dispatcher.add_breed(draft).await?;
                println!("added breed {}", breed.id);
            }
            BreedCommand::Update {
                id,
                name,
                species,
                inactive,
            } => {
                let draft = BreedDraft {
                    name,
                    species,
                    is_active: !inactive,
                };
                let breed = self.dispatcher.update_breed(&id, draft).await?;
                println!("updated breed {}", breed.id);
            }
            BreedCommand::Delete { id, yes } => {
                confirm(yes, &format!("delete breed {id}"))?;
                let removed = self.dispatcher.delete_breed(&id).await?;
                println!("{}", removal_message("breed", &id, removed));
            }
        }
        Ok(())
    }

    async fn report(&self, id: &str) -> Result<Report> {
        RowActions::<Report>::view(&self.dispatcher, id)
            .await?
            .with_context(|| format!("report {id} not found"))
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
