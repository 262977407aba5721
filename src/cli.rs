use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use log::debug;
use tokio::sync::watch;

use crate::api::bulk_email::NewRecipient;
use crate::api::models::{Id, ListQuery, NewTemplate, NewUser, RecipientStatus, SupportStatus};
use crate::app::AppConfig;
use crate::error::Result;
use crate::import::{CsvImporter, ImportProgress};
use crate::notify::{self, Level, Notification};
use crate::session::{Campaign, Session};
use crate::ui;

#[derive(Parser)]
#[command(name = "freespeek-admin", version, about = "FreeSpeek administration console", long_about = None)]
pub struct Cli {
    /// API base URL, overrides the saved and environment settings
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Admin secret sent as the bearer token
    #[arg(long, global = true)]
    secret: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check the backend and save `--api-url` and `--secret`
    Login,
    /// Print the effective configuration
    Config,
    #[command(subcommand)]
    Users(UsersCommand),
    #[command(subcommand)]
    Chats(ChatsCommand),
    #[command(subcommand)]
    Support(SupportCommand),
    /// Recipients, groups, templates and bulk sends
    #[command(subcommand)]
    Email(EmailCommand),
}

#[derive(Args, Debug, Clone)]
pub struct PageArgs {
    #[arg(long, default_value_t = 1)]
    page: u32,
    #[arg(long, default_value_t = 20)]
    limit: u32,
    #[arg(long)]
    search: Option<String>,
    #[arg(long)]
    status: Option<String>,
}

impl From<&PageArgs> for ListQuery {
    fn from(args: &PageArgs) -> Self {
        ListQuery { page: args.page, limit: args.limit, search: args.search.clone(), status: args.status.clone() }
    }
}

#[derive(Subcommand)]
pub enum UsersCommand {
    List(PageArgs),
    Create {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        password: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ChatsCommand {
    List(PageArgs),
    Messages {
        chat_id: Id,
        #[command(flatten)]
        page: PageArgs,
    },
}

#[derive(Subcommand)]
pub enum SupportCommand {
    List {
        /// OPEN, PENDING or CLOSED
        #[arg(long)]
        status: Option<String>,
    },
    Reply { chat_id: Id, text: String },
    Close { chat_id: Id },
}

/// Recipients picked on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct RecipientArgs {
    #[arg(long = "recipient", value_name = "ID")]
    recipients: Vec<Id>,
    /// Every active recipient, fetching past the initial load threshold if needed
    #[arg(long)]
    all_active: bool,
}

#[derive(Subcommand)]
pub enum EmailCommand {
    /// Show one page of the recipient working set
    Recipients {
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// Rows per page, 0 shows every loaded recipient
        #[arg(long, default_value_t = crate::selection::DEFAULT_PAGE_SIZE)]
        page_size: usize,
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
        /// Fetch every recipient even past the load threshold
        #[arg(long)]
        all: bool,
    },
    AddRecipient {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "ACTIVE")]
        status: RecipientStatus,
    },
    /// Upload a CSV file with `name,email,status` columns
    Import { file: PathBuf },
    Groups,
    GroupCreate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        description: Option<String>,
        #[command(flatten)]
        members: RecipientArgs,
    },
    GroupAdd {
        group_id: Id,
        #[command(flatten)]
        members: RecipientArgs,
    },
    Templates,
    TemplateCreate {
        #[arg(long)]
        name: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        body: String,
        #[arg(long)]
        html: bool,
    },
    /// Render a template for one recipient
    Preview {
        template_id: Id,
        #[arg(long = "recipient", value_name = "ID")]
        recipient: Option<Id>,
    },
    Send {
        #[arg(long)]
        subject: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        html: bool,
        #[arg(long = "template", value_name = "ID")]
        template: Option<Id>,
        #[arg(long = "group", value_name = "ID")]
        groups: Vec<Id>,
        #[command(flatten)]
        members: RecipientArgs,
        /// Print the resolved send without sending it
        #[arg(long)]
        dry_run: bool,
    },
    History {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    Stats,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let mut config = AppConfig::load();
        if let Some(url) = &self.api_url {
            config.api_url = crate::utils::normalize_url(url);
        }
        if let Some(secret) = &self.secret {
            config.admin_secret = secret.clone();
        }
        debug!("Using {} profile at {}", config.environment.label(), config.api_url);

        let (result, shown) = match self.command {
            Commands::Login => {
                let api_url = self.api_url.unwrap_or_default();
                let secret = self.secret.unwrap_or_default();
                match ui::login::connect(&api_url, &secret).await {
                    Ok((login, note)) => {
                        println!("{}: {}", login.api_url, login.message);
                        (Ok(()), vec![note])
                    }
                    Err(e) => (Err(e), Vec::new()),
                }
            }
            Commands::Config => {
                print_config(&config);
                (Ok(()), Vec::new())
            }
            command => match Session::new(config) {
                Ok(mut session) => {
                    let result = dispatch(&mut session, command).await;
                    (result, session.store.take_notifications())
                }
                Err(e) => (Err(e), Vec::new()),
            },
        };

        for note in &shown {
            notify::show(note);
        }
        if let Err(e) = &result {
            if !shown.iter().any(|n| n.level == Level::Error) {
                notify::show(&Notification::error(e.user_message()));
            }
        }
        result
    }
}

fn print_config(config: &AppConfig) {
    println!("Environment:         {}", config.environment.label());
    println!("API URL:             {}", config.api_url);
    println!("Asset URL:           {}", config.asset_url);
    println!("Admin secret:        {}", config.masked_secret());
    println!("Recipient threshold: {}", config.recipient_threshold);
    println!("Max upload:          {} MB", config.max_upload_bytes / (1024 * 1024));
    if let Some(path) = crate::app::ConfigFile::path() {
        println!("Config file:         {}", path.display());
    }
}

async fn dispatch(session: &mut Session, command: Commands) -> Result<()> {
    match command {
        Commands::Users(cmd) => users(session, cmd).await,
        Commands::Chats(cmd) => chats(session, cmd).await,
        Commands::Support(cmd) => support(session, cmd).await,
        Commands::Email(cmd) => email(session, cmd).await,
        Commands::Login | Commands::Config => Ok(()),
    }
}

async fn users(session: &mut Session, cmd: UsersCommand) -> Result<()> {
    match cmd {
        UsersCommand::List(args) => {
            session.load_users(&ListQuery::from(&args)).await?;
            let users = &session.store.state().users;
            ui::users_view::print_users(&users.items, users.pagination.as_ref());
        }
        UsersCommand::Create { name, email, username, password } => {
            session.create_user(NewUser { name, email, username, password }).await?;
        }
    }
    Ok(())
}

async fn chats(session: &mut Session, cmd: ChatsCommand) -> Result<()> {
    match cmd {
        ChatsCommand::List(args) => {
            session.load_chats(&ListQuery::from(&args)).await?;
            let chats = &session.store.state().chats;
            ui::chat_view::print_chats(&chats.items);
            ui::print_pagination(chats.pagination.as_ref());
        }
        ChatsCommand::Messages { chat_id, page } => {
            session.load_messages(&chat_id, &ListQuery::from(&page)).await?;
            let messages = session.store.state().messages.get(&chat_id).map(Vec::as_slice).unwrap_or_default();
            ui::chat_view::print_messages(messages);
        }
    }
    Ok(())
}

async fn support(session: &mut Session, cmd: SupportCommand) -> Result<()> {
    match cmd {
        SupportCommand::List { status } => {
            let query = ListQuery { status, ..ListQuery::default() };
            session.load_support_chats(&query).await?;
            ui::support_view::print_support_chats(&session.store.state().support_chats.items);
        }
        SupportCommand::Reply { chat_id, text } => {
            session.load_support_chats(&ListQuery::default()).await?;
            session.reply_support(&chat_id, &text).await?;
            if let Some(chat) = session.store.state().support_chats.items.iter().find(|c| c.id == chat_id) {
                ui::support_view::print_conversation(chat);
            }
        }
        SupportCommand::Close { chat_id } => {
            session.set_support_status(&chat_id, SupportStatus::Closed).await?;
        }
    }
    Ok(())
}

async fn email(session: &mut Session, cmd: EmailCommand) -> Result<()> {
    match cmd {
        EmailCommand::Recipients { page, page_size, search, status, all } => {
            session.selection.page_size = page_size;
            let outcome = session.load_recipients(search, status).await;
            if let Some(e) = outcome.error {
                return Err(e);
            }
            if all && !outcome.has_loaded_all {
                session.load_all_recipients().await?;
            }
            session.selection.set_page(page);
            ui::email_view::print_recipient_page(&session.selection);
        }
        EmailCommand::AddRecipient { name, email, status } => {
            session.add_recipient(NewRecipient { name, email, status }).await?;
        }
        EmailCommand::Import { file } => {
            let importer = CsvImporter::new(session.client.clone(), session.config.max_upload_bytes);
            let (tx, rx) = watch::channel(ImportProgress::default());
            let bar = ui::progress::spawn_import_bar(rx);
            let result = importer.import(&file, &tx).await;
            drop(tx);
            if let Err(e) = bar.await {
                debug!("Progress display ended early: {e}");
            }
            match result {
                Ok(summary) => {
                    session.store.notify(Notification::success(format!(
                        "Imported {} of {} recipients",
                        summary.imported, summary.total_rows
                    )));
                    if summary.failed > 0 {
                        session.store.notify(Notification::warning(format!("{} rows failed", summary.failed)));
                    }
                    for err in summary.errors.iter().take(10) {
                        eprintln!("  {err}");
                    }
                }
                Err(e) => {
                    session.store.notify(Notification::error(format!("Import failed: {}", e.user_message())));
                    return Err(e);
                }
            }
        }
        EmailCommand::Groups => {
            session.load_groups().await?;
            ui::email_view::print_groups(&session.store.state().groups.items);
        }
        EmailCommand::GroupCreate { name, description, members } => {
            session.create_group_with(name, description, &members.recipients, members.all_active).await?;
        }
        EmailCommand::GroupAdd { group_id, members } => {
            session.add_to_group_with(&group_id, &members.recipients, members.all_active).await?;
        }
        EmailCommand::Templates => {
            session.load_templates().await?;
            ui::email_view::print_templates(&session.store.state().templates.items);
        }
        EmailCommand::TemplateCreate { name, subject, body, html } => {
            session.create_template(NewTemplate { name, subject, body, is_html: html }).await?;
        }
        EmailCommand::Preview { template_id, recipient } => {
            let rendered = session.preview(&template_id, recipient.as_deref()).await?;
            println!("Subject: {}", rendered.subject);
            println!();
            println!("{}", rendered.body);
        }
        EmailCommand::Send { subject, body, html, template, groups, members, dry_run } => {
            let campaign = Campaign {
                subject,
                body,
                is_html: html,
                template_id: template,
                group_ids: groups,
                recipient_ids: members.recipients,
                all_active: members.all_active,
            };
            let request = session.compose(&campaign).await?;
            ui::email_view::print_send_summary(&request);
            if !dry_run {
                session.send(&request).await?;
            }
        }
        EmailCommand::History { page, limit } => {
            session.load_history(&ListQuery::new(page, limit)).await?;
            let history = &session.store.state().history;
            ui::email_view::print_history(&history.items, history.pagination.as_ref());
        }
        EmailCommand::Stats => {
            session.load_stats().await?;
            if let Some(stats) = &session.store.state().stats {
                ui::email_view::print_stats(stats);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_tree_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn send_collects_repeated_flags() {
        let cli = Cli::try_parse_from([
            "freespeek-admin",
            "email",
            "send",
            "--subject",
            "Hi",
            "--body",
            "Hello",
            "--group",
            "1",
            "--group",
            "2",
            "--recipient",
            "r9",
        ])
        .unwrap();
        match cli.command {
            Commands::Email(EmailCommand::Send { groups, members, dry_run, .. }) => {
                assert_eq!(groups, vec!["1", "2"]);
                assert_eq!(members.recipients, vec!["r9"]);
                assert!(!members.all_active);
                assert!(!dry_run);
            }
            _ => panic!("expected email send"),
        }
    }

    #[test]
    fn add_recipient_parses_status() {
        let cli = Cli::try_parse_from([
            "freespeek-admin",
            "email",
            "add-recipient",
            "--name",
            "Ann",
            "--email",
            "ann@x.io",
            "--status",
            "suspended",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Email(EmailCommand::AddRecipient { status: RecipientStatus::Suspended, .. })
        ));
    }
}
