use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use orgdesk::crud::{CrudClient, Editor, QueryCache, ResourceSchema};
use orgdesk::forms::{BookDemoField, BookDemoForm, LoginForm, RegisterForm};
use orgdesk::net::ReqwestTransport;
use orgdesk::session::storage::FileStorage;
use orgdesk::{ApiError, AuthGateway, ClientConfig, FormError, SessionStore, resources};
use serde_json::{Value, json};

#[cfg(test)]
#[path = "main_test.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("not signed in; run `orgdesk-cli login <username>` first")]
    NotSignedIn,
    #[error("invalid --field `{0}`; expected key=value")]
    InvalidField(String),
    #[error("resource `{resource}` has no field `{field}`")]
    UnknownField { resource: String, field: String },
    #[error("{resource} item `{id}` not found")]
    NotFound { resource: String, id: String },
    #[error("io failed: {0}")]
    Io(#[from] io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "orgdesk-cli", about = "orgdesk API client")]
struct Cli {
    #[arg(long, env = "ORGDESK_API_URL")]
    base_url: Option<String>,

    #[arg(long, env = "ORGDESK_STATE_DIR", help = "Directory holding session.json")]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and persist the session.
    Login(LoginArgs),
    /// Forget the persisted session.
    Logout,
    /// Print the signed-in user.
    Whoami,
    /// Register a new organization and its admin account.
    Register(RegisterArgs),
    /// Request a product demo.
    BookDemo(BookDemoArgs),
    /// List, create, update, or delete items of a resource.
    Resource(ResourceCommand),
}

#[derive(Args, Debug)]
struct LoginArgs {
    username: String,
    #[arg(long, help = "Read from stdin when omitted")]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct RegisterArgs {
    #[arg(long)]
    org_name: String,
    #[arg(long)]
    industry: String,
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm: String,
}

#[derive(Args, Debug)]
struct BookDemoArgs {
    #[arg(long)]
    full_name: String,
    #[arg(long)]
    email: String,
    #[arg(long, default_value = "")]
    company: String,
    #[arg(long, default_value = "")]
    phone: String,
    #[arg(long, default_value = "")]
    datetime: String,
    #[arg(long, default_value = "")]
    message: String,
}

#[derive(Args, Debug)]
struct ResourceCommand {
    /// Collection name, e.g. `users`.
    path: String,
    #[command(subcommand)]
    command: ResourceSubcommand,
}

#[derive(Subcommand, Debug)]
enum ResourceSubcommand {
    List,
    Create {
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    Update {
        id: String,
        #[arg(long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },
    Delete {
        id: String,
    },
}

type Gateway = AuthGateway<ReqwestTransport>;

#[tokio::main]
async fn main() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let gateway = build_gateway(&cli)?;

    match cli.command {
        Command::Login(args) => run_login(&gateway, args).await,
        Command::Logout => {
            gateway.logout();
            print_json(&json!({ "signed_in": false }))
        }
        Command::Whoami => run_whoami(&gateway),
        Command::Register(args) => run_register(&gateway, args).await,
        Command::BookDemo(args) => run_book_demo(&gateway, args).await,
        Command::Resource(resource) => run_resource(gateway, resource).await,
    }
}

fn build_gateway(cli: &Cli) -> Result<Gateway, CliError> {
    let mut config = ClientConfig::from_env()?;
    if let Some(url) = &cli.base_url {
        config.base_url = ClientConfig::new(url)?.base_url;
    }
    if let Some(dir) = &cli.state_dir {
        config.state_dir.clone_from(dir);
    }

    let storage = FileStorage::in_dir(&config.state_dir);
    tracing::debug!(path = %storage.path().display(), base_url = %config.base_url, "cli configured");
    let session = Arc::new(SessionStore::new(storage));
    let transport = ReqwestTransport::new(config.timeouts)?;
    let gateway = AuthGateway::new(config, transport, session);
    gateway.restore();
    Ok(gateway)
}

async fn run_login(gateway: &Gateway, args: LoginArgs) -> Result<(), CliError> {
    let password = match args.password {
        Some(password) => password,
        None => prompt_password()?,
    };
    let mut form = LoginForm::default();
    form.username = args.username;
    form.password = password;
    let session = form.submit(gateway).await?;
    print_json(&json!({ "signed_in": true, "user": session.user() }))
}

fn run_whoami(gateway: &Gateway) -> Result<(), CliError> {
    let session = gateway.session().snapshot();
    let user = session.user().ok_or(CliError::NotSignedIn)?;
    print_json(user)
}

async fn run_register(gateway: &Gateway, args: RegisterArgs) -> Result<(), CliError> {
    let mut form = RegisterForm::default();
    form.org_name = args.org_name;
    form.industry = args.industry;
    form.username = args.username;
    form.email = args.email;
    form.password = args.password;
    form.confirm = args.confirm;
    let detail = form.submit(gateway).await?;
    print_json(&json!({ "detail": detail }))
}

async fn run_book_demo(gateway: &Gateway, args: BookDemoArgs) -> Result<(), CliError> {
    let mut form = BookDemoForm::new();
    for (field, value) in [
        (BookDemoField::FullName, &args.full_name),
        (BookDemoField::Email, &args.email),
        (BookDemoField::Company, &args.company),
        (BookDemoField::Phone, &args.phone),
        (BookDemoField::DateTime, &args.datetime),
        (BookDemoField::Message, &args.message),
    ] {
        form.set(field, value);
    }
    let ack = form.submit(gateway).await?;
    print_json(&ack)
}

async fn run_resource(gateway: Gateway, resource: ResourceCommand) -> Result<(), CliError> {
    let schema = schema_for(&resource.path, &resource.command);
    let client = CrudClient::new(Arc::new(gateway), Arc::new(QueryCache::new()), schema);

    match resource.command {
        ResourceSubcommand::List => {
            let items = client.list().await?;
            print_json(&Value::Array(items.into_iter().map(Value::Object).collect()))
        }
        ResourceSubcommand::Create { fields } => {
            let mut editor = Editor::new();
            editor.open_create(client.schema());
            apply_fields(&mut editor, client.schema(), &fields)?;
            submit(&client, &mut editor).await
        }
        ResourceSubcommand::Update { id, fields } => {
            let items = client.list().await?;
            let item = items
                .iter()
                .find(|item| orgdesk::crud::schema::item_id(item).as_deref() == Some(id.as_str()))
                .ok_or_else(|| CliError::NotFound { resource: resource.path.clone(), id: id.clone() })?;
            let mut editor = Editor::new();
            editor.open_edit(client.schema(), item)?;
            apply_fields(&mut editor, client.schema(), &fields)?;
            submit(&client, &mut editor).await
        }
        ResourceSubcommand::Delete { id } => {
            client.delete(&id).await?;
            print_json(&json!({ "deleted": id }))
        }
    }
}

/// Registered schema for `path`, or an all-text one built from the given
/// `--field` keys.
fn schema_for(path: &str, command: &ResourceSubcommand) -> ResourceSchema {
    if let Some(schema) = resources::lookup(path) {
        return schema;
    }
    let names: Vec<&str> = match command {
        ResourceSubcommand::Create { fields } | ResourceSubcommand::Update { fields, .. } => {
            fields.iter().map(|(k, _)| k.as_str()).collect()
        }
        ResourceSubcommand::List | ResourceSubcommand::Delete { .. } => Vec::new(),
    };
    ResourceSchema::ad_hoc(path, names)
}

fn apply_fields(editor: &mut Editor, schema: &ResourceSchema, fields: &[(String, String)]) -> Result<(), CliError> {
    for (name, value) in fields {
        if schema.field(name).is_none() {
            return Err(CliError::UnknownField { resource: schema.path.clone(), field: name.clone() });
        }
        editor.set(name, value);
    }
    Ok(())
}

async fn submit(client: &CrudClient<ReqwestTransport>, editor: &mut Editor) -> Result<(), CliError> {
    let Some(request) = editor.begin_submit(client.schema()) else {
        return Ok(());
    };
    let result = client.save(request).await;
    editor.finish_submit(&result);
    print_json(&result?)
}

fn parse_field(raw: &str) -> Result<(String, String), CliError> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_owned(), value.to_owned())),
        _ => Err(CliError::InvalidField(raw.to_owned())),
    }
}

fn prompt_password() -> Result<String, CliError> {
    eprint!("password: ");
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}
