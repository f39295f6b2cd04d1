use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use material_register::{
    auth::AuthService,
    config::{self, AppConfig},
    db::{self, DbPool},
    handlers::AppServices,
    services::{partners::NewPartner, seed},
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = AdminContext::initialize().await?;

    match cli.command {
        Commands::Migrate => handle_migrate(&context).await?,
        Commands::Seed(args) => handle_seed(&context, args, cli.json).await?,
        Commands::CreateUser(args) => handle_create_user(&context, args, cli.json).await?,
        Commands::CreateApiKey(args) => handle_create_api_key(&context, args, cli.json).await?,
        Commands::RevokeApiKey(args) => handle_revoke_api_key(&context, args).await?,
        Commands::CreatePartner(args) => handle_create_partner(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(
    name = "material-admin",
    about = "Administration of the material register: schema, demo data, users and API keys",
    version
)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending database migrations
    Migrate,
    /// Insert the demo partner, user and materials
    Seed(SeedArgs),
    /// Create a user that can authenticate with Basic credentials
    CreateUser(CreateUserArgs),
    /// Issue an API key for a user; the key is printed once
    CreateApiKey(CreateApiKeyArgs),
    /// Delete an API key
    RevokeApiKey(RevokeApiKeyArgs),
    /// Register a supplier partner
    CreatePartner(CreatePartnerArgs),
}

#[derive(Args)]
struct SeedArgs {
    #[arg(long, help = "Password for the demo user (defaults to the configured one)")]
    password: Option<String>,
}

#[derive(Args)]
struct CreateUserArgs {
    #[arg(long, help = "Login used for Basic authentication")]
    login: String,
    #[arg(long, help = "Display name")]
    name: Option<String>,
    #[arg(long, help = "Password for the account")]
    password: String,
}

#[derive(Args)]
struct CreateApiKeyArgs {
    #[arg(long, help = "Login of the user owning the key")]
    login: String,
    #[arg(long, default_value = "cli", help = "Label for the key")]
    name: String,
    #[arg(long, help = "Scope stored on the key (defaults to the configured API scope)")]
    scope: Option<String>,
    #[arg(
        long,
        action = ArgAction::SetTrue,
        conflicts_with = "scope",
        help = "Store no scope so the key is valid for every scope"
    )]
    unscoped: bool,
    #[arg(long, help = "Expire the key after this many days")]
    expires_in_days: Option<i64>,
}

#[derive(Args)]
struct RevokeApiKeyArgs {
    #[arg(help = "Identifier of the API key")]
    id: i32,
}

#[derive(Args)]
struct CreatePartnerArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    phone: Option<String>,
}

struct AdminContext {
    config: AppConfig,
    db: Arc<DbPool>,
    auth_service: Arc<AuthService>,
    services: AppServices,
}

impl AdminContext {
    async fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json, config.otel_enabled);

        let db_pool = db::establish_connection_from_app_config(&config)
            .await
            .context("failed to connect to database")?;
        let db = Arc::new(db_pool);

        let auth_service = Arc::new(AuthService::new(
            db.clone(),
            config.api_key_scope.clone(),
            config.api_key_prefix.clone(),
        ));

        let services = AppServices::new(db.clone(), &config);

        Ok(Self {
            config,
            db,
            auth_service,
            services,
        })
    }
}

async fn handle_migrate(context: &AdminContext) -> Result<()> {
    db::run_migrations(&context.db)
        .await
        .context("failed to run migrations")?;
    println!("Migrations applied");
    Ok(())
}

async fn handle_seed(context: &AdminContext, args: SeedArgs, json: bool) -> Result<()> {
    let password = args
        .password
        .unwrap_or_else(|| context.config.demo_password.clone());
    let summary = seed::seed_demo_data(
        context.db.clone(),
        &context.services,
        &context.auth_service,
        &password,
    )
    .await
    .context("failed to seed demo data")?;

    if json {
        print_json(&summary)?;
    } else {
        println!(
            "Seeded {} partner(s), {} user(s), {} material(s)",
            summary.partners, summary.users, summary.materials
        );
    }
    Ok(())
}

async fn handle_create_user(context: &AdminContext, args: CreateUserArgs, json: bool) -> Result<()> {
    let name = args.name.unwrap_or_else(|| args.login.clone());
    let user = context
        .auth_service
        .create_user(&args.login, &name, &args.password)
        .await
        .context("failed to create user")?;

    if json {
        print_json(&user)?;
    } else {
        println!("User {} created (id {})", user.login, user.id);
    }
    Ok(())
}

async fn handle_create_api_key(
    context: &AdminContext,
    args: CreateApiKeyArgs,
    json: bool,
) -> Result<()> {
    let user = context
        .auth_service
        .find_user_by_login(&args.login)
        .await
        .context("failed to look up user")?
        .ok_or_else(|| anyhow!("no user with login '{}'", args.login))?;

    let scope = if args.unscoped {
        None
    } else {
        Some(
            args.scope
                .unwrap_or_else(|| context.auth_service.scope().to_string()),
        )
    };

    let issued = context
        .auth_service
        .issue_api_key(user.id, &args.name, scope, args.expires_in_days)
        .await
        .context("failed to issue API key")?;

    if json {
        print_json(&issued)?;
    } else {
        println!("API key {} issued for {} (id {})", issued.name, user.login, issued.id);
        if let Some(expires_at) = issued.expires_at {
            println!("Expires at: {}", expires_at.to_rfc3339());
        }
        println!("Key (shown once): {}", issued.key);
    }
    Ok(())
}

async fn handle_revoke_api_key(context: &AdminContext, args: RevokeApiKeyArgs) -> Result<()> {
    let revoked = context
        .auth_service
        .revoke_api_key(args.id)
        .await
        .context("failed to revoke API key")?;
    if !revoked {
        return Err(anyhow!("no API key with id {}", args.id));
    }
    println!("API key {} revoked", args.id);
    Ok(())
}

async fn handle_create_partner(
    context: &AdminContext,
    args: CreatePartnerArgs,
    json: bool,
) -> Result<()> {
    let partner = context
        .services
        .partners
        .create(NewPartner {
            name: args.name,
            email: args.email,
            phone: args.phone,
        })
        .await
        .context("failed to create partner")?;

    if json {
        print_json(&partner)?;
    } else {
        println!("Partner {} created (id {})", partner.name, partner.id);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
