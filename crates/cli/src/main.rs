use anyhow::Context;
use clap::{Parser, Subcommand};
use folio_app::{
    app,
    modules::accounts::{self, models::NewAccount, repo},
};
use folio_authz::Role;
use folio_db::Database;
use folio_kernel::settings::Settings;

#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Folio catalogue and social API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Migrate the database and serve HTTP until Ctrl-C
    Serve,
    /// Apply pending migrations and exit
    Migrate,
    /// Create a user, or update the role of an existing one, and print its token
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value_t = Role::Member)]
        role: Role,
    },
    /// Print the merged OpenAPI document
    Openapi,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load().context("failed to load Folio settings")?;
    folio_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => app::serve(settings).await,
        Command::Migrate => {
            let db = app::connect(&settings).await?;
            let applied = app::migrate(&db, &app::registry()?).await?;
            db.close().await;
            println!("applied {applied} migration(s)");
            Ok(())
        }
        Command::CreateUser {
            username,
            password,
            email,
            role,
        } => {
            let db = app::connect(&settings).await?;
            app::migrate(&db, &app::registry()?).await?;
            let token = provision_user(&db, &username, &password, &email, role).await?;
            db.close().await;
            println!("{token}");
            Ok(())
        }
        Command::Openapi => {
            let spec = folio_http::openapi::merged_spec(&app::registry()?);
            println!("{}", serde_json::to_string_pretty(&spec)?);
            Ok(())
        }
    }
}

/// Get-or-create by username; an existing user keeps its password
async fn provision_user(
    db: &Database,
    username: &str,
    password: &str,
    email: &str,
    role: Role,
) -> anyhow::Result<String> {
    if let Some(user) = repo::find_by_username(db.pool(), username).await? {
        repo::set_role(db.pool(), user.id, role).await?;
        let mut conn = db.pool().acquire().await?;
        let token = repo::get_or_create_token(&mut conn, user.id).await?;
        tracing::info!(user_id = user.id, %role, "existing user updated");
        return Ok(token);
    }

    let (user, token) = accounts::create_account(
        db,
        NewAccount {
            username,
            email,
            bio: "",
            password,
            role,
        },
    )
    .await
    .with_context(|| format!("failed to create user '{username}'"))?;
    tracing::info!(user_id = user.id, %role, "user created");
    Ok(token)
}
