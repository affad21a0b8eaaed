use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use quill::auth::password::hash_password;
use quill::auth::AuthService;
use quill::config::{AuthMode, Config};
use quill::models::NewUser;
use quill::slug::slugify;
use quill::storage::{SqliteStorage, Storage, StorageError};

/// Categories seeded by `init` into an empty database
const DEFAULT_CATEGORIES: [&str; 7] = [
    "Technology",
    "Lifestyle",
    "Health",
    "Business",
    "Travel",
    "Food",
    "Science",
];

#[derive(Parser)]
#[command(name = "quill-admin")]
#[command(about = "Quill admin management CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema and seed default categories
    Init,
    /// Create a user account
    CreateUser {
        name: String,
        email: String,
        #[arg(long, default_value = "")]
        bio: String,
        #[arg(long)]
        avatar: Option<String>,
        /// Allow logging in with this password
        #[arg(long)]
        password: Option<String>,
    },
    /// Issue an access token for a user
    IssueToken {
        user_id: i64,
    },
    /// List all categories
    ListCategories,
    /// Add a category
    AddCategory {
        name: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    let storage = SqliteStorage::new(&config.database.url, config.database.max_connections).await?;

    // Ensure database is initialized
    storage.init().await?;

    match cli.command {
        Commands::Init => {
            if storage.list_categories().await?.is_empty() {
                for name in DEFAULT_CATEGORIES {
                    storage.create_category(name, &slugify(name)).await?;
                }
                println!("✓ Seeded {} default categories", DEFAULT_CATEGORIES.len());
            } else {
                println!("✓ Database ready (categories already present)");
            }
        }
        Commands::CreateUser {
            name,
            email,
            bio,
            avatar,
            password,
        } => {
            let new_user = NewUser {
                name,
                email,
                bio,
                avatar,
            };
            let created = match password.as_deref() {
                Some(password) => {
                    let hash = hash_password(password)?;
                    storage.create_user_with_password(&new_user, &hash).await
                }
                None => storage.create_user(&new_user).await,
            };
            let user = created
                .map_err(|e| match e {
                    StorageError::Conflict => anyhow::anyhow!("a user with this email already exists"),
                    other => other.into(),
                })?;
            println!("✓ Created user {} <{}> with id {}", user.name, user.email, user.id);
        }
        Commands::IssueToken { user_id } => {
            if !matches!(config.auth.mode, AuthMode::Jwt) {
                bail!("tokens are only used when AUTH_MODE=jwt");
            }
            let user = storage
                .get_user(user_id)
                .await?
                .with_context(|| format!("user {user_id} not found"))?;
            let token = AuthService::new(&config.auth)?.issue_token(user.id)?;
            println!("{token}");
        }
        Commands::ListCategories => {
            let categories = storage.list_categories().await?;
            if categories.is_empty() {
                println!("No categories found. Run `quill-admin init` to seed defaults.");
            } else {
                println!("{:<6} {:<24} {}", "ID", "Name", "Slug");
                println!("{}", "-".repeat(50));
                for category in categories {
                    println!("{:<6} {:<24} {}", category.id, category.name, category.slug);
                }
            }
        }
        Commands::AddCategory { name } => {
            let slug = slugify(&name);
            if slug.is_empty() {
                bail!("category name '{name}' does not produce a usable slug");
            }
            let category = storage
                .create_category(name.trim(), &slug)
                .await
                .map_err(|e| match e {
                    StorageError::Conflict => anyhow::anyhow!("category '{slug}' already exists"),
                    other => other.into(),
                })?;
            println!("✓ Added category '{}' ({})", category.name, category.slug);
        }
    }

    Ok(())
}
