use argon2::{
    password_hash::{rand_core::OsRng, PasswordHasher, SaltString},
    Argon2,
};
use clap::Parser;
use sea_orm::{ConnectionTrait, Database, DbBackend, Statement};
use std::env;

/// Create the initial admin profile.
#[derive(Parser)]
#[command(name = "seed_admin")]
struct Args {
    #[arg(long)]
    username: String,
    #[arg(long)]
    email: Option<String>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let password =
        rpassword::prompt_password("Password for new admin: ").expect("Failed to read password");
    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .expect("Failed to hash password")
        .to_string();

    let db = Database::connect(database_url)
        .await
        .expect("Failed to connect to database");

    db.execute(Statement::from_sql_and_values(
        DbBackend::Postgres,
        "INSERT INTO profiles (username, password, email, role, created_at) \
         VALUES ($1, $2, $3, 'admin', NOW())",
        [
            args.username.clone().into(),
            password_hash.into(),
            args.email.into(),
        ],
    ))
    .await
    .expect("Failed to insert admin profile");

    println!("Admin profile '{}' created", args.username);
}
