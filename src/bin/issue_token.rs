use anyhow::{bail, Context};
use clap::Parser;
use std::time::Duration;

use essay_api::auth::{ClassList, Claims, Role, TokenVerifier};
use essay_api::config::parse_duration_secs;

const DEFAULT_EXPIRES_IN: &str = "7d";

#[derive(Parser)]
#[command(name = "issue-token")]
#[command(about = "Mint a bearer token for local testing, signed with JWT_SECRET")]
#[command(version)]
struct Cli {
    #[arg(help = "Email carried in the token")]
    email: String,

    #[arg(long, default_value = "teachers", help = "Role: teachers or students")]
    role: Role,

    #[arg(long, default_value = "mock-member-id", help = "Member id")]
    member_id: String,

    #[arg(long, default_value = "demo-school", help = "School")]
    school: String,

    #[arg(long = "class", default_value = "demo-class", help = "Comma-separated class list")]
    classes: String,
}

fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let secret = std::env::var("JWT_SECRET").context("JWT_SECRET must be set")?;
    if secret.trim().is_empty() {
        bail!("JWT_SECRET must not be empty");
    }
    let expires_in = std::env::var("JWT_EXPIRES_IN").unwrap_or_else(|_| DEFAULT_EXPIRES_IN.to_string());
    let ttl = parse_duration_secs(&expires_in)
        .with_context(|| format!("invalid JWT_EXPIRES_IN: {}", expires_in))?;

    let claims = Claims {
        member_id: cli.member_id,
        role: cli.role,
        school: cli.school,
        email: cli.email,
        classes: ClassList::from(cli.classes),
    };

    let verifier = TokenVerifier::new(&secret, Duration::from_secs(ttl));
    let token = verifier.issue(&claims)?;
    let decoded = verifier.verify(&token)?;

    println!("{}", token);
    eprintln!("Expires in: {}", expires_in);
    eprintln!("Decoded payload:\n{}", serde_json::to_string_pretty(&decoded)?);
    eprintln!("Use as `Authorization: Bearer <token>` or `?jwt=<token>`");
    Ok(())
}
