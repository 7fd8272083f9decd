//! Operator CLI handlers for seeding accounts and issuing tokens.
//!
//! Implements:
//! - `planhub org create <name>`
//! - `planhub user create <email> --org <id> [--role] [--trial]`
//! - `planhub project create <name> --org <id>`
//! - `planhub token issue --user <id> --org <id>`

use anyhow::{Context, Result, bail};
use sqlx::PgPool;
use uuid::Uuid;

use planhub_core::token::{TokenConfig, generate_token};
use planhub_db::models::{OrgRole, User};
use planhub_db::queries::{orgs, projects, users};

use crate::{OrgCommands, ProjectCommands, TokenCommands, UserCommands};

fn parse_id(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("invalid {what} ID: {raw}"))
}

// -----------------------------------------------------------------------
// planhub org
// -----------------------------------------------------------------------

pub async fn run_org_command(command: OrgCommands, pool: &PgPool) -> Result<()> {
    match command {
        OrgCommands::Create { name } => {
            let org = orgs::insert_org(pool, &name).await?;
            println!("Org created.");
            println!("  ID:   {}", org.id);
            println!("  Name: {}", org.name);
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// planhub user
// -----------------------------------------------------------------------

pub async fn run_user_command(command: UserCommands, pool: &PgPool) -> Result<()> {
    match command {
        UserCommands::Create {
            email,
            name,
            org,
            role,
            trial,
        } => {
            let org_id = parse_id(&org, "org")?;
            let role: OrgRole = role.parse()?;
            if orgs::get_org(pool, org_id).await?.is_none() {
                bail!("org {org_id} not found");
            }

            let display_name = name.unwrap_or_else(|| email.clone());
            let user = create_member(pool, org_id, &email, &display_name, role, trial).await?;

            println!("User created.");
            println!("  ID:    {}", user.id);
            println!("  Email: {}", user.email);
            println!("  Org:   {org_id} ({role})");
            println!("  Trial: {}", user.is_trial);
            Ok(())
        }
        UserCommands::Trial { user, enabled } => {
            let user_id = parse_id(&user, "user")?;
            users::set_user_trial(pool, user_id, enabled).await?;
            println!("User {user_id} trial = {enabled}.");
            Ok(())
        }
    }
}

/// Insert a user and their org membership in one transaction.
async fn create_member(
    pool: &PgPool,
    org_id: Uuid,
    email: &str,
    name: &str,
    role: OrgRole,
    is_trial: bool,
) -> Result<User> {
    let mut tx = pool.begin().await.context("failed to begin transaction")?;
    let user = users::insert_user(&mut *tx, email, name, is_trial).await?;
    orgs::upsert_org_user(&mut *tx, org_id, user.id, role).await?;
    tx.commit().await.context("failed to commit user creation")?;
    Ok(user)
}

// -----------------------------------------------------------------------
// planhub project
// -----------------------------------------------------------------------

pub async fn run_project_command(command: ProjectCommands, pool: &PgPool) -> Result<()> {
    match command {
        ProjectCommands::Create { name, org } => {
            let org_id = parse_id(&org, "org")?;
            if orgs::get_org(pool, org_id).await?.is_none() {
                bail!("org {org_id} not found");
            }
            let project = projects::insert_project(pool, org_id, &name).await?;
            println!("Project created.");
            println!("  ID:   {}", project.id);
            println!("  Name: {}", project.name);
            println!("  Org:  {}", project.org_id);
            Ok(())
        }
        ProjectCommands::List { org } => {
            let org_id = parse_id(&org, "org")?;
            let listed = projects::list_projects_for_org(pool, org_id).await?;
            if listed.is_empty() {
                println!("No projects in org {org_id}.");
                return Ok(());
            }
            for p in &listed {
                println!("{}  {}", p.id, p.name);
            }
            Ok(())
        }
    }
}

// -----------------------------------------------------------------------
// planhub token
// -----------------------------------------------------------------------

pub async fn run_token_command(
    command: TokenCommands,
    pool: &PgPool,
    tokens: &TokenConfig,
) -> Result<()> {
    match command {
        TokenCommands::Issue { user, org } => {
            let token = issue_token(pool, tokens, &user, &org).await?;
            println!("{token}");
            Ok(())
        }
    }
}

/// Issue a token after checking that the user belongs to the org.
async fn issue_token(pool: &PgPool, tokens: &TokenConfig, user: &str, org: &str) -> Result<String> {
    let user_id = parse_id(user, "user")?;
    let org_id = parse_id(org, "org")?;
    if orgs::get_org_role(pool, org_id, user_id).await?.is_none() {
        bail!("user {user_id} is not a member of org {org_id}");
    }
    Ok(generate_token(tokens, user_id, org_id))
}
