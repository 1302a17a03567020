// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Promote an existing account to SITE_ADMIN.
//!
//! Site admins cannot be created through the API; this bootstraps the first.

use anyhow::{bail, Context, Result};
use clap::Parser;
use gym_ledger::db::{AtomicSection, FirestoreDb, GymStore};
use gym_ledger::error::AppError;
use gym_ledger::models::{PermissionLevel, Role};
use gym_ledger::time_utils::now_rfc3339;

#[derive(Parser)]
#[command(about = "Promote an existing account to SITE_ADMIN (lvl 100)")]
struct Args {
    /// Email of the account to promote
    #[arg(long, conflicts_with = "uid", required_unless_present = "uid")]
    email: Option<String>,

    /// Uid of the account to promote
    #[arg(long)]
    uid: Option<String>,

    /// GCP project hosting Firestore (defaults to GCP_PROJECT_ID)
    #[arg(long)]
    project: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_target(false).init();

    let args = Args::parse();
    let project = match args.project {
        Some(project) => project,
        None => std::env::var("GCP_PROJECT_ID").context("--project or GCP_PROJECT_ID is required")?,
    };
    let db = FirestoreDb::new(&project)
        .await
        .context("Failed to connect to Firestore")?;

    let uid = match (args.uid, args.email) {
        (Some(uid), _) => uid,
        (None, Some(email)) => match db.find_account_by_email(&email).await? {
            Some(account) => account.uid,
            None => bail!("no account with email {email}"),
        },
        (None, None) => bail!("either --email or --uid is required"),
    };

    let mut section = AtomicSection::begin(&db).await?;
    let result: Result<_, AppError> = async {
        let mut account = section
            .get_account(&uid)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("account {uid}")))?;
        account.role = Role::SiteAdmin;
        account.lvl = PermissionLevel::SiteAdmin.lvl();
        account.manager_type = None;
        account.updated_at = Some(now_rfc3339());
        section.put_account(&account)?;
        Ok(account)
    }
    .await;
    let (account, _) = section.commit_if_ok(result).await?;

    tracing::info!(uid = %account.uid, email = %account.email, "Promoted to SITE_ADMIN");
    println!("{} ({}) is now SITE_ADMIN", account.email, account.uid);
    Ok(())
}
