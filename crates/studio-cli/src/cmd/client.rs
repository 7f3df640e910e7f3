use crate::cmd::{explain, open, print_activation, print_conversion, print_deletion};
use crate::output::{print_fields, print_json};
use anyhow::Context;
use clap::Subcommand;
use serde::Serialize;
use std::path::Path;
use studio_core::convert::convert;
use studio_core::deconvert::{deactivate, delete_completely, reactivate};
use studio_core::model::{normalize_email, ClientProfile, Dog, UserAccount};
use studio_core::StudioError;
use uuid::Uuid;

#[derive(Subcommand)]
pub enum ClientSubcommand {
    /// Convert a submission into a client account
    Convert { submission_id: Uuid },
    /// Show a client's account, profile and owned records
    Show { email: String },
    /// Deactivate a client (reversible)
    Deactivate { email: String },
    /// Reactivate a deactivated client
    Reactivate { email: String },
    /// Permanently delete a client and everything they own
    Delete {
        email: String,
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

pub fn run(root: &Path, subcmd: ClientSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ClientSubcommand::Convert { submission_id } => run_convert(root, submission_id, json),
        ClientSubcommand::Show { email } => show(root, &email, json),
        ClientSubcommand::Deactivate { email } => set_active(root, &email, false, json),
        ClientSubcommand::Reactivate { email } => set_active(root, &email, true, json),
        ClientSubcommand::Delete { email, yes } => delete(root, &email, yes, json),
    }
}

fn run_convert(root: &Path, submission_id: Uuid, json: bool) -> anyhow::Result<()> {
    let studio = open(root)?;
    match convert(&studio.backend(), submission_id) {
        Ok(result) => {
            if json {
                print_json(&result)?;
            } else {
                print_conversion(&result);
            }
            Ok(())
        }
        Err(StudioError::AlreadyConverted { profile_id, .. }) => {
            if json {
                print_json(&serde_json::json!({
                    "submission_id": submission_id,
                    "profile_id": profile_id,
                    "unchanged": true,
                }))?;
            } else {
                println!("Submission {submission_id} is already converted (profile {profile_id}).");
            }
            Ok(())
        }
        Err(e) => Err(explain(e)),
    }
}

#[derive(Serialize)]
struct ClientView {
    account: UserAccount,
    profile: Option<ClientProfile>,
    dogs: Vec<Dog>,
    sessions: usize,
    messages: usize,
    notes: usize,
    referrals: usize,
    payments: usize,
}

fn show(root: &Path, email: &str, json: bool) -> anyhow::Result<()> {
    let studio = open(root)?;
    let store = studio.store();
    let email = normalize_email(email);

    let Some(account) = store.account_by_email(&email)? else {
        anyhow::bail!("no client with email '{email}'");
    };
    let profile = store.profile_by_user(account.id)?;

    let count = |f: &dyn Fn(Uuid) -> studio_core::Result<usize>| -> anyhow::Result<usize> {
        match &profile {
            Some(p) => f(p.id).context("failed to read client records"),
            None => Ok(0),
        }
    };
    let view = ClientView {
        dogs: match &profile {
            Some(p) => store.dogs_by_owner(p.id)?,
            None => Vec::new(),
        },
        sessions: count(&|id: Uuid| Ok(store.sessions_by_client(id)?.len()))?,
        messages: count(&|id: Uuid| Ok(store.messages_for_profile(id)?.len()))?,
        notes: count(&|id: Uuid| Ok(store.notes_by_client(id)?.len()))?,
        referrals: count(&|id: Uuid| Ok(store.referrals_by_referrer(id)?.len()))?,
        payments: count(&|id: Uuid| Ok(store.payments_by_client(id)?.len()))?,
        account,
        profile,
    };

    if json {
        return print_json(&view);
    }

    let active = |a: bool| (if a { "active" } else { "inactive" }).to_string();
    print_fields(&[
        ("Email", Some(email.clone())),
        ("User", Some(view.account.id.to_string())),
        ("Role", Some(view.account.role.to_string())),
        ("Account", Some(active(view.account.is_active))),
        ("Profile", view.profile.as_ref().map(|p| p.id.to_string())),
        ("Name", view.profile.as_ref().map(|p| p.name.clone())),
        ("Profile state", view.profile.as_ref().map(|p| active(p.is_active))),
        (
            "Onboarding",
            view.profile.as_ref().map(|p| {
                if p.profile_completed {
                    "completed".to_string()
                } else {
                    format!("step {}", p.onboarding_step)
                }
            }),
        ),
    ]);
    if !view.dogs.is_empty() {
        println!("\nDogs ({}):", view.dogs.len());
        for dog in &view.dogs {
            let breed = dog.breed.as_deref().unwrap_or("unknown breed");
            println!("  {} ({breed})", dog.name);
        }
    }
    println!(
        "\nSessions: {}  Messages: {}  Notes: {}  Referrals: {}  Payments: {}",
        view.sessions, view.messages, view.notes, view.referrals, view.payments
    );
    Ok(())
}

fn set_active(root: &Path, email: &str, active: bool, json: bool) -> anyhow::Result<()> {
    let studio = open(root)?;
    let backend = studio.backend();
    let change = if active {
        reactivate(&backend, email)
    } else {
        deactivate(&backend, email)
    }
    .map_err(explain)?;

    if json {
        print_json(&change)?;
    } else {
        print_activation(&change);
    }
    Ok(())
}

fn delete(root: &Path, email: &str, yes: bool, json: bool) -> anyhow::Result<()> {
    if !yes {
        anyhow::bail!(
            "deleting '{email}' removes the client and everything they own; re-run with --yes"
        );
    }
    let studio = open(root)?;
    let report = delete_completely(&studio.backend(), email).map_err(explain)?;
    if json {
        print_json(&report)?;
    } else {
        print_deletion(&report);
    }
    Ok(())
}
