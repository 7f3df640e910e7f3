use crate::cmd::{explain, open, print_activation, print_conversion, print_deletion};
use crate::output::{print_fields, print_json, print_table};
use anyhow::Context;
use chrono::NaiveDate;
use clap::Subcommand;
use std::path::Path;
use studio_core::lifecycle::{purge_removed, request_status_change, ChangeOptions, Outcome};
use studio_core::model::{ContactSubmission, DogDetails};
use studio_core::types::{Resolution, SubmissionStatus};
use uuid::Uuid;

#[derive(Subcommand)]
pub enum SubmissionSubcommand {
    /// Record a contact submission
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        dog_name: Option<String>,
        #[arg(long)]
        breed: Option<String>,
        /// Dog's birth date (YYYY-MM-DD)
        #[arg(long)]
        birth_date: Option<String>,
        #[arg(long)]
        sex: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// List submissions
    List {
        /// Only show submissions in this status
        #[arg(long)]
        status: Option<String>,
    },
    /// Show one submission
    Show { id: Uuid },
    /// Change a submission's status
    Status {
        id: Uuid,
        /// new, contacted, converted or removed
        status: String,
        /// Required when leaving converted with a live client: deactivate or delete
        #[arg(long)]
        resolution: Option<String>,
    },
    /// Permanently delete submissions that are already removed
    Purge {
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

pub fn run(root: &Path, subcmd: SubmissionSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        SubmissionSubcommand::Add {
            name,
            email,
            phone,
            dog_name,
            breed,
            birth_date,
            sex,
            message,
        } => {
            let birth_date = birth_date
                .map(|d| {
                    NaiveDate::parse_from_str(&d, "%Y-%m-%d")
                        .with_context(|| format!("invalid --birth-date '{d}', expected YYYY-MM-DD"))
                })
                .transpose()?;
            let submission = ContactSubmission::new(name, email)
                .with_phone(phone)
                .with_dog(DogDetails {
                    name: dog_name,
                    breed,
                    birth_date,
                    sex,
                })
                .with_message(message);
            add(root, submission, json)
        }
        SubmissionSubcommand::List { status } => list(root, status.as_deref(), json),
        SubmissionSubcommand::Show { id } => show(root, id, json),
        SubmissionSubcommand::Status {
            id,
            status,
            resolution,
        } => change_status(root, id, &status, resolution.as_deref(), json),
        SubmissionSubcommand::Purge { ids } => purge(root, &ids, json),
    }
}

fn add(root: &Path, submission: ContactSubmission, json: bool) -> anyhow::Result<()> {
    submission.validate().map_err(explain)?;
    let studio = open(root)?;
    studio
        .store()
        .insert_submission(&submission)
        .context("failed to save submission")?;

    if json {
        print_json(&submission)?;
    } else {
        println!("Added submission {}", submission.id);
    }
    Ok(())
}

fn list(root: &Path, status: Option<&str>, json: bool) -> anyhow::Result<()> {
    let filter = status
        .map(|s| s.parse::<SubmissionStatus>())
        .transpose()
        .map_err(explain)?;
    let studio = open(root)?;
    let submissions: Vec<ContactSubmission> = studio
        .store()
        .list_submissions()?
        .into_iter()
        .filter(|s| filter.map_or(true, |f| s.status == f))
        .collect();

    if json {
        print_json(&submissions)?;
        return Ok(());
    }
    if submissions.is_empty() {
        println!("No submissions.");
        return Ok(());
    }
    let rows = submissions
        .iter()
        .map(|s| {
            vec![
                s.id.to_string(),
                s.status.to_string(),
                s.name.clone(),
                s.email.clone(),
                s.dog.name.clone().unwrap_or_default(),
                s.created_at.format("%Y-%m-%d").to_string(),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "NAME", "EMAIL", "DOG", "CREATED"], rows);
    Ok(())
}

fn show(root: &Path, id: Uuid, json: bool) -> anyhow::Result<()> {
    let studio = open(root)?;
    let s = studio
        .store()
        .get_submission(id)?
        .with_context(|| format!("submission {id} not found"))?;

    if json {
        print_json(&s)?;
        return Ok(());
    }
    print_fields(&[
        ("Submission", Some(s.id.to_string())),
        ("Status", Some(s.status.to_string())),
        ("Name", Some(s.name.clone())),
        ("Email", Some(s.email.clone())),
        ("Phone", s.phone.clone()),
        ("Dog", s.dog.name.clone()),
        ("Breed", s.dog.breed.clone()),
        ("Born", s.dog.birth_date.map(|d| d.to_string())),
        ("Sex", s.dog.sex.clone()),
        ("Message", s.message.clone()),
        ("Profile", s.assigned_profile_id.map(|p| p.to_string())),
        ("Created", Some(s.created_at.format("%Y-%m-%d %H:%M").to_string())),
    ]);
    Ok(())
}

fn change_status(
    root: &Path,
    id: Uuid,
    status: &str,
    resolution: Option<&str>,
    json: bool,
) -> anyhow::Result<()> {
    let status: SubmissionStatus = status.parse().map_err(explain)?;
    let resolution = resolution
        .map(|r| r.parse::<Resolution>())
        .transpose()
        .map_err(explain)?;
    let studio = open(root)?;
    let outcome = request_status_change(&studio.backend(), id, status, ChangeOptions { resolution })
        .map_err(explain)?;

    if json {
        print_json(&outcome)?;
    } else {
        print_outcome(id, &outcome);
    }
    if let Outcome::ConfirmationRequired { profile_id, .. } = outcome {
        anyhow::bail!(
            "submission {id} is linked to active client profile {profile_id}; \
             re-run with --resolution deactivate or --resolution delete"
        );
    }
    Ok(())
}

fn print_outcome(id: Uuid, outcome: &Outcome) {
    match outcome {
        Outcome::Unchanged { status } => {
            println!("Submission {id} is already {status}; nothing to do.")
        }
        Outcome::StatusChanged {
            from,
            to,
            outstanding_invitation,
        } => {
            println!("Submission {id}: {from} -> {to}");
            if let Some(inv) = outstanding_invitation {
                println!(
                    "  Note: signup invitation for {} is still valid until {}",
                    inv.email,
                    inv.expires_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Outcome::Converted { from, result } => {
            println!("Submission {id}: {from} -> converted");
            print_conversion(result);
        }
        Outcome::Deactivated { to, change } => {
            println!("Submission {id}: converted -> {to}");
            print_activation(change);
        }
        Outcome::Deleted { to, report } => {
            println!("Submission {id}: converted -> {to}");
            print_deletion(report);
        }
        Outcome::ConfirmationRequired { email, .. } => {
            println!("Submission {id} has a live client account ({email}).");
            println!("Choose: deactivate (reversible) or delete (permanent).");
        }
    }
}

fn purge(root: &Path, ids: &[Uuid], json: bool) -> anyhow::Result<()> {
    let studio = open(root)?;
    let purged = purge_removed(&studio.backend(), ids).map_err(explain)?;
    if json {
        print_json(&serde_json::json!({ "purged": purged }))?;
    } else {
        println!("Purged {purged} submission(s).");
    }
    Ok(())
}
