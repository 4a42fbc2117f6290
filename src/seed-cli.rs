//! A CLI tool for seeding a prefectorial election database with demo data:
//! an admin account, the school's years, classes and houses, the usual
//! prefect positions with their candidates, one voter, and an active
//! election starting now.

use chrono::{Duration, Utc};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use mongodb::{bson::doc, Client, Database};
use thiserror::Error;

use prefect_election::model::{
    api::admin::AdminCredentials,
    common::{AttributeKind, VoterAttributes, VoterCategory},
    db::{
        admin::NewAdmin, candidate::NewCandidate, election::NewElection, position::NewPosition,
        registry::NewRegistryEntry, voter::NewVoter,
    },
    mongodb::{ensure_indexes_exist, Coll},
};

const PROGRAM_NAME: &str = "seed-prefect-election";

const ABOUT_TEXT: &str = "Seed a prefectorial election database with demo data.

Refuses to touch a database that already holds positions, unless --force is given.";

const DB_URI: &str = "DB_URI";
const DB_NAME: &str = "DB_NAME";
const USERNAME: &str = "USERNAME";
const PASSWORD: &str = "PASSWORD";
const DAYS: &str = "DAYS";
const FORCE: &str = "FORCE";

/// Construct the CLI configuration.
fn cli() -> Command {
    // Make the build dirty when the toml changes.
    include_str!("../Cargo.toml");

    clap::command!(PROGRAM_NAME)
        .about(ABOUT_TEXT)
        .arg(
            Arg::new(DB_URI)
                .help("MongoDB connection string")
                .long("db-uri")
                .default_value("mongodb://localhost:27017/?directConnection=true")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(DB_NAME)
                .help("Name of the database to seed")
                .long("db-name")
                .default_value("prefect_election")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(USERNAME)
                .help("Username of the admin account to create")
                .long("username")
                .default_value("admin")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(PASSWORD)
                .help("Password of the admin account to create")
                .long("password")
                .required(true)
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(DAYS)
                .help("How many days the seeded election stays open")
                .long("days")
                .default_value("1")
                .value_parser(value_parser!(i64).range(1..=30))
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new(FORCE)
                .help("Seed even if the database already has positions")
                .long("force")
                .action(ArgAction::SetTrue),
        )
}

/// Errors that this program may produce.
#[derive(Debug, Error)]
enum Error {
    #[error("Database error: {0}")]
    Db(#[from] mongodb::error::Error),
    #[error("Admin credentials are not acceptable (the password needs at least 8 characters)")]
    Credentials,
    #[error("Database `{0}` already has positions; pass --force to seed anyway")]
    AlreadySeeded(String),
}

/// Positions on the demo ballot, in display order.
const POSITIONS: [(&str, &str); 3] = [
    ("Senior Prefect", "Leads the prefectorial board"),
    ("Dining Hall Prefect", "Keeps order in the dining hall"),
    ("Sports Prefect", "Organises inter-house sports"),
];

/// Years, classes and houses, with a display colour for houses.
const REGISTRY: [(AttributeKind, &str, Option<&str>); 10] = [
    (AttributeKind::Year, "1", None),
    (AttributeKind::Year, "2", None),
    (AttributeKind::Year, "3", None),
    (AttributeKind::Class, "Science 3A", None),
    (AttributeKind::Class, "General Arts 2B", None),
    (AttributeKind::Class, "Business 1C", None),
    (AttributeKind::House, "Red House", Some("#ef4444")),
    (AttributeKind::House, "Blue House", Some("#3b82f6")),
    (AttributeKind::House, "Green House", Some("#10b981")),
    (AttributeKind::House, "Yellow House", Some("#f59e0b")),
];

fn candidate(name: &str, position: &str, voter_category: VoterCategory) -> NewCandidate {
    NewCandidate {
        name: name.to_string(),
        position: position.to_string(),
        image_url: format!("/images/{}.jpg", name.to_lowercase().replace(' ', "-")),
        voter_category,
        active: true,
        display_order: 0,
        votes: 0,
    }
}

fn demo_candidates() -> Vec<NewCandidate> {
    let houses = |names: &[&str]| VoterCategory::House(names.iter().map(|h| h.to_string()).collect());
    vec![
        candidate("John Mensah", "Senior Prefect", VoterCategory::All),
        candidate("Abena Osei", "Senior Prefect", VoterCategory::All),
        candidate(
            "Kwame Asante",
            "Dining Hall Prefect",
            VoterCategory::Year(vec!["2".to_string(), "3".to_string()]),
        ),
        candidate(
            "Efua Addo",
            "Dining Hall Prefect",
            VoterCategory::Year(vec!["2".to_string(), "3".to_string()]),
        ),
        candidate("Kofi Boateng", "Sports Prefect", houses(&["Blue House"])),
        candidate("Ama Owusu", "Sports Prefect", houses(&["Red House"])),
    ]
}

async fn seed(db: &Database, args: &ArgMatches) -> Result<(), Error> {
    let db_name = db.name().to_string();
    let positions = Coll::<NewPosition>::from_db(db);
    if !args.get_flag(FORCE) && positions.count_documents(None, None).await? > 0 {
        return Err(Error::AlreadySeeded(db_name));
    }

    ensure_indexes_exist(db).await?;

    let credentials = AdminCredentials {
        username: args.get_one::<String>(USERNAME).cloned().unwrap_or_default(),
        password: args.get_one::<String>(PASSWORD).cloned().unwrap_or_default(),
    };
    let admin = NewAdmin::try_from(credentials).map_err(|_| Error::Credentials)?;
    Coll::<NewAdmin>::from_db(db).insert_one(admin, None).await?;
    println!("Created admin account");

    let entries = REGISTRY.iter().map(|(kind, name, color)| NewRegistryEntry {
        kind: *kind,
        name: name.to_string(),
        description: String::new(),
        color: color.map(str::to_string),
        active: true,
    });
    Coll::<NewRegistryEntry>::from_db(db)
        .insert_many(entries, None)
        .await?;
    println!("Created {} years, classes and houses", REGISTRY.len());

    let new_positions = POSITIONS
        .iter()
        .zip(1..)
        .map(|((name, description), display_order)| NewPosition {
            name: name.to_string(),
            description: description.to_string(),
            display_order,
            active: true,
        });
    positions.insert_many(new_positions, None).await?;
    println!("Created {} positions", POSITIONS.len());

    let candidates = demo_candidates();
    let count = candidates.len();
    Coll::<NewCandidate>::from_db(db)
        .insert_many(candidates, None)
        .await?;
    println!("Created {count} candidates");

    let voter = NewVoter::new(
        "VOTER2025".to_string(),
        "John Doe".to_string(),
        VoterAttributes {
            year: "3".to_string(),
            class: "Science 3A".to_string(),
            house: "Red House".to_string(),
        },
    );
    Coll::<NewVoter>::from_db(db).insert_one(voter, None).await?;
    println!("Created voter VOTER2025");

    let days = args.get_one::<i64>(DAYS).copied().unwrap_or(1);
    let now = Utc::now();
    let election = NewElection {
        title: format!("Prefectorial Election {}", now.format("%Y")),
        start_time: now,
        end_time: now + Duration::days(days),
        is_active: true,
    };
    let elections = Coll::<NewElection>::from_db(db);
    elections
        .update_many(
            doc! {"is_active": true},
            doc! {"$set": {"is_active": false}},
            None,
        )
        .await?;
    elections.insert_one(election, None).await?;
    println!("Created an election open for {days} day(s)");

    Ok(())
}

#[rocket::main]
async fn main() {
    let args = cli().get_matches();
    let db_uri = args.get_one::<String>(DB_URI).cloned().unwrap_or_default();
    let db_name = args.get_one::<String>(DB_NAME).cloned().unwrap_or_default();

    let result = match Client::with_uri_str(&db_uri).await {
        Ok(client) => seed(&client.database(&db_name), &args).await,
        Err(err) => Err(err.into()),
    };

    if let Err(err) = result {
        eprintln!("{err}");
        std::process::exit(1);
    }
    println!("Seeded database `{db_name}`");
}
