use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use library_roster::{
    add_student_to_sheet, import_students, update_student_in_sheet, AppConfig, AuthService,
    FileSheet, Normalizer, PublishedSheet, RegisterData, SheetSource, SqliteStore, StudentBook,
    StudentForm, StudentRecord,
};

#[derive(Parser)]
#[command(name = "library-roster", version, about = "Student roster for a small library")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import the roster from the published sheet (or a saved CSV export)
    Import {
        /// Read a local CSV file instead of the published sheet
        #[arg(long)]
        file: Option<PathBuf>,
        /// Parse and report without replacing the roster
        #[arg(long)]
        dry_run: bool,
    },
    /// List students, optionally filtered by name, mobile or seat
    List {
        #[arg(short, long)]
        search: Option<String>,
    },
    /// Show one student in full
    Show { id: String },
    /// Register a new student
    Add(StudentArgs),
    /// Edit a student's details
    Update {
        id: String,
        #[command(flatten)]
        student: StudentArgs,
    },
    Delete { id: String },
    /// Record a fee payment
    Pay { id: String, amount: f64 },
    /// Assign (or clear) a seat
    Seat { id: String, seat: Option<u32> },
    /// Recompute active / expiring-soon / expired
    RefreshStatus,
    Login { username: String, password: String },
    Register {
        username: String,
        email: String,
        password: String,
        library_name: String,
    },
    Logout,
    Whoami,
}

#[derive(Args)]
struct StudentArgs {
    #[arg(long)]
    name: String,
    #[arg(long)]
    mobile: String,
    #[arg(long)]
    parent_name: String,
    #[arg(long)]
    parent_mobile: String,
    #[arg(long, default_value = "")]
    email: String,
    #[arg(long, default_value = "")]
    address: String,
    #[arg(long, default_value = "")]
    vehicle_number: String,
    #[arg(long, default_value = "")]
    photo: String,
}

impl From<StudentArgs> for StudentForm {
    fn from(args: StudentArgs) -> Self {
        StudentForm {
            name: args.name,
            mobile: args.mobile,
            email: args.email,
            parent_name: args.parent_name,
            parent_mobile: args.parent_mobile,
            address: args.address,
            vehicle_number: args.vehicle_number,
            photo: args.photo,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "library_roster=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env().context("Failed to load configuration")?;

    let store = Arc::new(
        SqliteStore::open(&config.store_path)
            .with_context(|| format!("Failed to open store: {}", config.store_path.display()))?,
    );
    let auth = AuthService::new(Arc::clone(&store), config.seed_account()?.clone());
    auth.initialize()?;
    let book = StudentBook::new(Arc::clone(&store));

    match &cli.command {
        Command::Login { username, password } => {
            let owner = auth.login(username, password)?;
            println!("✓ Logged in as {} ({})", owner.username, owner.library_name);
            return Ok(());
        }
        Command::Register {
            username,
            email,
            password,
            library_name,
        } => {
            let owner = auth.register(RegisterData {
                username: username.clone(),
                email: email.clone(),
                password: password.clone(),
                library_name: library_name.clone(),
            })?;
            println!("✓ Registered and logged in as {}", owner.username);
            return Ok(());
        }
        Command::Logout => {
            auth.logout()?;
            println!("✓ Logged out");
            return Ok(());
        }
        Command::Whoami => {
            match auth.current_user() {
                Some(owner) => println!("{} <{}> - {}", owner.username, owner.email, owner.library_name),
                None => println!("Not logged in"),
            }
            return Ok(());
        }
        _ => {}
    }

    if !auth.is_authenticated() {
        bail!("Not logged in. Run: library-roster login <username> <password>");
    }

    let today = Utc::now().date_naive();

    match cli.command {
        Command::Import { file, dry_run } => {
            let source: Box<dyn SheetSource> = match file {
                Some(path) => Box::new(FileSheet::new(path)),
                None => Box::new(PublishedSheet::new(config.sheet_url()?, config.http_timeout)?),
            };

            println!("📥 Importing from {}", source.describe());
            let batch = import_students(source.as_ref(), &Normalizer::new())?;

            for skip in &batch.skipped {
                println!("   skipped row {}: {:?}", skip.row, skip.reason);
            }
            println!("✓ {}", batch.summary());

            if dry_run {
                println!("(dry run - roster not changed)");
            } else {
                if book.is_unchanged(&batch)? {
                    println!("✓ Sheet unchanged since last import");
                }
                let count = book.replace_with_import(&batch)?;
                println!("✓ Roster now has {} students", count);
            }
        }
        Command::List { search } => {
            let students = book.search(search.as_deref().unwrap_or(""))?;
            println!("{:<38} {:<24} {:<12} {:<14} {}", "ID", "NAME", "MOBILE", "STATUS", "EXPIRES");
            println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
            for s in &students {
                println!(
                    "{:<38} {:<24} {:<12} {:<14} {}",
                    s.id, s.name, s.mobile, s.status.name(), s.fee_expiry_date
                );
            }
            println!("\n{} students", students.len());
        }
        Command::Show { id } => print_student(&book.get(&id)?),
        Command::Add(args) => {
            let form = StudentForm::from(args);
            let student = book.add(&form, today)?;
            add_student_to_sheet(&form);
            println!("✓ Added {} ({})", student.name, student.id);
        }
        Command::Update { id, student } => {
            let form = StudentForm::from(student);
            let student = book.update(&id, &form)?;
            update_student_in_sheet(&id, &form)?;
            println!("✓ Updated {}", student.name);
        }
        Command::Delete { id } => {
            if book.delete(&id)? {
                println!("✓ Deleted {}", id);
            } else {
                bail!("No student with id {}", id);
            }
        }
        Command::Pay { id, amount } => {
            let student = book.record_payment(&id, amount)?;
            println!("✓ {} has paid ₹{} in total", student.name, student.total_fees_paid);
        }
        Command::Seat { id, seat } => {
            let student = book.assign_seat(&id, seat)?;
            match student.seat_number {
                Some(seat) => println!("✓ {} assigned seat {}", student.name, seat),
                None => println!("✓ {} has no seat", student.name),
            }
        }
        Command::RefreshStatus => {
            let changed = book.refresh_statuses(today, config.expiry_warning_days)?;
            println!("✓ {} statuses changed", changed);
        }
        Command::Login { .. }
        | Command::Register { .. }
        | Command::Logout
        | Command::Whoami => {}
    }

    Ok(())
}

fn print_student(s: &StudentRecord) {
    let or_dash = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

    println!("🎓 {}", s.name);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("ID:               {}", s.id);
    println!("Mobile:           {}", s.mobile);
    println!("Email:            {}", or_dash(&s.email));
    println!("Parent:           {} ({})", s.parent_name, s.parent_mobile);
    println!("Address:          {}", or_dash(&s.address));
    println!("Vehicle:          {}", or_dash(&s.vehicle_number));
    println!("Photo:            {}", or_dash(&s.photo));
    println!(
        "Seat:             {}",
        s.seat_number
            .map(|n| format!("Seat {}", n))
            .unwrap_or_else(|| "Not Assigned".to_string())
    );
    println!("Registered:       {}", s.registration_date.format("%d/%m/%Y"));
    println!("Fee expiry:       {}", s.fee_expiry_date.format("%d/%m/%Y"));
    println!("Status:           {}", s.status);
    println!("Total fees paid:  ₹{}", s.total_fees_paid);
}
