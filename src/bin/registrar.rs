//! Registrar command line
//!
//! Manages a student record store persisted in a data directory.

use clap::{Args as ClapArgs, Parser, Subcommand};
use registrar::{
    FileBlobStore, Gender, PersistPolicy, RecordId, SortKey, SortOrder, StoreConfig, StoreError,
    Student, StudentInput, StudentStore,
};
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

/// Student record manager
#[derive(Parser, Debug)]
#[command(name = "registrar")]
#[command(about = "Manage student records stored in a local data directory")]
#[command(version)]
struct Cli {
    /// Data directory
    #[arg(short, long, default_value = "./registrar_data")]
    data_dir: PathBuf,

    /// Storage key of the record blob
    #[arg(long, default_value = registrar::DEFAULT_STORAGE_KEY)]
    storage_key: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Add a student
    Add(StudentArgs),

    /// Show one student by student ID
    Show { student_id: String },

    /// Replace the attributes of a student
    Update {
        /// Student ID of the record to edit
        target: String,

        #[command(flatten)]
        student: StudentArgs,
    },

    /// Delete students by student ID
    Delete {
        #[arg(required = true)]
        student_ids: Vec<String>,
    },

    /// List students
    List {
        /// Case-insensitive search over name, ID, email, phone and department
        #[arg(short, long, default_value = "")]
        search: String,

        /// Only this gender (Nam / Nữ)
        #[arg(short, long)]
        gender: Option<Gender>,

        /// Sort key: name, studentId, age or gpa
        #[arg(long, default_value = "name")]
        sort: SortKey,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        #[arg(short, long, default_value = "1")]
        page: usize,

        #[arg(long, default_value = "25")]
        page_size: usize,
    },

    /// Show counts by gender and status
    Stats,

    /// Export students as JSON
    Export {
        /// Only export these student IDs (selected records)
        #[arg(long = "selected", num_args = 1..)]
        selected: Vec<String>,

        /// Write to a file instead of stdout
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Import students from an export file (all or nothing)
    Import { file: PathBuf },

    /// Add the sample students
    Seed,

    /// Delete every student
    Clear {
        /// Confirm deleting all records
        #[arg(long)]
        yes: bool,
    },
}

#[derive(ClapArgs, Debug)]
struct StudentArgs {
    #[arg(long)]
    student_id: String,

    #[arg(long)]
    name: String,

    #[arg(long)]
    email: String,

    /// Nam / Nữ
    #[arg(long)]
    gender: String,

    #[arg(long)]
    phone: Option<String>,

    /// YYYY-MM-DD
    #[arg(long)]
    birth_date: Option<String>,

    #[arg(long)]
    department: Option<String>,

    #[arg(long)]
    address: Option<String>,

    #[arg(long)]
    gpa: Option<f64>,

    #[arg(long)]
    status: Option<String>,
}

impl From<StudentArgs> for StudentInput {
    fn from(args: StudentArgs) -> Self {
        StudentInput {
            student_id: args.student_id,
            full_name: args.name,
            email: args.email,
            gender: args.gender,
            phone: args.phone,
            birth_date: args.birth_date,
            department: args.department,
            address: args.address,
            gpa: args.gpa,
            status: args.status,
        }
    }
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> registrar::Result<()> {
    tracing::debug!(data_dir = %cli.data_dir.display(), "opening store");

    let storage = FileBlobStore::open(&cli.data_dir)?;
    let config = StoreConfig::builder()
        .storage_key(cli.storage_key)
        .persist_policy(PersistPolicy::Manual)
        .build();
    let mut store = StudentStore::open(config, storage)?;

    match cli.command {
        Command::Add(args) => {
            let student = store.create(&args.into())?;
            store.flush()?;
            println!("Added {} ({})", student.student_id, student.id);
        }
        Command::Show { student_id } => {
            let student = lookup(&store, &student_id)?;
            print_detail(student);
        }
        Command::Update { target, student } => {
            let id = lookup(&store, &target)?.id.clone();
            let updated = store.update(&id, &student.into())?;
            store.flush()?;
            println!("Updated {}", updated.student_id);
        }
        Command::Delete { student_ids } => {
            let ids = student_ids
                .iter()
                .map(|sid| lookup(&store, sid).map(|s| s.id.clone()))
                .collect::<registrar::Result<Vec<RecordId>>>()?;
            let deleted = store.delete_many(&ids)?;
            store.flush()?;
            println!("Deleted {} student(s)", deleted.len());
        }
        Command::List {
            search,
            gender,
            sort,
            desc,
            page,
            page_size,
        } => {
            let order = if desc { SortOrder::Desc } else { SortOrder::Asc };
            store.set_search_term(search);
            store.set_gender_filter(gender);
            store.set_sort(sort, order);
            store.set_page_size(page_size)?;
            if page > 1 && !store.set_page(page) {
                return Err(StoreError::InvalidOperation(format!(
                    "page {} does not exist ({} page(s))",
                    page,
                    store.total_pages()
                )));
            }
            print_page(&store);
        }
        Command::Stats => {
            let stats = store.stats();
            println!("Total:  {}", stats.total);
            println!("Male:   {}", stats.male);
            println!("Female: {}", stats.female);
            for (status, count) in &stats.by_status {
                println!("{}: {}", status, count);
            }
        }
        Command::Export { selected, out } => {
            let json = if selected.is_empty() {
                store.export_all()?
            } else {
                for sid in &selected {
                    let id = lookup(&store, sid)?.id.clone();
                    store.select(&id);
                }
                store.export_selected()?
            };
            match out {
                Some(path) => {
                    std::fs::write(&path, json)?;
                    println!("Exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { file } => {
            let data = std::fs::read_to_string(&file)?;
            let count = store.import(&data)?;
            store.flush()?;
            println!("Imported {} student(s)", count);
        }
        Command::Seed => {
            let added = store.seed_samples()?;
            store.flush()?;
            println!("Added {} sample student(s)", added);
        }
        Command::Clear { yes } => {
            if !yes {
                return Err(StoreError::InvalidOperation(
                    "refusing to delete all students without --yes".into(),
                ));
            }
            let removed = store.clear()?;
            store.flush()?;
            println!("Deleted {} student(s)", removed);
        }
    }

    Ok(())
}

fn lookup<'a>(store: &'a StudentStore, student_id: &str) -> registrar::Result<&'a Student> {
    store
        .find_by_student_id(student_id)
        .ok_or_else(|| StoreError::NotFound(RecordId::from(student_id)))
}

fn print_page(store: &StudentStore) {
    let page = store.page();
    if page.is_empty() {
        println!("No students found");
        return;
    }

    println!(
        "{:<10} {:<28} {:<30} {:<4} {:>4} {:>5}  {}",
        "ID", "Name", "Email", "Sex", "Age", "GPA", "Status"
    );
    for s in page {
        println!(
            "{:<10} {:<28} {:<30} {:<4} {:>4} {:>5}  {}",
            s.student_id,
            s.full_name,
            s.email,
            s.gender,
            s.age().map(|a| a.to_string()).unwrap_or_default(),
            s.gpa.map(|g| format!("{:.2}", g)).unwrap_or_default(),
            s.status,
        );
    }
    println!(
        "Page {}/{} ({} of {} students)",
        store.current_page(),
        store.total_pages().max(1),
        store.filtered_len(),
        store.len()
    );
}

fn print_detail(s: &Student) {
    let or_dash = |v: Option<&str>| v.unwrap_or("-").to_string();

    println!("Student ID: {}", s.student_id);
    println!("Name:       {}", s.full_name);
    println!("Email:      {}", s.email);
    println!("Gender:     {}", s.gender);
    println!("Phone:      {}", or_dash(s.phone.as_deref()));
    println!(
        "Birth date: {}",
        s.birth_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "-".into())
    );
    if let Some(age) = s.age() {
        println!("Age:        {}", age);
    }
    println!("Department: {}", or_dash(s.department.as_deref()));
    println!("Address:    {}", or_dash(s.address.as_deref()));
    match (s.gpa, s.gpa_level()) {
        (Some(gpa), Some(level)) => println!("GPA:        {:.2} ({})", gpa, level.as_str()),
        _ => println!("GPA:        -"),
    }
    println!("Status:     {}", s.status);
    println!("Created:    {}", s.created_at.to_rfc3339());
    println!("Updated:    {}", s.updated_at.to_rfc3339());
}
