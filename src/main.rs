use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use monitored_records::distribution::round_one_decimal;
use monitored_records::grouping::{group_by_grade, group_by_student, observed_grades, GroupOptions};
use monitored_records::{
    build_dashboard, build_distribution, build_series, report, snapshot, AggregateRow,
    FilterState, Granularity, MonitoredRecord, RecordPredicate, RolePolicy, Viewer, ViewerRole,
};

#[derive(Parser)]
#[command(name = "monitored-records")]
#[command(about = "Frequency tables and trends for monitored student records", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Category counts per grade
    Grades(QueryArgs),
    /// Category counts per student
    Students(QueryArgs),
    /// Trend series by academic month, or by day when a month is selected
    Series(QueryArgs),
    /// Share of each category
    Distribution(QueryArgs),
    /// Every view at once, as JSON
    Dashboard(QueryArgs),
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        query: QueryArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Json,
    Table,
}

#[derive(Args)]
struct QueryArgs {
    /// Record snapshot, JSON array or CSV
    #[arg(long, env = "MONITORED_RECORDS_PATH")]
    records: PathBuf,
    /// Viewer role code (1 SSO, 2 Principal, 3 Adviser, 4 Admin, 5 Teacher, 6 Guidance)
    #[arg(long, env = "MONITORED_RECORDS_ROLE", default_value_t = 1)]
    role: i64,
    #[arg(long)]
    viewer_grade: Option<u32>,
    #[arg(long)]
    viewer_section: Option<String>,
    #[arg(long)]
    viewer_school_year: Option<String>,
    /// Grades to list even when empty; defaults to grades seen in the snapshot
    #[arg(long, value_delimiter = ',')]
    grades: Vec<u32>,
    #[arg(long)]
    school_year: Option<String>,
    #[arg(long)]
    grade: Option<String>,
    #[arg(long)]
    section: Option<String>,
    #[arg(long)]
    month: Option<String>,
    #[arg(long)]
    week: Option<String>,
    #[arg(long)]
    category: Option<String>,
    #[arg(long)]
    source: Option<String>,
    #[arg(long)]
    search: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
}

impl QueryArgs {
    fn viewer(&self) -> Viewer {
        Viewer {
            role: ViewerRole::from_code(self.role),
            grade: self.viewer_grade,
            section: self.viewer_section.clone(),
            school_year: self.viewer_school_year.clone(),
        }
    }

    fn filter(&self) -> FilterState {
        FilterState {
            school_year: self.school_year.clone(),
            grade: self.grade.clone(),
            section: self.section.clone(),
            month: self.month.clone(),
            week: self.week.clone(),
            category: self.category.clone(),
            source: self.source.clone(),
            search: self.search.clone(),
        }
    }
}

/// Snapshot plus the viewer-scoped filter every subcommand starts from.
struct Prepared {
    records: Vec<MonitoredRecord>,
    viewer: Viewer,
    policy: RolePolicy,
    filter: FilterState,
    grades: Vec<u32>,
}

fn prepare(args: &QueryArgs) -> anyhow::Result<Prepared> {
    let records = snapshot::load_records(&args.records)
        .with_context(|| format!("could not load records from {}", args.records.display()))?;
    let viewer = args.viewer();
    let policy = RolePolicy::resolve(viewer.role);
    let filter = policy.scope_filter(&args.filter(), &viewer);
    let grades = if args.grades.is_empty() {
        observed_grades(&records)
    } else {
        args.grades.clone()
    };

    info!(role = viewer.role.title(), records = records.len(), "prepared query");
    Ok(Prepared {
        records,
        viewer,
        policy,
        filter,
        grades,
    })
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_rows<K>(rows: &[AggregateRow<K>], policy: &RolePolicy, label: impl Fn(&K) -> String) {
    for row in rows {
        let counts: Vec<String> = policy
            .columns()
            .map(|category| format!("{} {}", category.label(), row.counts.get(category)))
            .collect();
        println!("- {}: {} | total {}", label(&row.group_key), counts.join(", "), row.total);
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Grades(args) => {
            let prepared = prepare(&args)?;
            let predicate = RecordPredicate::build(&prepared.filter);
            let grouping = group_by_grade(
                &prepared.records,
                |record| predicate.matches(record),
                &prepared.grades,
                &prepared.policy,
                GroupOptions {
                    include_grand_total: true,
                },
            );

            match args.format {
                OutputFormat::Json => print_json(&grouping)?,
                OutputFormat::Table => {
                    println!("Frequency by grade:");
                    print_rows(&grouping.rows, &prepared.policy, |grade| format!("Grade {grade}"));
                    if let Some(totals) = &grouping.grand_total {
                        println!("All grades: total {}", totals.total);
                    }
                }
            }
        }
        Commands::Students(args) => {
            let prepared = prepare(&args)?;
            let predicate = RecordPredicate::build(&prepared.filter);
            let rows = group_by_student(
                &prepared.records,
                |record| predicate.matches(record),
                &prepared.policy,
            );

            match args.format {
                OutputFormat::Json => print_json(&rows)?,
                OutputFormat::Table => {
                    if rows.is_empty() {
                        println!("No records found for this filter.");
                        return Ok(());
                    }
                    println!("Records by student:");
                    print_rows(&rows, &prepared.policy, |student| {
                        format!("{} ({})", student.name, student.id)
                    });
                }
            }
        }
        Commands::Series(args) => {
            let prepared = prepare(&args)?;
            let predicate = RecordPredicate::build(&prepared.filter);
            let series = build_series(
                &prepared.records,
                |record| predicate.matches(record),
                Granularity::for_filter(&prepared.filter),
                &prepared.policy,
            );

            match args.format {
                OutputFormat::Json => print_json(&series)?,
                OutputFormat::Table => {
                    println!("Trend ({:?}):", series.granularity);
                    for (index, label) in series.labels().iter().enumerate() {
                        let total = series.totals.get(index).copied().unwrap_or(0);
                        println!("- {label}: {total}");
                    }
                }
            }
        }
        Commands::Distribution(args) => {
            let prepared = prepare(&args)?;
            let predicate = RecordPredicate::build(&prepared.filter);
            let grouping = group_by_grade(
                &prepared.records,
                |record| predicate.matches(record),
                &prepared.grades,
                &prepared.policy,
                GroupOptions::default(),
            );
            let slices = build_distribution(&grouping.rows, &prepared.policy);

            match args.format {
                OutputFormat::Json => print_json(&slices)?,
                OutputFormat::Table => {
                    println!("Category share:");
                    for slice in &slices {
                        println!(
                            "- {}: {} ({:.1}%)",
                            slice.category.label(),
                            slice.value,
                            round_one_decimal(slice.percentage)
                        );
                    }
                }
            }
        }
        Commands::Dashboard(args) => {
            let prepared = prepare(&args)?;
            let view = build_dashboard(
                &prepared.records,
                &prepared.filter,
                &prepared.viewer,
                &prepared.grades,
            );
            print_json(&view)?;
        }
        Commands::Report { query, out, top } => {
            let prepared = prepare(&query)?;
            let view = build_dashboard(
                &prepared.records,
                &prepared.filter,
                &prepared.viewer,
                &prepared.grades,
            );
            let report = report::build_report(&view, &prepared.viewer, top);
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
