use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};

use opsmetrics::date_util::parse_date;
use opsmetrics::metrics::{IncidentMetrics, IssueMetrics, OccupancyMetrics};
use opsmetrics::{
    Dashboard, DateRange, FilterSpec, IncidentFields, IssueFields, JsonFileSource, MetricsOptions,
    MetricsReport, Period, RecordSource, Roster, Settings, WorkLogFields,
};

#[derive(Parser)]
#[command(name = "opsmetrics", about = "Operations dashboards from ticket, issue and work-log exports")]
struct Cli {
    /// Config file (default: ~/.opsmetrics/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Incident dashboard: volumes, MTTR, SLA compliance, first-call resolution
    Incidents {
        /// JSON export of tickets
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Occupancy dashboard: worked vs available hours per team and user
    Occupancy {
        /// JSON export of work logs
        file: PathBuf,
        /// JSON roster of {user_id, team} records, for team membership and capacity
        #[arg(long)]
        roster: Option<PathBuf>,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Issue-tracker dashboard: status mix, created vs resolved, lead time
    Issues {
        /// Issue-tracker search response or JSON array of issues
        file: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Show the date range a period resolves to
    Period {
        /// Period: 2025, 2025-H1, 2025-Q1, 2025-01, 2025-W05, 30d, ytd, qtd, mtd, wtd
        spec: String,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective settings as JSON
    Show,
    /// Print the default config file path
    Path,
}

#[derive(Args)]
struct FilterArgs {
    /// Start date (YYYY-MM-DD), inclusive
    #[arg(long)]
    from: Option<String>,
    /// End date (YYYY-MM-DD), inclusive; defaults to today when --from is given
    #[arg(long)]
    to: Option<String>,
    /// Named period instead of --from/--to
    #[arg(long, conflicts_with_all = ["from", "to"])]
    period: Option<String>,
    /// Restrict to a team (repeatable)
    #[arg(long = "team", value_name = "TEAM")]
    teams: Vec<String>,
    /// Restrict to a project (repeatable)
    #[arg(long = "project", value_name = "PROJECT")]
    projects: Vec<String>,
    /// Restrict to a user identifier (repeatable)
    #[arg(long = "user", value_name = "USER")]
    users: Vec<String>,
}

impl FilterArgs {
    fn to_spec(&self) -> anyhow::Result<FilterSpec> {
        Ok(FilterSpec::new()
            .range(self.date_range()?)
            .teams(self.teams.iter().cloned())
            .projects(self.projects.iter().cloned())
            .users(self.users.iter().cloned()))
    }

    fn date_range(&self) -> anyhow::Result<Option<DateRange>> {
        if let Some(ref period) = self.period {
            return Ok(Some(Period::parse(period)?.date_range()?));
        }
        let start = match self.from.as_deref() {
            Some(s) => parse_arg_date(s)?,
            None if self.to.is_some() => anyhow::bail!("--to requires --from"),
            None => return Ok(None),
        };
        let end = match self.to.as_deref() {
            Some(s) => parse_arg_date(s)?,
            None => Utc::now().date_naive(),
        };
        if start > end {
            anyhow::bail!("--from {start} is after --to {end}");
        }
        Ok(Some(DateRange::new(start, end)))
    }
}

fn parse_arg_date(s: &str) -> anyhow::Result<chrono::NaiveDate> {
    parse_date(s).ok_or_else(|| opsmetrics::Error::DateParse(format!("expected YYYY-MM-DD, got {s}")).into())
}

#[derive(Args)]
struct OutputArgs {
    /// Output as JSON
    #[arg(long, conflicts_with = "csv")]
    json: bool,
    /// Output as CSV
    #[arg(long)]
    csv: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let settings = Settings::load(cli.config.as_deref())?;
    let options = MetricsOptions::from(&settings);

    match cli.command {
        Commands::Incidents { file, filter, output } => {
            let spec = filter.to_spec()?;
            let fields = IncidentFields::default();
            let dashboard = Dashboard::new(JsonFileSource::new(file), settings.fetch_policy());
            let refreshed = dashboard
                .refresh(&spec, |records, spec| {
                    opsmetrics::compute_incident_metrics(records, spec, &fields, &options)
                })
                .await?;
            emit(MetricsReport::from(refreshed.metrics), &output)?;
        }
        Commands::Occupancy {
            file,
            roster,
            filter,
            output,
        } => {
            let spec = filter.to_spec()?;
            let fields = WorkLogFields::default();
            let roster = match roster {
                Some(path) => Some(load_roster(path, &fields, &settings).await?),
                None => None,
            };
            let dashboard = Dashboard::new(JsonFileSource::new(file), settings.fetch_policy());
            let refreshed = dashboard
                .refresh(&spec, |records, spec| {
                    opsmetrics::compute_occupancy_metrics(records, spec, &fields, roster.as_ref(), &options)
                })
                .await?;
            emit(MetricsReport::from(refreshed.metrics), &output)?;
        }
        Commands::Issues { file, filter, output } => {
            let spec = filter.to_spec()?;
            let fields = IssueFields::default();
            let dashboard = Dashboard::new(JsonFileSource::new(file), settings.fetch_policy());
            let refreshed = dashboard
                .refresh(&spec, |records, spec| {
                    opsmetrics::compute_issue_metrics(records, spec, &fields, &options)
                })
                .await?;
            emit(MetricsReport::from(refreshed.metrics), &output)?;
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => println!("{}", serde_json::to_string_pretty(&settings)?),
            ConfigAction::Path => match Settings::default_path() {
                Some(path) => println!("{}", path.display()),
                None => anyhow::bail!("cannot determine home directory"),
            },
        },
        Commands::Period { spec } => {
            let period = Period::parse(&spec)?;
            let range = period.date_range()?;
            println!(
                "{period}: {} to {} ({} days, {} working days)",
                range.start,
                range.end,
                range.days(),
                range.working_days()
            );
            if let Some(prev) = period.previous() {
                let prev_range = prev.date_range()?;
                println!("Previous {prev}: {} to {}", prev_range.start, prev_range.end);
            }
        }
    }

    Ok(())
}

async fn load_roster(path: PathBuf, fields: &WorkLogFields, settings: &Settings) -> anyhow::Result<Roster> {
    let source = JsonFileSource::new(path);
    let records = settings
        .fetch_policy()
        .fetch(&source, &FilterSpec::new())
        .await
        .with_context(|| format!("loading roster {}", source.name()))?;
    let roster = Roster::from_records(&records, &fields.user, &fields.team);
    log::info!("Roster has {} members", roster.len());
    Ok(roster)
}

fn emit(report: MetricsReport, output: &OutputArgs) -> anyhow::Result<()> {
    if output.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if output.csv {
        print!("{}", opsmetrics::to_csv(&report));
    } else {
        match &report {
            MetricsReport::Incidents(m) => print_incidents(m),
            MetricsReport::Occupancy(m) => print_occupancy(m),
            MetricsReport::Issues(m) => print_issues(m),
        }
    }
    Ok(())
}

fn print_range(range: Option<DateRange>) {
    match range {
        Some(r) => println!("  Range: {} to {}", r.start, r.end),
        None => println!("  Range: all dates"),
    }
}

fn print_incidents(m: &IncidentMetrics) {
    println!("Incident Metrics");
    print_range(m.range);
    println!("  Volume:");
    println!("    Total:    {}", m.total_incidents);
    println!("    Resolved: {}", m.resolved_incidents);
    println!("    Open:     {}", m.open_incidents);
    println!("  Timing:");
    println!("    MTTR:     {:.1} min (max {:.1})", m.mean_time_to_resolve, m.max_time_to_resolve);
    println!("    MTTI:     {:.1} min", m.mean_time_to_respond);
    println!("  Quality:");
    println!("    SLA compliance:        {:.1}%", m.sla_compliance_rate);
    println!("    First call resolution: {:.1}%", m.first_call_resolution_rate);
    println!("  By priority:");
    for p in &m.incidents_by_priority {
        println!("    {:<12} {}", p.priority, p.count);
    }
    println!("  Resolution time:");
    for (label, n) in m.resolution_time_buckets.iter() {
        println!("    {label:<24} {n}");
    }
    if !m.top_assignees.is_empty() {
        println!("  Top assignees:");
        for a in &m.top_assignees {
            println!(
                "    {:<20} {} resolved / {} assigned, MTTR {:.1} min",
                a.assignee, a.resolved, a.assigned, a.mean_time_to_resolve
            );
        }
    }
}

fn print_occupancy(m: &OccupancyMetrics) {
    println!("Occupancy Metrics");
    print_range(m.range);
    println!("  Capacity:");
    println!("    Members:      {}", m.member_count);
    println!("    Working days: {}", m.working_days);
    println!("    Available:    {:.1} h", m.available_hours);
    println!("    Worked:       {:.1} h ({} entries)", m.worked_hours, m.entries);
    println!("    Occupancy:    {:.1}%", m.occupancy_rate);
    println!("    FTE:          {:.2}", m.fte);
    if !m.by_user.is_empty() {
        println!("  By user:");
        for u in &m.by_user {
            println!("    {:<20} {:<12} {:>7.1} h {:>6.1}%", u.user, u.team, u.hours, u.occupancy_rate);
        }
    }
    if !m.hours_by_project.is_empty() {
        println!("  By project:");
        for p in &m.hours_by_project {
            println!("    {:<20} {:>7.1} h {:>6.1}%", p.project, p.hours, p.share);
        }
    }
}

fn print_issues(m: &IssueMetrics) {
    println!("Issue Metrics");
    print_range(m.range);
    println!("  Throughput:");
    println!("    Total:    {}", m.total_issues);
    println!("    Resolved: {} ({:.1}%)", m.resolved_issues, m.resolution_rate);
    println!("    Open:     {}", m.open_issues);
    println!("  Lead Time:");
    if m.lead_time.count == 0 {
        println!("    No resolved issues in range");
    } else {
        let lt = &m.lead_time;
        println!("    Average: {:.1} days", lt.mean);
        println!("    Median:  {:.1} days", lt.median);
        println!("    P90:     {:.1} days", lt.p90);
        println!("    Range:   {:.1}-{:.1} days", lt.min, lt.max);
    }
    println!("  By status:");
    for s in &m.by_status {
        println!("    {:<16} {}", s.label, s.count);
    }
    if !m.monthly_flow.is_empty() {
        println!("  Monthly flow (created / resolved):");
        for p in &m.monthly_flow {
            println!("    {:<8} {:>5} / {}", p.label, p.created, p.resolved);
        }
    }
}
