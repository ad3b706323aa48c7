use chrono::Utc;
use clap::Parser;
use sizelog::cli::{Cli, Command, HistoryArgs, InspectArgs, MonitorArgs, PruneArgs, ReportArgs, SourceArgs, TablesArgs};
use sizelog::collect::{self, json::JsonCollector, sqlite::SqliteCollector, Collector, Measurement};
use sizelog::config::Config;
use sizelog::error::Result;
use sizelog::monitor::Monitor;
use sizelog::notify::{LogMailer, Mailer, SpoolMailer};
use sizelog::report::{self, json::SnapshotReport};
use sizelog::store::{SnapshotQuery, Store};
use sizelog::{prune, util};
use tracing_subscriber::EnvFilter;

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("sizelog=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn open_store(cli_path: Option<&std::path::Path>, config: &Config) -> Result<Store> {
    match cli_path.or(config.store.path.as_deref()) {
        Some(path) => Store::open(path),
        None => Store::open_default(),
    }
}

fn parse_id(id_str: &str) -> i64 {
    id_str.parse().unwrap_or_else(|_| {
        eprintln!("Invalid snapshot ID: '{id_str}'. Must be a number.");
        std::process::exit(1);
    })
}

fn parse_bound(value: Option<&str>, flag: &str, end_of_day: bool) -> Option<chrono::DateTime<Utc>> {
    value.map(|s| {
        util::parse_date(s, end_of_day).unwrap_or_else(|| {
            eprintln!("Invalid --{flag} date: '{s}'. Use YYYY-MM-DD or RFC 3339.");
            std::process::exit(1);
        })
    })
}

/// Measure from the requested source, filling in the configured capacity
/// when the source has none.
fn collect_measurement(source: &SourceArgs, config: &Config) -> Result<Measurement> {
    let collector: Box<dyn Collector> = match &source.sqlite {
        Some(path) => Box::new(SqliteCollector::new(path, config.collector.max_size_bytes)),
        None => Box::new(JsonCollector::from_arg(source.input.as_deref().unwrap_or("-"))),
    };

    let mut measurement = collect::measure(collector.as_ref())?;
    if measurement.max_size_bytes.is_none() {
        if let Some(max) = config.collector.max_size_bytes {
            measurement = measurement.with_capacity(max, None).normalize();
        }
    }
    Ok(measurement)
}

fn monitor(args: &MonitorArgs, store: &mut Store, config: &Config) -> Result<()> {
    if !config.monitoring.enabled {
        println!("Database monitoring is disabled. Set monitoring.enabled = true or SIZELOG_DB_MONITORING=1.");
        return Ok(());
    }

    let measurement = collect_measurement(&args.source, config)?;

    let mailer: Box<dyn Mailer> = match &config.notifications.spool_dir {
        Some(dir) => Box::new(SpoolMailer::new(dir)),
        None => Box::new(LogMailer),
    };

    let run = Monitor::new(store, config, mailer.as_ref()).record_snapshot(measurement, Utc::now())?;

    if args.json {
        println!("{}", report::json::render(&run)?);
    } else {
        print!("{}", report::table::render_run(&run));
    }
    Ok(())
}

fn inspect(args: &InspectArgs, config: &Config) -> Result<()> {
    let measurement = collect_measurement(&args.source, config)?;

    if args.json {
        println!("{}", report::json::render(&measurement)?);
    } else {
        print!("{}", report::table::render_measurement(&measurement));
    }
    Ok(())
}

fn history(args: &HistoryArgs, store: &Store) -> Result<()> {
    let query = SnapshotQuery {
        database: args.database.as_deref(),
        since: parse_bound(args.since.as_deref(), "since", false),
        until: parse_bound(args.until.as_deref(), "until", true),
        limit: args.limit,
    };
    let snapshots = store.list_snapshots(&query)?;

    if args.json {
        println!("{}", report::json::render(&snapshots)?);
    } else {
        print!("{}", report::table::render_history(&snapshots));
    }
    Ok(())
}

fn show_report(args: &ReportArgs, store: &Store, config: &Config) -> Result<()> {
    let snapshot = match &args.id {
        Some(id_str) => store.get_snapshot(parse_id(id_str))?,
        None => store.latest_snapshot(args.database.as_deref())?,
    };

    let Some(snapshot) = snapshot else {
        eprintln!("No snapshots found. Run 'sizelog monitor' to create one.");
        std::process::exit(1);
    };

    let fastest = store.fastest_growing_tables(snapshot.id, 5)?;
    let stale = args.id.is_none() && report::is_stale(&snapshot, config.monitoring.frequency, Utc::now());

    if args.json {
        let out = SnapshotReport {
            snapshot: &snapshot,
            fastest_growing_tables: &fastest,
            stale,
        };
        println!("{}", report::json::render(&out)?);
    } else {
        print!("{}", report::table::render_snapshot(&snapshot, &fastest));
        if stale {
            eprintln!("\n{}", report::stale_warning(&snapshot));
        }
    }
    Ok(())
}

fn tables(args: &TablesArgs, store: &Store) -> Result<()> {
    if let Some(table_name) = &args.table {
        let database = match &args.database {
            Some(db) => db.clone(),
            None => match store.latest_snapshot(None)? {
                Some(s) => s.database_name,
                None => {
                    eprintln!("No snapshots found. Run 'sizelog monitor' to create one.");
                    std::process::exit(1);
                }
            },
        };
        let entries = store.table_history(&database, table_name, args.limit)?;

        if args.json {
            println!("{}", report::json::render(&entries)?);
        } else {
            print!("{}", report::table::render_table_history(table_name, &entries));
        }
        return Ok(());
    }

    let snapshot = match &args.id {
        Some(id_str) => store.get_snapshot(parse_id(id_str))?,
        None => store.latest_snapshot(None)?,
    };
    let Some(snapshot) = snapshot else {
        eprintln!("No snapshots found. Run 'sizelog monitor' to create one.");
        std::process::exit(1);
    };

    let rows = if args.fastest {
        store.fastest_growing_tables(snapshot.id, args.limit)?
    } else {
        store.largest_tables(snapshot.id, args.limit)?
    };

    if args.json {
        println!("{}", report::json::render(&rows)?);
    } else {
        println!(
            "\nsnapshot: #{} {} ({})\n",
            snapshot.id,
            snapshot.database_name,
            util::format_timestamp(snapshot.created_at)
        );
        print!("{}", report::table::render_tables(&rows));
    }
    Ok(())
}

fn prune_snapshots(args: &PruneArgs, store: &mut Store, config: &Config) -> Result<()> {
    let days = args.days.unwrap_or(config.monitoring.retention_days);
    if days == 0 {
        eprintln!("--days must be at least 1");
        std::process::exit(1);
    }

    let now = Utc::now();
    let cutoff = prune::cutoff(days, now);

    if args.is_dry_run() {
        let pending = prune::pending(&*store, days, now)?;
        println!(
            "would delete: {pending} snapshots older than {}",
            util::format_timestamp(cutoff)
        );
        if !args.dry_run {
            println!("run with --yes to delete them");
        }
        return Ok(());
    }

    let deleted = prune::prune(store, days, now)?;
    println!("deleted: {deleted} snapshots older than {}", util::format_timestamp(cutoff));
    Ok(())
}

fn run(cli: &Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref())?;
    let open = || open_store(cli.store.as_deref(), &config);

    match &cli.command {
        Command::Inspect(args) => inspect(args, &config),
        Command::Monitor(args) => monitor(args, &mut open()?, &config),
        Command::History(args) => history(args, &open()?),
        Command::Report(args) => show_report(args, &open()?, &config),
        Command::Tables(args) => tables(args, &open()?),
        Command::Prune(args) => prune_snapshots(args, &mut open()?, &config),
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
