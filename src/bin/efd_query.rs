use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use efd_client::{
    rendezvous, resample, unpack, ClientConfig, Direction, FallbackInterval, FillPolicy, Frame,
    Instant, PackedGroups, QueryBuilder, RangeQuery, RendezvousOptions, TimeRange, TimeScale,
    TopNQuery, UnpackOptions, Value,
};

#[derive(Parser)]
#[command(name = "efd-query", version, about = "Telemetry archive query and alignment tooling")]
struct Cli {
    /// JSON client config (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the range query for a topic
    Query {
        #[arg(long)]
        topic: String,
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
        /// ISO-8601 start, e.g. 2023-01-01T00:00:00
        #[arg(long)]
        start: String,
        #[arg(long)]
        end: String,
        #[arg(long)]
        index: Option<i64>,
        /// Use the `{Component}ID` index field
        #[arg(long)]
        legacy: bool,
        #[arg(long)]
        limit: Option<u64>,
        /// Archive index is TAI
        #[arg(long)]
        tai: bool,
    },
    /// Print the most-recent-N query for a topic
    TopN {
        #[arg(long)]
        topic: String,
        #[arg(long = "field", required = true)]
        fields: Vec<String>,
        #[arg(long)]
        num: u64,
        #[arg(long)]
        time_cut: Option<String>,
        #[arg(long)]
        index: Option<i64>,
        #[arg(long)]
        legacy: bool,
    },
    /// Expand packed columns of a CSV file
    Unpack {
        #[arg(long)]
        input: PathBuf,
        /// Packed field as NAME:COUNT (repeatable)
        #[arg(long = "base", required = true)]
        bases: Vec<String>,
        #[arg(long)]
        cadence_ms: Option<f64>,
        #[arg(long, default_value_t = 1)]
        stride: usize,
        /// Interval for the last record; previous record's interval when omitted
        #[arg(long)]
        fallback_ms: Option<f64>,
        /// Collapse the last record instead of reusing an interval
        #[arg(long, conflicts_with = "fallback_ms")]
        no_fallback: bool,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Join two CSV series by timestamp
    Rendezvous {
        #[arg(long)]
        base: PathBuf,
        #[arg(long)]
        other: PathBuf,
        #[arg(long, value_enum, default_value_t = DirectionArg::Past)]
        direction: DirectionArg,
        #[arg(long)]
        max_delta_ms: Option<f64>,
        #[arg(long, default_value = "_other")]
        suffix: String,
        #[arg(long)]
        matched_time_column: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Re-express a CSV series on another series' timestamps
    Resample {
        #[arg(long)]
        input: PathBuf,
        /// CSV whose time column is the target index
        #[arg(long)]
        target: PathBuf,
        #[arg(long, value_enum, default_value_t = PolicyArg::Hold)]
        policy: PolicyArg,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Past,
    Future,
    Nearest,
}

impl From<DirectionArg> for Direction {
    fn from(value: DirectionArg) -> Self {
        match value {
            DirectionArg::Past => Direction::Past,
            DirectionArg::Future => Direction::Future,
            DirectionArg::Nearest => Direction::Nearest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PolicyArg {
    Hold,
    Exact,
    Linear,
}

impl From<PolicyArg> for FillPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Hold => FillPolicy::Hold,
            PolicyArg::Exact => FillPolicy::Exact,
            PolicyArg::Linear => FillPolicy::Linear,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ClientConfig::from_json_path(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ClientConfig::default(),
    };

    match cli.command {
        Commands::Query {
            topic,
            fields,
            start,
            end,
            index,
            legacy,
            limit,
            tai,
        } => {
            let mut builder = QueryBuilder::from_config(&config);
            if tai {
                builder = builder.with_index_scale(TimeScale::Tai);
            }
            let range = TimeRange::new(
                Instant::parse_isot(&start, TimeScale::Utc)?,
                Instant::parse_isot(&end, TimeScale::Utc)?,
            );
            let mut query = RangeQuery::new(topic, fields, range)
                .use_old_indexing(legacy || config.use_old_indexing);
            query.index = index;
            query.limit = limit;
            println!("{}", builder.build_time_range_query(&query)?);
        }
        Commands::TopN {
            topic,
            fields,
            num,
            time_cut,
            index,
            legacy,
        } => {
            let mut query =
                TopNQuery::new(topic, fields, num).use_old_indexing(legacy || config.use_old_indexing);
            query.index = index;
            if let Some(cut) = time_cut {
                query = query.time_cut(Instant::parse_isot(&cut, TimeScale::Utc)?);
            }
            let builder = QueryBuilder::from_config(&config);
            println!("{}", builder.build_select_top_n_query(&query)?);
        }
        Commands::Unpack {
            input,
            bases,
            cadence_ms,
            stride,
            fallback_ms,
            no_fallback,
            output,
        } => {
            let frame = read_csv_path(&input)?;
            let mut groups = PackedGroups::new();
            for spec in &bases {
                let (base, count) = parse_base(spec)?;
                groups = groups.with_group(base, count);
            }
            let fallback = if no_fallback {
                FallbackInterval::None
            } else if let Some(ms) = fallback_ms {
                FallbackInterval::fixed(millis(ms)?)
            } else {
                config.fallback
            };
            let mut options = UnpackOptions::default().stride(stride).fallback(fallback);
            if let Some(ms) = cadence_ms {
                options = options.cadence(millis(ms)?);
            }
            let outcome = unpack(&frame, &groups, &options)?;
            for warning in &outcome.warnings {
                eprintln!("warning: {warning:?}");
            }
            for failure in &outcome.failures {
                eprintln!("skipped row {}: {}", failure.row, failure.error);
            }
            write_output(output.as_deref(), &outcome.frame)?;
        }
        Commands::Rendezvous {
            base,
            other,
            direction,
            max_delta_ms,
            suffix,
            matched_time_column,
            output,
        } => {
            let base = read_csv_path(&base)?;
            let other = read_csv_path(&other)?;
            let max_delta = match max_delta_ms {
                Some(ms) => millis(ms)?,
                None => config.rendezvous_tolerance(),
            };
            let options = RendezvousOptions {
                suffix,
                matched_time_column,
            };
            let joined = rendezvous(&base, &other, direction.into(), Some(max_delta), &options)?;
            write_output(output.as_deref(), &joined)?;
        }
        Commands::Resample {
            input,
            target,
            policy,
            output,
        } => {
            let source = read_csv_path(&input)?;
            let target = read_csv_path(&target)?;
            let resampled = resample(&source, target.index(), policy.into())?;
            write_output(output.as_deref(), &resampled)?;
        }
    }
    Ok(())
}

fn parse_base(spec: &str) -> Result<(&str, usize)> {
    let Some((base, count)) = spec.rsplit_once(':') else {
        bail!("packed field must be NAME:COUNT, got {spec:?}");
    };
    let count = count
        .parse()
        .with_context(|| format!("invalid count in {spec:?}"))?;
    Ok((base, count))
}

fn millis(ms: f64) -> Result<Duration> {
    if !ms.is_finite() || ms < 0.0 {
        bail!("interval must be a non-negative number of milliseconds, got {ms}");
    }
    Ok(Duration::from_secs_f64(ms / 1_000.0))
}

fn read_csv_path(path: &Path) -> Result<Frame> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_csv(file).with_context(|| format!("reading {}", path.display()))
}

/// Reads a CSV whose first column is `time` (ns since the Unix epoch, UTC).
fn read_csv<R: Read>(reader: R) -> Result<Frame> {
    let mut reader = csv::Reader::from_reader(reader);
    let headers = reader.headers()?.clone();
    if headers.get(0) != Some("time") {
        bail!("first column must be `time`");
    }
    let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

    let mut index = Vec::new();
    let mut columns: Vec<Vec<Value>> = vec![Vec::new(); names.len()];
    for (row, record) in reader.records().enumerate() {
        let record = record?;
        let time = record.get(0).unwrap_or_default();
        index.push(
            time.trim()
                .parse::<i64>()
                .with_context(|| format!("row {row}: bad time {time:?}"))?,
        );
        for (i, values) in columns.iter_mut().enumerate() {
            values.push(parse_cell(record.get(i + 1).unwrap_or_default()));
        }
    }

    let mut frame = Frame::new(index);
    for (name, values) in names.into_iter().zip(columns) {
        frame.push_column(name, values)?;
    }
    Ok(frame)
}

fn parse_cell(text: &str) -> Value {
    let text = text.trim();
    if text.is_empty() {
        return Value::Missing;
    }
    if let Ok(v) = text.parse::<i64>() {
        return Value::Int(v);
    }
    if let Ok(v) = text.parse::<f64>() {
        return Value::Float(v);
    }
    match text {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::Text(text.to_string()),
    }
}

fn write_csv<W: Write>(writer: W, frame: &Frame) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    let mut header = vec!["time".to_string()];
    header.extend(frame.column_names().map(str::to_string));
    writer.write_record(&header)?;
    for (row, ts) in frame.index().iter().enumerate() {
        let mut record = vec![ts.to_string()];
        record.extend(frame.columns().iter().map(|c| c.get(row).to_string()));
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_output(path: Option<&Path>, frame: &Frame) -> Result<()> {
    match path {
        #[cfg(feature = "arrow")]
        Some(path) if path.extension().is_some_and(|ext| ext == "parquet") => {
            efd_client::frame::arrow::write_parquet(path, frame)
        }
        Some(path) => {
            let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
            write_csv(file, frame)
        }
        None => write_csv(io::stdout().lock(), frame),
    }
}
