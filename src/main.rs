mod algorithm;
mod baseline;
mod checksum;
mod cli;
mod diff;
mod dir_list;
mod ignore_rules;
mod monitor;
mod report;
mod scanner;
mod shutdown;
mod snapshot;
mod util;

use algorithm::HashAlgorithm;
use baseline::BaselineStore;
use cli::Cli;
use monitor::{BaselineMode, Monitor, MonitorOptions, Session, init_baseline};
use report::ReportOptions;
use shutdown::ShutdownSignal;
use std::fmt as stdfmt;
use std::io::{IsTerminal, stderr};
use std::process::ExitCode;
use std::time::Duration;
use tracing::{Event, Level, Subscriber, error, info, warn};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt as tracing_fmt;
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;

struct SentryExitCode;

impl SentryExitCode {
    /// Exit code used for configuration errors and aborted monitoring.
    fn any_error() -> ExitCode {
        ExitCode::from(255)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    init_tracing(cli.verbose, cli.log_level);

    match run(cli) {
        Ok(exit_code) => exit_code,
        Err(err) => {
            error!("{err}");
            SentryExitCode::any_error()
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let algorithm: HashAlgorithm = cli.hash.parse()?;
    let store = BaselineStore::new(&cli.baseline);
    let session = Session::open(&cli.directory, algorithm, store)?;

    if cli.init {
        let result = init_baseline(&session)?;
        info!("Baseline initialized with {} files", result.files);
        if result.skipped > 0 {
            warn!(
                "{} entries could not be hashed and are not part of the baseline",
                result.skipped
            );
        }
        return Ok(ExitCode::SUCCESS);
    }

    let shutdown = ShutdownSignal::new();
    let handler_signal = shutdown.clone();
    ctrlc::set_handler(move || handler_signal.trigger())?;

    let options = MonitorOptions {
        interval: Duration::from_secs(cli.interval),
        mode: if cli.fixed_baseline {
            BaselineMode::Fixed
        } else {
            BaselineMode::Rolling
        },
        max_save_failures: cli.max_save_failures,
        max_cycles: cli.cycles,
    };
    let report_options = ReportOptions {
        show_diff: cli.diff,
        show_unchanged: cli.all,
    };

    let mut monitor = Monitor::new(&session, options);
    let summary = monitor.run(&shutdown, |cycle| report::print_cycle(cycle, report_options))?;

    if summary.interrupted {
        info!("Interrupted after {} cycles", summary.cycles);
    } else {
        info!("Completed {} cycles", summary.cycles);
    }

    Ok(ExitCode::SUCCESS)
}

fn init_tracing(verbose: u8, log_level: Option<cli::LogLevel>) {
    let stderr_is_terminal = stderr().is_terminal();
    let formatter = EmojiFormatter { stderr_is_terminal };

    let explicit_level = match (log_level, verbose) {
        (Some(level), _) => Some(level.as_filter()),
        (None, 0) => None,
        (None, 1) => Some("info"),
        (None, _) => Some("debug"),
    };

    let filter = match explicit_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let fmt_layer = tracing_fmt::layer()
        .event_format(formatter)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

struct EmojiFormatter {
    stderr_is_terminal: bool,
}

impl<S, N> FormatEvent<S, N> for EmojiFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> stdfmt::Result {
        if self.stderr_is_terminal {
            match *event.metadata().level() {
                Level::TRACE => write!(writer, "🔬 ")?,
                Level::DEBUG => write!(writer, "🔍 ")?,
                Level::INFO => write!(writer, "ℹ️ ")?,
                Level::WARN => write!(writer, "⚠️  ")?,
                Level::ERROR => write!(writer, "❌️ ")?,
            }
        } else {
            match *event.metadata().level() {
                Level::TRACE => writer.write_str("TRACE: ")?,
                Level::DEBUG => writer.write_str("DEBUG: ")?,
                Level::INFO => writer.write_str("INFO: ")?,
                Level::WARN => writer.write_str("WARN: ")?,
                Level::ERROR => writer.write_str("ERROR: ")?,
            }
        }

        ctx.format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}
