use clap::{Args, Parser, Subcommand};
use daqmon_common::{
    CHANNELS_PER_GROUP, RunNumber, UniformChannelMap, init_tracer,
    metrics::{
        component_info_metric,
        failures::{self, FailureKind},
        names::{FAILURES, LAST_EVENT_NUMBER},
    },
    tracer::{TracerEngine, TracerOptions},
};
use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use miette::IntoDiagnostic;
use std::{
    fs::File,
    io::BufWriter,
    net::SocketAddr,
    path::PathBuf,
    time::Duration,
};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{error, info, instrument, warn};
use waveform_analysis::{AnalysisParameters, Event, EventProcessor, Real};
use waveform_monitor::{
    EventSource, Monitor, MonitorOptions, OutputSink, PrintSink, RedisSink, ResultsWriter,
    SinkKind, StreamDataIndex,
    source::{SimulationParameters, Simulator, TraceFile},
};

#[derive(Debug, Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(flatten)]
    analysis: AnalysisParameters,

    /// Number of channels read out.
    #[clap(long, default_value_t = CHANNELS_PER_GROUP)]
    num_channels: usize,

    #[clap(long, default_value_t = CHANNELS_PER_GROUP)]
    channels_per_group: usize,

    /// Channels below this number are on induction planes, the rest on collection planes.
    #[clap(long, default_value = "0")]
    num_induction_channels: usize,

    #[clap(long, value_enum, default_value_t)]
    sink: SinkKind,

    #[clap(long, env, default_value = "redis://127.0.0.1:6379")]
    redis_url: String,

    /// Name under which every point is published.
    #[clap(long, default_value = "waveforms")]
    stream_name: String,

    /// Published points expire after this many seconds. Zero keeps them forever.
    #[clap(long, default_value = "0")]
    expire_seconds: u32,

    #[clap(long, default_value = "0")]
    run: RunNumber,

    #[clap(long, default_value = "0")]
    sub_run: RunNumber,

    /// Interval between events.
    #[clap(long, default_value = "100")]
    event_period_ms: u64,

    /// Length of a monitoring time bucket.
    #[clap(long, default_value = "1000")]
    update_period_ms: u64,

    #[clap(long, default_value = "5000")]
    publish_period_ms: u64,

    /// Forget every series after each publication.
    #[clap(long)]
    clear_after_publish: bool,

    /// Write the analysis of every event to this file, one line of JSON per event.
    #[clap(long)]
    results_file: Option<PathBuf>,

    #[clap(long, env, default_value = "127.0.0.1:9090")]
    observability_address: SocketAddr,

    /// If set, then open-telemetry data is sent to the URL specified, otherwise the standard tracing subscriber is used
    #[clap(long)]
    otel_endpoint: Option<String>,

    /// All OpenTelemetry spans are emitted with this as the "service.namespace" property.
    #[clap(long, default_value = "")]
    otel_namespace: String,

    #[command(subcommand)]
    source: Source,
}

#[derive(Debug, Subcommand)]
enum Source {
    /// Replay events from a digitiser trace file.
    File(FileArgs),
    /// Generate noise and pulses.
    Simulate(SimulationParameters),
}

#[derive(Debug, Args)]
struct FileArgs {
    /// Path to the trace file.
    #[clap(long)]
    path: PathBuf,

    /// Restart from the first event after the last.
    #[clap(long)]
    cycle: bool,

    /// Pedestal reported for every channel.
    #[clap(long, default_value = "0")]
    pedestal: Real,
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();

    let _tracer = init_tracer!(TracerOptions::new(
        args.otel_endpoint.as_deref(),
        args.otel_namespace.clone()
    ))
    .into_diagnostic()?;

    let builder = PrometheusBuilder::new();
    builder
        .with_http_listener(args.observability_address)
        .install()
        .into_diagnostic()?;
    component_info_metric("waveform-monitor");

    let channel_map = UniformChannelMap::new(
        args.num_channels,
        args.channels_per_group,
        args.num_induction_channels,
    );

    let mut source = match &args.source {
        Source::File(file) => EventSource::File(
            TraceFile::open(&file.path, file.cycle, file.pedestal).into_diagnostic()?,
        ),
        Source::Simulate(parameters) => EventSource::Simulate(
            Simulator::new(parameters.clone(), &channel_map).into_diagnostic()?,
        ),
    };

    let mut sink = match args.sink {
        SinkKind::Redis => {
            let mut redis = RedisSink::open(&args.redis_url).into_diagnostic()?;
            if let Err(e) = redis.connect() {
                warn!("Redis unavailable, retrying at each publication: {e}");
                counter!(
                    FAILURES,
                    &[failures::get_label(FailureKind::SinkPublishFailed)]
                )
                .increment(1);
            }
            OutputSink::Redis(redis)
        }
        SinkKind::Print => OutputSink::Print(PrintSink::stdout()),
    };

    let mut results = args
        .results_file
        .as_deref()
        .map(ResultsWriter::<BufWriter<File>>::create)
        .transpose()
        .into_diagnostic()?;

    let events_per_update = (args.update_period_ms / args.event_period_ms.max(1)).max(1);
    let mut monitor = Monitor::new(
        &channel_map,
        MonitorOptions {
            stream_name: args.stream_name.clone(),
            expire: args.expire_seconds,
            events_per_update: events_per_update as usize,
        },
    );
    let mut processor = EventProcessor::new(args.analysis.clone(), Box::new(channel_map));
    info!("Analysis parameters: {:?}", processor.parameters());

    let mut event_interval = interval(Duration::from_millis(args.event_period_ms.max(1)));
    event_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut update_interval = interval(Duration::from_millis(args.update_period_ms.max(1)));
    let mut publish_interval = interval(Duration::from_millis(args.publish_period_ms.max(1)));
    // The first tick of an interval completes immediately.
    update_interval.tick().await;
    publish_interval.tick().await;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = event_interval.tick() => {
                match source.next_event() {
                    Ok(Some(event)) => on_event(&args, &mut processor, &mut monitor, results.as_mut(), &event),
                    Ok(None) => {
                        info!("No more events");
                        break;
                    }
                    Err(e) => {
                        error!("Failed to read event: {e}");
                        counter!(FAILURES, &[failures::get_label(FailureKind::FileReadFailed)])
                            .increment(1);
                        break;
                    }
                }
            }
            _ = update_interval.tick() => monitor.update(),
            _ = publish_interval.tick() => publish(&mut monitor, &mut sink, args.clear_after_publish),
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }
    }

    monitor.update();
    publish(&mut monitor, &mut sink, false);
    if let Some(results) = results.as_mut() {
        results.flush().into_diagnostic()?;
    }
    Ok(())
}

#[instrument(skip_all, fields(event_number = event.number))]
fn on_event(
    args: &Cli,
    processor: &mut EventProcessor,
    monitor: &mut Monitor,
    results: Option<&mut ResultsWriter<BufWriter<File>>>,
    event: &Event,
) {
    let info = processor.process(event);
    gauge!(LAST_EVENT_NUMBER).set(f64::from(info.number));

    monitor.fill(
        processor,
        StreamDataIndex::now(args.run, args.sub_run, event.number),
    );

    if let Some(results) = results {
        if let Err(e) = results.write(processor) {
            warn!("Failed to write results: {e}");
            counter!(
                FAILURES,
                &[failures::get_label(FailureKind::FileWriteFailed)]
            )
            .increment(1);
        }
    }
}

fn publish(monitor: &mut Monitor, sink: &mut OutputSink, clear: bool) {
    let num_points = monitor.publish(sink);
    info!("Delivered {num_points} points for event {}", monitor.index().event);
    if clear {
        monitor.clear();
    }
}
