//! `algomon`: follow the results of a Lean algorithm from the terminal.
//!
//! The last argument selects the session: a port follows an engine streaming
//! on `localhost`, a `.json` path shows a result file and re-reads it when it
//! changes. Without either the new-session prompt is printed; if API
//! credentials are set in the environment it also lists the user's projects.
//!
//! Diagnostics go to stderr and are filtered with `RUST_LOG`.

use std::process::ExitCode;
use std::sync::Arc;

use algomon::{
    ApiConfig, BootstrapAction, ChannelNotifier, MonitorError, MonitorEvent, ResultContext,
    SessionCoordinator, SessionState, StatisticState, classify_statistic,
};
use algomon_api::ApiClient;
use rust_decimal::Decimal;
use tokio::sync::mpsc::UnboundedReceiver;

const USAGE: &str = "\
usage: algomon [--once] <port|result.json>

  <port>         follow a Lean engine streaming on localhost:<port>
  <result.json>  show a result file and follow changes to it
  --once         exit after the first completed result
";

const USER_ENV: &str = "ALGOMON_USER_ID";
const TOKEN_ENV: &str = "ALGOMON_API_TOKEN";
const URL_ENV: &str = "ALGOMON_API_URL";

#[derive(Debug, Default)]
struct Options {
    once: bool,
    help: bool,
    positional: Vec<String>,
}

impl Options {
    fn parse(args: impl IntoIterator<Item = String>) -> Self {
        let mut opts = Self::default();
        for arg in args {
            match arg.as_str() {
                "--once" => opts.once = true,
                "-h" | "--help" => opts.help = true,
                _ => opts.positional.push(arg),
            }
        }
        opts
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();

    let opts = Options::parse(std::env::args().skip(1));
    if opts.help {
        print!("{USAGE}");
        return ExitCode::SUCCESS;
    }
    match run(opts).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(opts: Options) -> Result<(), MonitorError> {
    let api = api_client_from_env()?;
    let (notifier, mut events) = ChannelNotifier::new();
    let mut builder = SessionCoordinator::builder().notifier(Arc::new(notifier));
    if let Some(api) = &api {
        builder = builder.result_api(api.clone());
    }
    let coordinator = Arc::new(builder.build()?);
    let delivery = coordinator.spawn_delivery_loop();

    let outcome = match coordinator.bootstrap(&opts.positional).await {
        Ok(BootstrapAction::Prompt) => print_prompt(api.as_deref()).await,
        Ok(action) => {
            tracing::info!(?action, "following session");
            follow(&mut events, opts.once).await;
            match coordinator.shutdown_session().await {
                Ok(()) | Err(MonitorError::NoSession) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Err(e) => Err(e),
    };
    delivery.stop().await;
    outcome
}

fn api_client_from_env() -> Result<Option<Arc<ApiClient>>, MonitorError> {
    let (Ok(user_id), Ok(token)) = (std::env::var(USER_ENV), std::env::var(TOKEN_ENV)) else {
        return Ok(None);
    };
    let mut config = ApiConfig {
        user_id,
        token,
        ..ApiConfig::default()
    };
    if let Ok(url) = std::env::var(URL_ENV) {
        config.base_url = url;
    }
    ApiClient::new(config).map(|c| Some(Arc::new(c)))
}

async fn print_prompt(api: Option<&ApiClient>) -> Result<(), MonitorError> {
    println!("No session to open.");
    print!("{USAGE}");
    let Some(api) = api else {
        return Ok(());
    };
    let projects = api.read_projects().await?;
    println!("\nprojects:");
    for project in projects {
        println!("  {:>10}  {}", project.project_id, project.name);
    }
    Ok(())
}

/// Print events until the session ends, Ctrl-C, or (with `once`) the first
/// completed result.
async fn follow(events: &mut UnboundedReceiver<MonitorEvent>, once: bool) {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                if !print_event(&event, once) {
                    break;
                }
            }
            _ = &mut ctrl_c => break,
        }
    }
}

/// Returns `false` when following should stop.
fn print_event(event: &MonitorEvent, once: bool) -> bool {
    match event {
        MonitorEvent::SessionOpened { name } => println!("opened {name}"),
        MonitorEvent::SessionClosed => {
            println!("session closed");
            return false;
        }
        MonitorEvent::SessionUpdated(ctx) => {
            print_update(ctx);
            if ctx.completed() {
                print_statistics(ctx);
                if once {
                    return false;
                }
            }
        }
        MonitorEvent::StateChanged(SessionState::Subscribed) => {}
        MonitorEvent::StateChanged(SessionState::Unsubscribed) => {
            println!("unsubscribed");
            return false;
        }
        MonitorEvent::LogEntry {
            time,
            message,
            level,
        } => println!("{} [{level}] {message}", time.format("%H:%M:%S")),
        MonitorEvent::ShowNewSession => {}
    }
    true
}

fn print_update(ctx: &ResultContext) {
    let points: usize = ctx
        .result
        .charts
        .values()
        .flat_map(|c| c.series.values())
        .map(|s| s.values.len())
        .sum();
    let progress = ctx
        .progress
        .map(|p| format!(", {:.0}%", p * Decimal::ONE_HUNDRED))
        .unwrap_or_default();
    println!(
        "{}: {} chart(s), {points} point(s){progress}",
        ctx.name,
        ctx.result.charts.len()
    );
}

fn print_statistics(ctx: &ResultContext) {
    let stats = &ctx.result.statistics;
    if stats.is_empty() {
        return;
    }
    let width = stats.keys().map(String::len).max().unwrap_or(0);
    println!("statistics:");
    for (key, value) in stats {
        println!(
            "  {key:<width$}  {value:>14}  {}",
            state_label(classify_statistic(key, value))
        );
    }
}

const fn state_label(state: StatisticState) -> &'static str {
    match state {
        StatisticState::Positive => "positive",
        StatisticState::Negative => "negative",
        StatisticState::Inconclusive => "",
    }
}
