//! Gradelo CLI - send a single tracking hit
//!
//! Usage:
//!     gradelo --app-id site-42 event signup --param plan=pro
//!     gradelo --config gradelo.json session-start
//!     gradelo --app-id site-42 --dry-run pageview checkout
//!     RUST_LOG=gradelo_core=debug gradelo --app-id site-42 logout

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use gradelo_core::{
    ClientConfig, FileStore, HttpMethod, Params, RecordingTransport, Tracker, TrackerError,
    Transport,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gradelo")]
#[command(about = "Send Gradelo analytics hits from the command line")]
#[command(version)]
struct Args {
    /// Path to a JSON client config
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Tracker/site id (overrides the config file)
    #[arg(long, global = true)]
    app_id: Option<String>,

    /// Collector base URL (overrides the config file)
    #[arg(long, global = true)]
    collector_url: Option<String>,

    /// Send hits as POST form bodies instead of GET query strings
    #[arg(long, global = true)]
    post: bool,

    /// Start the implicit session during initialize
    #[arg(long)]
    auto_session: bool,

    /// File the client id is persisted in
    #[arg(long, default_value = ".gradelo/identity.json")]
    identity_file: PathBuf,

    /// Extra hit parameter, repeatable
    #[arg(
        short,
        long = "param",
        value_name = "KEY=VALUE",
        value_parser = parse_param,
        global = true
    )]
    params: Vec<(String, String)>,

    /// Print the requests instead of sending them
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Trigger a custom event
    Event { event_id: String },
    /// Log a user in
    Login { login_type: String, user_id: String },
    /// Log the current user out
    Logout,
    /// Start a session and print its token
    SessionStart,
    /// Stop a session
    SessionStop { session_id: String },
    /// Start a pageview and print its token
    Pageview { page_view_id: String },
    /// Print the persisted client id
    ClientId,
}

fn parse_param(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in '{}'", raw)),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gradelo_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClientConfig::from_json_file(path)?,
        None => ClientConfig::default(),
    };
    if let Some(app_id) = &args.app_id {
        config.app_id = Some(app_id.clone());
    }
    if let Some(url) = &args.collector_url {
        config.collector_url = url.clone();
    }
    if args.post {
        config.method = HttpMethod::Post;
    }
    if args.auto_session {
        config.auto_start_session = true;
    }

    let recorder = Arc::new(RecordingTransport::new());
    let mut builder = Tracker::builder()
        .config(config)
        .store(Arc::new(FileStore::new(&args.identity_file)?));
    if args.dry_run {
        builder = builder.transport(recorder.clone() as Arc<dyn Transport>);
    }
    let tracker = builder.build()?;

    let failed = Arc::new(AtomicBool::new(false));
    let failed_flag = failed.clone();
    tracker.set_failure_handler(move |failure| {
        tracing::error!(
            hit = %failure.request.hit_type(),
            "delivery failed: {}",
            failure.error
        );
        failed_flag.store(true, Ordering::SeqCst);
    });

    // Printing the client id sends nothing, so it needs no app id
    if !matches!(args.command, Command::ClientId) {
        tracker.initialize_from_config()?;
        if let Some(session) = tracker.implicit_session() {
            tracing::info!("implicit session: {}", session);
        }
    }

    let params: Params = args.params.iter().cloned().collect();
    let token = run_command(&tracker, &args.command, &params)?;
    if let Some(token) = token {
        println!("{}", token);
    }

    tracker.flush().await;

    if args.dry_run {
        for request in recorder.requests() {
            println!("{} {}", request.method(), request.url_with_query());
        }
    }

    let stats = tracker.stats();
    tracing::debug!(
        enqueued = stats.enqueued,
        delivered = stats.delivered,
        failed = stats.failed,
        "done"
    );

    if failed.load(Ordering::SeqCst) {
        std::process::exit(2);
    }
    Ok(())
}

fn run_command(
    tracker: &Tracker,
    command: &Command,
    params: &Params,
) -> Result<Option<String>, TrackerError> {
    match command {
        Command::Event { event_id } => tracker.trigger_event(event_id, params).map(|_| None),
        Command::Login { login_type, user_id } => {
            tracker.login(login_type, user_id, params).map(|_| None)
        }
        Command::Logout => tracker.logout(params).map(|_| None),
        Command::SessionStart => tracker.start_session(params).map(Some),
        Command::SessionStop { session_id } => {
            tracker.stop_session(session_id, params).map(|_| None)
        }
        Command::Pageview { page_view_id } => {
            tracker.start_pageview(page_view_id, params).map(Some)
        }
        Command::ClientId => Ok(Some(tracker.client_id())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_param() {
        assert_eq!(
            parse_param("plan=pro").unwrap(),
            ("plan".to_string(), "pro".to_string())
        );
        assert_eq!(
            parse_param("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_param("empty=").unwrap().1, "");
        assert!(parse_param("novalue").is_err());
        assert!(parse_param("=x").is_err());
    }

    #[test]
    fn test_args_parse() {
        let args = Args::try_parse_from([
            "gradelo", "--app-id", "site", "-p", "a=1", "--param", "b=2", "login", "email", "u1",
        ])
        .unwrap();

        assert_eq!(args.app_id.as_deref(), Some("site"));
        assert_eq!(args.params.len(), 2);
        assert!(matches!(args.command, Command::Login { .. }));
    }

    #[test]
    fn test_args_parse_after_subcommand() {
        let args = Args::try_parse_from([
            "gradelo", "--app-id", "site-42", "event", "signup", "--param", "plan=pro", "--dry-run",
        ])
        .unwrap();

        assert_eq!(args.app_id.as_deref(), Some("site-42"));
        assert_eq!(args.params, vec![("plan".to_string(), "pro".to_string())]);
        assert!(args.dry_run);
        assert!(matches!(args.command, Command::Event { ref event_id } if event_id == "signup"));

        let args = Args::try_parse_from(["gradelo", "session-start", "--app-id", "site-42"]).unwrap();
        assert_eq!(args.app_id.as_deref(), Some("site-42"));
    }

    #[tokio::test]
    async fn test_run_command_client_id_without_initialize() {
        let recorder = Arc::new(RecordingTransport::new());
        let tracker = Tracker::builder()
            .transport(recorder.clone())
            .build()
            .unwrap();

        let printed = run_command(&tracker, &Command::ClientId, &Params::new()).unwrap();
        tracker.flush().await;

        assert_eq!(printed, Some(tracker.client_id()));
        assert!(!tracker.is_initialized());
        assert_eq!(recorder.count(), 0);
    }

    #[tokio::test]
    async fn test_run_command_dry() {
        let recorder = Arc::new(RecordingTransport::new());
        let tracker = Tracker::builder()
            .transport(recorder.clone())
            .build()
            .unwrap();
        tracker.initialize("site", false).unwrap();

        let token = run_command(
            &tracker,
            &Command::Pageview {
                page_view_id: "home".to_string(),
            },
            &Params::new(),
        )
        .unwrap();
        tracker.flush().await;

        assert!(token.is_some());
        assert_eq!(recorder.count(), 1);
    }
}
