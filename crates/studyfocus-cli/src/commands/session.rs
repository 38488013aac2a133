use std::time::Duration;

use clap::{ArgGroup, Subcommand};
use studyfocus_core::{
    Config, Database, Event, FocusController, HostInput, SessionContext, SessionDriver,
    SessionRecord, Subject, Task,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::warn;
use uuid::Uuid;

use super::read_json_arg;

const CONTROLLER_KEY: &str = "focus_controller";

#[derive(Subcommand)]
pub enum SessionAction {
    /// Start a scheduled or ad-hoc focus session
    #[command(group(ArgGroup::new("source").required(true).args(["session", "adhoc"])))]
    Start {
        /// Scheduled session record (JSON or @file)
        #[arg(long)]
        session: Option<String>,
        /// Quick-start an ad-hoc session
        #[arg(long)]
        adhoc: bool,
        /// Ad-hoc length in minutes (defaults to the task estimate)
        #[arg(long, requires = "adhoc")]
        minutes: Option<u32>,
        /// Task snapshot to bind (JSON or @file)
        #[arg(long)]
        task: Option<String>,
        /// Subject snapshot to bind (JSON or @file)
        #[arg(long)]
        subject: Option<String>,
        /// Enable the Pomodoro sub-cycle right away
        #[arg(long)]
        pomodoro: bool,
    },
    /// Pause the running session
    Pause,
    /// Resume a paused session
    Resume,
    /// Push the planned end forward
    Extend {
        #[arg(value_parser = clap::value_parser!(u32).range(1..))]
        minutes: u32,
    },
    /// Toggle the Pomodoro sub-cycle
    Pomodoro,
    /// Stop early (run twice within the confirm window)
    Stop,
    /// Skip the session without crediting time
    Skip,
    /// Toggle a subtask of the bound task
    Subtask { id: i64 },
    /// Attempt to navigate away (pauses and asks for confirmation)
    Navigate { target: String },
    /// Leave: confirm the pending navigation
    Confirm,
    /// Stay: cancel the pending navigation
    Cancel,
    /// Dismiss a notification
    Dismiss { id: Uuid },
    /// Print the current snapshot as JSON
    Status,
    /// Drive the session live, reading commands from stdin
    Run,
}

fn load_controller(db: &Database, config: &Config) -> FocusController {
    let restored = match db.kv_get(CONTROLLER_KEY) {
        Ok(Some(json)) => match serde_json::from_str::<FocusController>(&json) {
            Ok(controller) => Some(controller),
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved session");
                None
            }
        },
        Ok(None) => None,
        Err(e) => {
            warn!(error = %e, "could not read saved session");
            None
        }
    };
    match restored {
        Some(mut controller) => {
            controller.reconfigure(config.controller_settings());
            controller
        }
        None => FocusController::new(config.controller_settings()),
    }
}

fn save_controller(db: &Database, controller: &FocusController) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string(controller)?;
    db.kv_set(CONTROLLER_KEY, &json)?;
    Ok(())
}

fn log_resolutions(db: &Database, events: &[Event]) {
    for event in events {
        if let Err(e) = db.record_resolution(event) {
            warn!(error = %e, "could not log resolved session");
        }
    }
}

enum LiveCommand {
    Input(HostInput),
    Quit,
}

const LIVE_HELP: &str = "commands: p pause, r resume, e N extend, t pomodoro, s stop, k skip, \
x ID subtask, n TARGET navigate, y leave, c stay, u stay after Ctrl-C, d ID dismiss, q detach";

fn parse_command(line: &str) -> Result<Option<LiveCommand>, String> {
    let line = line.trim();
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };
    let number = |what: &str| -> Result<i64, String> {
        arg.parse::<i64>()
            .map_err(|_| format!("'{cmd}' needs a {what}, got '{arg}'"))
    };
    let input = match cmd {
        "" => return Ok(None),
        "q" => return Ok(Some(LiveCommand::Quit)),
        "p" => HostInput::Pause,
        "r" => HostInput::Resume,
        "e" => {
            let minutes = u32::try_from(number("number of minutes")?)
                .ok()
                .filter(|m| *m > 0)
                .ok_or_else(|| format!("'{arg}' is not a positive number of minutes"))?;
            HostInput::Extend(minutes)
        }
        "t" => HostInput::TogglePomodoro,
        "s" => HostInput::Stop,
        "k" => HostInput::Skip,
        "x" => HostInput::ToggleSubtask(number("subtask id")?),
        "n" if !arg.is_empty() => HostInput::Navigate(arg.to_string()),
        "y" => HostInput::ConfirmNavigation,
        "c" => HostInput::CancelNavigation,
        "u" => HostInput::UnloadSurvived,
        "d" => HostInput::Dismiss(
            Uuid::parse_str(arg).map_err(|_| format!("'{arg}' is not a notification id"))?,
        ),
        _ => return Err(LIVE_HELP.to_string()),
    };
    Ok(Some(LiveCommand::Input(input)))
}

/// A second Ctrl-C inside this window leaves; a later one prompts again.
const LEAVE_WINDOW: Duration = Duration::from_secs(5);

fn is_second_press(last_prompt: Option<Instant>, now: Instant) -> bool {
    last_prompt.is_some_and(|at| now.saturating_duration_since(at) <= LEAVE_WINDOW)
}

async fn read_stdin(tx: mpsc::Sender<HostInput>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Ok(Some(LiveCommand::Input(input))) => {
                if tx.send(input).await.is_err() {
                    return;
                }
            }
            Ok(Some(LiveCommand::Quit)) => return,
            Ok(None) => {}
            Err(msg) => eprintln!("{msg}"),
        }
    }
    // stdin closed: keep the sender so the session runs to its end.
    std::future::pending::<()>().await;
}

fn dispatch(
    driver: &mut SessionDriver,
    action: SessionAction,
) -> Result<Vec<Event>, Box<dyn std::error::Error>> {
    let events = match action {
        SessionAction::Start {
            session,
            adhoc: _,
            minutes,
            task,
            subject,
            pomodoro,
        } => {
            let context = SessionContext {
                task: task.as_deref().map(read_json_arg::<Task>).transpose()?,
                subject: subject.as_deref().map(read_json_arg::<Subject>).transpose()?,
            };
            let now = driver.now();
            let controller = driver.controller_mut();
            let mut outcome = match session.as_deref() {
                Some(raw) => {
                    let record: SessionRecord = read_json_arg(raw)?;
                    controller.start_session(record, context, now)?
                }
                None => controller.start_ad_hoc(minutes, context, now)?,
            };
            if pomodoro {
                outcome.merge(controller.toggle_pomodoro(now));
            }
            driver.handle(outcome)
        }
        SessionAction::Pause => driver.apply(HostInput::Pause),
        SessionAction::Resume => driver.apply(HostInput::Resume),
        SessionAction::Extend { minutes } => driver.apply(HostInput::Extend(minutes)),
        SessionAction::Pomodoro => driver.apply(HostInput::TogglePomodoro),
        SessionAction::Stop => driver.apply(HostInput::Stop),
        SessionAction::Skip => driver.apply(HostInput::Skip),
        SessionAction::Subtask { id } => driver.apply(HostInput::ToggleSubtask(id)),
        SessionAction::Navigate { target } => driver.apply(HostInput::Navigate(target)),
        SessionAction::Confirm => driver.apply(HostInput::ConfirmNavigation),
        SessionAction::Cancel => driver.apply(HostInput::CancelNavigation),
        SessionAction::Dismiss { id } => {
            if !driver.controller_mut().dismiss_notification(id) {
                return Err(format!("no notification with id {id}").into());
            }
            Vec::new()
        }
        SessionAction::Status | SessionAction::Run => Vec::new(),
    };
    Ok(events)
}

async fn live(mut driver: SessionDriver, db: &Database) -> Result<FocusController, Box<dyn std::error::Error>> {
    let events = driver.tick();
    log_resolutions(db, &events);
    if !driver.controller().is_active() {
        return Err("no active focus session; start one with `session start`".into());
    }
    eprintln!("{LIVE_HELP}");
    println!("{}", serde_json::to_string(&driver.snapshot())?);

    let (tx, rx) = mpsc::channel(16);
    let unload_tx = tx.downgrade();
    let reader = tokio::spawn(read_stdin(tx));
    let reader_handle = reader.abort_handle();
    let signals = tokio::spawn(async move {
        let mut last_prompt: Option<Instant> = None;
        while tokio::signal::ctrl_c().await.is_ok() {
            let now = Instant::now();
            if is_second_press(last_prompt, now) {
                // Leaving: close input so the driver detaches and saves.
                reader_handle.abort();
                break;
            }
            last_prompt = Some(now);
            if let Some(tx) = unload_tx.upgrade() {
                let _ = tx.send(HostInput::Unload).await;
            }
            eprintln!(
                "Leave the focus session? Ctrl-C again within {}s to leave, 'u' to stay.",
                LEAVE_WINDOW.as_secs()
            );
        }
    });

    let controller = driver
        .run(rx, |events, snapshot| {
            log_resolutions(db, events);
            let line = serde_json::json!({ "events": events, "snapshot": snapshot });
            println!("{line}");
        })
        .await;
    reader.abort();
    signals.abort();
    Ok(controller)
}

pub fn run(action: SessionAction) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    let db = Database::open()?;
    let controller = load_controller(&db, &config);
    let backend = super::backend(&config)?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let result = runtime.block_on(async {
        let mut driver = SessionDriver::new(controller, backend).with_tick(config.timer.tick());
        if matches!(action, SessionAction::Run) {
            let controller = live(driver, &db).await?;
            save_controller(&db, &controller)?;
            return Ok(());
        }

        // Catch up on time that passed since the last invocation.
        let mut events = driver.tick();
        events.extend(dispatch(&mut driver, action)?);
        events.extend(driver.settle().await);
        log_resolutions(&db, &events);

        let snapshot = driver.snapshot();
        save_controller(&db, driver.controller())?;
        let json = serde_json::json!({ "events": events, "snapshot": snapshot });
        println!("{}", serde_json::to_string_pretty(&json)?);
        Ok::<(), Box<dyn std::error::Error>>(())
    });
    // stdin reads may still be parked on a blocking thread.
    runtime.shutdown_background();
    result
}
