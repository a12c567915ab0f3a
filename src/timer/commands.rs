use std::str::FromStr;

use anyhow::{anyhow, bail, Context, Error, Result};
use chrono::Local;

use crate::{
    session::SessionBackend,
    settings::TimerSettings,
    utils::format::{format_clock, format_minutes},
};

use super::{NoticeLevel, TimerController, TimerEvent, TimerMode, TimerSnapshot};

const DEFAULT_HISTORY_LIMIT: usize = 10;

pub const HELP: &str = "\
commands:
  start                      start or resume the countdown
  pause                      pause the countdown
  reset                      cancel and return to an idle focus timer
  skip                       finish the current interval now
  mode <focus|short|long> [confirm]
                             switch mode; confirm if the timer is active
  status                     show the timer
  history [n]                recent sessions
  today                      progress towards the daily goal
  settings                   show timer settings
  set <field> <value>        change one setting
  goal <n>                   set the daily goal
  reload                     re-read settings from disk
  quit                       stop and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Pause,
    Reset,
    Skip,
    Mode { mode: TimerMode, confirmed: bool },
    Status,
    History(usize),
    Today,
    Settings,
    Set { field: String, value: String },
    Goal(u32),
    Reload,
    Help,
    Quit,
}

impl FromStr for Command {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            bail!("empty command");
        };
        let args: Vec<&str> = words.collect();

        let command = match (name.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("start" | "resume", []) => Command::Start,
            ("pause", []) => Command::Pause,
            ("reset" | "stop", []) => Command::Reset,
            ("skip" | "next", []) => Command::Skip,
            ("mode", [mode]) => Command::Mode {
                mode: mode.parse()?,
                confirmed: false,
            },
            ("mode", [mode, flag]) if is_confirmation(flag) => Command::Mode {
                mode: mode.parse()?,
                confirmed: true,
            },
            ("status", []) => Command::Status,
            ("history", []) => Command::History(DEFAULT_HISTORY_LIMIT),
            ("history", [n]) => Command::History(
                n.parse()
                    .with_context(|| format!("'{n}' is not a session count"))?,
            ),
            ("today", []) => Command::Today,
            ("settings", []) => Command::Settings,
            ("set", [field, value @ ..]) if !value.is_empty() => Command::Set {
                field: field.to_string(),
                value: value.join(" "),
            },
            ("goal", [n]) => Command::Goal(
                n.parse()
                    .with_context(|| format!("'{n}' is not a session count"))?,
            ),
            ("reload", []) => Command::Reload,
            ("help" | "?", _) => Command::Help,
            ("quit" | "exit" | "q", []) => Command::Quit,
            (other, _) => bail!("unrecognised command '{other}'; try 'help'"),
        };

        Ok(command)
    }
}

fn is_confirmation(word: &str) -> bool {
    matches!(word, "confirm" | "yes" | "-y" | "--yes")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Text(String),
    Quit,
}

pub async fn execute<B: SessionBackend>(
    controller: &TimerController<B>,
    command: Command,
) -> Result<Reply> {
    let text = match command {
        Command::Start => describe(&controller.start().await?),
        Command::Pause => describe(&controller.pause().await?),
        Command::Reset => describe(&controller.reset().await?),
        Command::Skip => describe(&controller.skip().await?),
        Command::Mode { mode, confirmed } => {
            describe(&controller.switch_mode(mode, confirmed).await?)
        }
        Command::Status => describe(&controller.snapshot().await),
        Command::History(limit) => {
            let sessions = controller.history(limit).await?;
            if sessions.is_empty() {
                "no sessions yet".to_string()
            } else {
                sessions
                    .iter()
                    .map(|s| {
                        format!(
                            "{}  {:<5}  {:<11}  {}",
                            s.start_time.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                            s.session_type.as_str(),
                            s.status.as_str(),
                            format_minutes(s.duration_seconds)
                        )
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
        }
        Command::Today => {
            let progress = controller.today_progress().await?;
            let mut text = format!(
                "{}: {}/{} focus sessions ({}%), {} focused",
                progress.date,
                progress.completed_sessions,
                progress.goal,
                progress.percent(),
                format_minutes(progress.focus_seconds)
            );
            if progress.goal_reached() {
                text.push_str(" - goal reached");
            }
            text
        }
        Command::Settings => {
            let settings = controller.settings().timer_settings();
            let goal = controller.settings().daily_goal();
            format!("{}\ndailyGoal: {goal}", serde_json::to_string_pretty(&settings)?)
        }
        Command::Set { field, value } => {
            let mut settings = controller.settings().timer_settings();
            apply_setting(&mut settings, &field, &value)?;
            describe(&controller.apply_settings(settings).await?)
        }
        Command::Goal(goal) => {
            controller.set_daily_goal(goal)?;
            format!("daily goal set to {goal}")
        }
        Command::Reload => {
            controller.settings().reload();
            let settings = controller.settings().timer_settings();
            describe(&controller.apply_settings(settings).await?)
        }
        Command::Help => HELP.to_string(),
        Command::Quit => return Ok(Reply::Quit),
    };

    Ok(Reply::Text(text))
}

/// Apply a single `set <field> <value>` change. Field names are the
/// camelCase keys of the stored JSON; a few short aliases are accepted.
pub fn apply_setting(settings: &mut TimerSettings, field: &str, value: &str) -> Result<()> {
    match field {
        "focusMinutes" | "focus" => settings.focus_minutes = parse_number(field, value)?,
        "shortBreakMinutes" | "short" => settings.short_break_minutes = parse_number(field, value)?,
        "longBreakMinutes" | "long" => settings.long_break_minutes = parse_number(field, value)?,
        "longBreakInterval" | "interval" => {
            settings.long_break_interval = parse_number(field, value)?
        }
        "autoStartBreaks" => settings.auto_start_breaks = parse_flag(value)?,
        "autoStartFocus" => settings.auto_start_focus = parse_flag(value)?,
        "alarmSound" | "alarm" => settings.alarm_sound = value.to_string(),
        "alarmVolume" => settings.alarm_volume = parse_number(field, value)?,
        "backgroundSound" | "background" => settings.background_sound = value.to_string(),
        "backgroundVolume" => settings.background_volume = parse_number(field, value)?,
        other => bail!("unknown setting '{other}'"),
    }
    Ok(())
}

fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .parse()
        .map_err(|_| anyhow!("'{value}' is not a valid number for {field}"))
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        other => bail!("'{other}' is not on/off"),
    }
}

pub fn describe(snapshot: &TimerSnapshot) -> String {
    let mut line = format!(
        "{} {:?} {}  cycle {}/{}  ({} done)",
        snapshot.mode,
        snapshot.status,
        format_clock(snapshot.remaining_secs),
        snapshot.cycle_position,
        snapshot.long_break_interval,
        snapshot.completed_cycles
    );
    if let Some(id) = &snapshot.session_id {
        line.push_str(&format!("  session {id}"));
    }
    line.to_lowercase()
}

/// One line for events that happen without a command, e.g. an interval
/// running out. Ticks are only shown on whole minutes.
pub fn render_event(event: &TimerEvent) -> Option<String> {
    match event {
        TimerEvent::StateChanged(_) => None,
        TimerEvent::Tick {
            mode,
            remaining_secs,
        } => (remaining_secs % 60 == 0)
            .then(|| format!("{mode} {}", format_clock(*remaining_secs))),
        TimerEvent::IntervalFinished {
            finished,
            next,
            skipped,
            auto_start,
        } => {
            let verb = if *skipped { "skipped" } else { "finished" };
            let follow = if *auto_start { "starting" } else { "type 'start'" };
            Some(format!("{finished} {verb}; next up: {next} ({follow})"))
        }
        TimerEvent::SessionRecorded {
            status,
            duration_seconds,
            ..
        } => Some(format!(
            "session saved as {status} ({})",
            format_minutes(*duration_seconds)
        )),
        TimerEvent::Notification { level, message } => Some(match level {
            NoticeLevel::Info => message.clone(),
            NoticeLevel::Error => format!("error: {message}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        cue::SilentPlayer,
        session::MemorySessions,
        settings::{LocalStorage, SettingsStore},
        timer::TimerStatus,
    };

    #[test]
    fn parses_timer_commands() {
        assert_eq!("start".parse::<Command>().unwrap(), Command::Start);
        assert_eq!(" Pause ".parse::<Command>().unwrap(), Command::Pause);
        assert_eq!("skip".parse::<Command>().unwrap(), Command::Skip);
        assert_eq!(
            "mode long".parse::<Command>().unwrap(),
            Command::Mode {
                mode: TimerMode::LongBreak,
                confirmed: false
            }
        );
        assert_eq!(
            "mode short confirm".parse::<Command>().unwrap(),
            Command::Mode {
                mode: TimerMode::ShortBreak,
                confirmed: true
            }
        );
        assert!("mode short please".parse::<Command>().is_err());
        assert!("mode nap".parse::<Command>().is_err());
    }

    #[test]
    fn parses_arguments() {
        assert_eq!(
            "history".parse::<Command>().unwrap(),
            Command::History(DEFAULT_HISTORY_LIMIT)
        );
        assert_eq!("history 3".parse::<Command>().unwrap(), Command::History(3));
        assert!("history lots".parse::<Command>().is_err());
        assert_eq!("goal 6".parse::<Command>().unwrap(), Command::Goal(6));
        assert_eq!(
            "set backgroundSound brown noise".parse::<Command>().unwrap(),
            Command::Set {
                field: "backgroundSound".into(),
                value: "brown noise".into()
            }
        );
        assert!("set focusMinutes".parse::<Command>().is_err());
        assert!("".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }

    #[test]
    fn applies_single_settings() {
        let mut settings = TimerSettings::default();
        apply_setting(&mut settings, "focusMinutes", "50").unwrap();
        apply_setting(&mut settings, "interval", "3").unwrap();
        apply_setting(&mut settings, "autoStartBreaks", "on").unwrap();
        apply_setting(&mut settings, "backgroundSound", "rain").unwrap();

        assert_eq!(settings.focus_minutes, 50);
        assert_eq!(settings.long_break_interval, 3);
        assert!(settings.auto_start_breaks);
        assert_eq!(settings.background_sound, "rain");

        assert!(apply_setting(&mut settings, "focusMinutes", "-1").is_err());
        assert!(apply_setting(&mut settings, "autoStartFocus", "maybe").is_err());
        assert!(apply_setting(&mut settings, "theme", "dark").is_err());
    }

    #[test]
    fn describes_snapshot() {
        let snapshot = TimerSnapshot {
            status: TimerStatus::Running,
            mode: TimerMode::ShortBreak,
            remaining_secs: 299,
            duration_secs: 300,
            completed_cycles: 1,
            cycle_position: 1,
            long_break_interval: 4,
            session_id: None,
        };
        assert_eq!(
            describe(&snapshot),
            "short break running 04:59  cycle 1/4  (1 done)"
        );
    }

    #[test]
    fn renders_background_events() {
        let tick = |remaining_secs| TimerEvent::Tick {
            mode: TimerMode::Focus,
            remaining_secs,
        };
        assert_eq!(render_event(&tick(1_440)).as_deref(), Some("focus 24:00"));
        assert_eq!(render_event(&tick(1_439)), None);

        let finished = TimerEvent::IntervalFinished {
            finished: TimerMode::Focus,
            next: TimerMode::LongBreak,
            skipped: false,
            auto_start: true,
        };
        assert_eq!(
            render_event(&finished).as_deref(),
            Some("focus finished; next up: long break (starting)")
        );

        let failure = TimerEvent::Notification {
            level: NoticeLevel::Error,
            message: "offline".into(),
        };
        assert_eq!(render_event(&failure).as_deref(), Some("error: offline"));
    }

    #[tokio::test(start_paused = true)]
    async fn executes_against_controller() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(LocalStorage::open(dir.path().to_path_buf()).unwrap());
        let controller = TimerController::new(
            MemorySessions::new(),
            "tester",
            Arc::new(store),
            Arc::new(SilentPlayer),
        );

        let reply = execute(&controller, "set focus 30".parse().unwrap())
            .await
            .unwrap();
        assert_eq!(
            reply,
            Reply::Text("focus idle 30:00  cycle 0/4  (0 done)".into())
        );

        execute(&controller, Command::Start).await.unwrap();
        let err = execute(&controller, "mode long".parse().unwrap())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("confirm"));

        execute(&controller, Command::Skip).await.unwrap();
        controller.flush().await;
        let Reply::Text(history) = execute(&controller, Command::History(5)).await.unwrap() else {
            panic!("history should print");
        };
        assert!(history.contains("completed"));

        assert!(execute(&controller, Command::Goal(0)).await.is_err());
        assert_eq!(execute(&controller, Command::Quit).await.unwrap(), Reply::Quit);
    }
}
