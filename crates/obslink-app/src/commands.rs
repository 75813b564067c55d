//! 운영자 명령.
//!
//! 한 줄에 명령 하나. 예: `on`, `update`, `record start`, `scene Main Scene`, `mute Mic/Aux`.

use obslink_core::error::CoreError;
use std::fmt;
use std::str::FromStr;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// 출력(녹화/스트림) 제어 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputAction {
    Start,
    Stop,
    Toggle,
}

/// 리플레이 버퍼 제어 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayAction {
    Start,
    Stop,
    Save,
}

/// 운영자 명령
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// 오버레이 동기화 켜기
    On,
    /// 오버레이 동기화 끄기
    Off,
    Toggle,
    /// 수동 UI 동기화 한 번
    Update,
    Connect,
    Disconnect,
    Status,
    Record(OutputAction),
    Stream(OutputAction),
    Replay(ReplayAction),
    Scene(String),
    Mute(String),
    Unmute(String),
}

impl FromStr for Command {
    type Err = CoreError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };
        let invalid = |message: &str| CoreError::Validation {
            field: "command".to_string(),
            message: format!("{message}: {line}"),
        };

        let output_action = |arg: &str| match arg {
            "start" => Ok(OutputAction::Start),
            "stop" => Ok(OutputAction::Stop),
            "toggle" => Ok(OutputAction::Toggle),
            _ => Err(invalid("start|stop|toggle 중 하나가 필요합니다")),
        };
        let named = |arg: &str| {
            if arg.is_empty() {
                Err(invalid("이름이 필요합니다"))
            } else {
                Ok(arg.to_string())
            }
        };

        match verb.to_ascii_lowercase().as_str() {
            "on" => Ok(Command::On),
            "off" => Ok(Command::Off),
            "toggle" => Ok(Command::Toggle),
            "update" => Ok(Command::Update),
            "connect" => Ok(Command::Connect),
            "disconnect" => Ok(Command::Disconnect),
            "status" => Ok(Command::Status),
            "record" => output_action(arg).map(Command::Record),
            "stream" => output_action(arg).map(Command::Stream),
            "replay" => match arg {
                "start" => Ok(Command::Replay(ReplayAction::Start)),
                "stop" => Ok(Command::Replay(ReplayAction::Stop)),
                "save" => Ok(Command::Replay(ReplayAction::Save)),
                _ => Err(invalid("start|stop|save 중 하나가 필요합니다")),
            },
            "scene" => named(arg).map(Command::Scene),
            "mute" => named(arg).map(Command::Mute),
            "unmute" => named(arg).map(Command::Unmute),
            _ => Err(invalid("알 수 없는 명령")),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::On => write!(f, "on"),
            Command::Off => write!(f, "off"),
            Command::Toggle => write!(f, "toggle"),
            Command::Update => write!(f, "update"),
            Command::Connect => write!(f, "connect"),
            Command::Disconnect => write!(f, "disconnect"),
            Command::Status => write!(f, "status"),
            Command::Record(action) => write!(f, "record {action:?}"),
            Command::Stream(action) => write!(f, "stream {action:?}"),
            Command::Replay(action) => write!(f, "replay {action:?}"),
            Command::Scene(name) => write!(f, "scene {name}"),
            Command::Mute(name) => write!(f, "mute {name}"),
            Command::Unmute(name) => write!(f, "unmute {name}"),
        }
    }
}

/// stdin 줄을 명령으로 읽어 보낸다. EOF 또는 수신자 종료 시 끝난다.
pub async fn read_stdin(tx: mpsc::Sender<Command>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                warn!("stdin 읽기 실패: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<Command>() {
            Ok(command) => {
                if tx.send(command).await.is_err() {
                    break;
                }
            }
            Err(e) => warn!("{e}"),
        }
    }
    debug!("stdin 명령 수신 종료");
}
