//! obs-websocket v5 클라이언트.
//!
//! `tokio-tungstenite` 기반. 연결 직후 Hello → Identify → Identified 핸드셰이크를 거치고,
//! 이후 수신 태스크가 요청 응답은 요청 ID별 대기자에게, 이벤트는 broadcast 채널로 보낸다.

use async_trait::async_trait;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use obslink_core::cancel::CancelToken;
use obslink_core::error::CoreError;
use obslink_core::models::output::{FilterInfo, RecordStatus, StreamStats, VersionInfo};
use obslink_core::ports::remote::{FilterControl, OutputControl};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use url::Url;

use crate::protocol::{
    auth_response, op, subscription, Envelope, Hello, Identified, Identify, ObsEvent, RawEvent,
    Request, RequestResponse, CLOSE_AUTHENTICATION_FAILED, RPC_VERSION,
};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Mutex<HashMap<String, oneshot::Sender<RequestResponse>>>;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// 수립된 연결 하나
struct Connection {
    write: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: Arc<PendingMap>,
    closed: CancelToken,
}

impl Connection {
    async fn send_text(&self, text: String) -> Result<(), CoreError> {
        let mut write = self.write.lock().await;
        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| CoreError::Network(format!("WebSocket 전송 실패: {e}")))
    }
}

/// obs-websocket 클라이언트
pub struct ObsClient {
    connection: RwLock<Option<Arc<Connection>>>,
    events: broadcast::Sender<ObsEvent>,
    next_id: AtomicU64,
    request_timeout: Duration,
}

impl ObsClient {
    pub fn new(request_timeout: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            connection: RwLock::new(None),
            events,
            next_id: AtomicU64::new(1),
            request_timeout,
        }
    }

    /// 이벤트 구독
    pub fn subscribe(&self) -> broadcast::Receiver<ObsEvent> {
        self.events.subscribe()
    }

    /// 연결이 살아 있는지
    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    fn current(&self) -> Option<Arc<Connection>> {
        self.connection
            .read()
            .as_ref()
            .filter(|conn| !conn.closed.is_cancelled())
            .cloned()
    }

    /// 연결 수립 및 인증.
    ///
    /// 인증 거부(close 4009)는 `CoreError::Auth`, 그 밖의 실패는 `CoreError::Network`.
    /// 기존 연결이 있으면 먼저 끊는다.
    pub async fn connect(&self, address: &str, password: &str) -> Result<Hello, CoreError> {
        let url = Url::parse(address)
            .map_err(|e| CoreError::Config(format!("잘못된 주소 {address}: {e}")))?;
        if !matches!(url.scheme(), "ws" | "wss") {
            return Err(CoreError::Config(format!(
                "ws:// 또는 wss:// 주소가 필요합니다: {address}"
            )));
        }

        self.disconnect().await;
        info!("obs-websocket 연결: {url}");

        let (mut ws, _) =
            tokio::time::timeout(self.request_timeout, tokio_tungstenite::connect_async(url.as_str()))
                .await
                .map_err(|_| CoreError::Network(format!("연결 시간 초과: {address}")))?
                .map_err(|e| CoreError::Network(format!("WebSocket 연결 실패: {e}")))?;

        let hello = tokio::time::timeout(self.request_timeout, handshake(&mut ws, password))
            .await
            .map_err(|_| CoreError::Network("핸드셰이크 시간 초과".to_string()))??;

        let (write, read) = StreamExt::split(ws);
        let conn = Arc::new(Connection {
            write: tokio::sync::Mutex::new(write),
            pending: Arc::new(Mutex::new(HashMap::new())),
            closed: CancelToken::new(),
        });

        tokio::spawn(read_loop(
            read,
            conn.pending.clone(),
            self.events.clone(),
            conn.closed.clone(),
        ));
        *self.connection.write() = Some(conn);

        info!(
            websocket_version = %hello.obs_web_socket_version,
            "obs-websocket 인증 완료"
        );
        Ok(hello)
    }

    /// 연결 종료. 대기 중인 요청은 모두 실패한다.
    pub async fn disconnect(&self) {
        let taken = self.connection.write().take();
        let Some(conn) = taken else {
            return;
        };
        if !conn.closed.is_cancelled() {
            let mut write = conn.write.lock().await;
            if let Err(e) = write.send(Message::Close(None)).await {
                debug!("close 프레임 전송 실패: {e}");
            }
        }
        conn.closed.cancel();
        conn.pending.lock().clear();
        info!("obs-websocket 연결 해제");
    }

    /// 요청 하나를 보내고 응답 데이터를 기다린다
    pub async fn request(
        &self,
        request_type: &str,
        request_data: Option<Value>,
    ) -> Result<Value, CoreError> {
        let conn = self.current().ok_or(CoreError::NotConnected)?;
        let request_id = self.next_id.fetch_add(1, Ordering::Relaxed).to_string();
        let text = Envelope::encode(
            op::REQUEST,
            &Request {
                request_type,
                request_id: request_id.clone(),
                request_data,
            },
        )?;

        let (tx, rx) = oneshot::channel();
        conn.pending.lock().insert(request_id.clone(), tx);
        if conn.closed.is_cancelled() {
            conn.pending.lock().remove(&request_id);
            return Err(CoreError::NotConnected);
        }

        if let Err(e) = conn.send_text(text).await {
            conn.pending.lock().remove(&request_id);
            return Err(e);
        }
        debug!(request_type, request_id = %request_id, "요청 전송");

        match tokio::time::timeout(self.request_timeout, rx).await {
            Ok(Ok(response)) => response.into_result(),
            Ok(Err(_)) => Err(CoreError::Network(format!(
                "{request_type} 응답 전에 연결 종료"
            ))),
            Err(_) => {
                conn.pending.lock().remove(&request_id);
                Err(CoreError::Network(format!("{request_type} 응답 시간 초과")))
            }
        }
    }

    /// 원격 버전 조회
    pub async fn get_version(&self) -> Result<VersionInfo, CoreError> {
        let data = self.request("GetVersion", None).await?;
        Ok(VersionInfo {
            obs_version: str_field(&data, "obsVersion"),
            websocket_version: str_field(&data, "obsWebSocketVersion"),
            rpc_version: data.get("rpcVersion").and_then(Value::as_u64).unwrap_or(0) as u32,
        })
    }
}

/// Hello 수신, Identify 전송, Identified 대기
async fn handshake(ws: &mut WsStream, password: &str) -> Result<Hello, CoreError> {
    let hello: Hello = next_envelope(ws, op::HELLO).await?.payload()?;
    let authentication = hello
        .authentication
        .as_ref()
        .map(|challenge| auth_response(password, challenge));

    let identify = Envelope::encode(
        op::IDENTIFY,
        &Identify {
            rpc_version: RPC_VERSION,
            authentication,
            event_subscriptions: subscription::GENERAL | subscription::OUTPUTS,
        },
    )?;
    ws.send(Message::Text(identify.into()))
        .await
        .map_err(|e| CoreError::Network(format!("Identify 전송 실패: {e}")))?;

    let identified: Identified = next_envelope(ws, op::IDENTIFIED).await?.payload()?;
    debug!(rpc_version = identified.negotiated_rpc_version, "Identified 수신");
    Ok(hello)
}

async fn next_envelope(ws: &mut WsStream, expected: u8) -> Result<Envelope, CoreError> {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => {
                let envelope: Envelope = serde_json::from_str(text.as_str())?;
                if envelope.op == expected {
                    return Ok(envelope);
                }
                debug!(op = envelope.op, expected, "핸드셰이크 중 다른 메시지 무시");
            }
            Some(Ok(Message::Close(frame))) => return Err(close_error(frame)),
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(CoreError::Network(format!("핸드셰이크 수신 실패: {e}"))),
            None => return Err(CoreError::Network("핸드셰이크 중 연결 종료".to_string())),
        }
    }
}

fn close_error(frame: Option<CloseFrame>) -> CoreError {
    match frame {
        Some(frame) if u16::from(frame.code) == CLOSE_AUTHENTICATION_FAILED => {
            CoreError::Auth(frame.reason.as_str().to_string())
        }
        Some(frame) => CoreError::Network(format!(
            "연결 종료 (code {}): {}",
            u16::from(frame.code),
            frame.reason.as_str()
        )),
        None => CoreError::Network("연결 종료".to_string()),
    }
}

/// 수신 루프
async fn read_loop(
    mut read: SplitStream<WsStream>,
    pending: Arc<PendingMap>,
    events: broadcast::Sender<ObsEvent>,
    closed: CancelToken,
) {
    loop {
        let msg = tokio::select! {
            _ = closed.cancelled() => break,
            msg = read.next() => msg,
        };
        match msg {
            Some(Ok(Message::Text(text))) => dispatch(text.as_str(), &pending, &events),
            Some(Ok(Message::Close(frame))) => {
                info!("원격이 연결을 닫음: {}", close_error(frame));
                break;
            }
            Some(Ok(_)) => {} // Ping/Pong은 자동 처리
            Some(Err(e)) => {
                warn!("WebSocket 수신 에러: {e}");
                break;
            }
            None => break,
        }
    }
    closed.cancel();
    pending.lock().clear();
    let _ = events.send(ObsEvent::ConnectionClosed);
    debug!("WebSocket 수신 루프 종료");
}

fn dispatch(text: &str, pending: &PendingMap, events: &broadcast::Sender<ObsEvent>) {
    let envelope: Envelope = match serde_json::from_str(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("잘못된 메시지: {e}");
            return;
        }
    };
    match envelope.op {
        op::REQUEST_RESPONSE => match envelope.payload::<RequestResponse>() {
            Ok(response) => match pending.lock().remove(&response.request_id) {
                Some(tx) => {
                    let _ = tx.send(response);
                }
                None => debug!(request_id = %response.request_id, "대기자가 없는 응답"),
            },
            Err(e) => warn!("응답 해석 실패: {e}"),
        },
        op::EVENT => match envelope.payload::<RawEvent>() {
            Ok(raw) => {
                // 구독자가 없으면 버린다
                let _ = events.send(ObsEvent::from(raw));
            }
            Err(e) => warn!("이벤트 해석 실패: {e}"),
        },
        other => debug!(op = other, "처리하지 않는 opcode"),
    }
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn u64_field(data: &Value, key: &str) -> u64 {
    data.get(key).and_then(Value::as_u64).unwrap_or(0)
}

fn bool_field(data: &Value, key: &str) -> bool {
    data.get(key).and_then(Value::as_bool).unwrap_or(false)
}

#[async_trait]
impl FilterControl for ObsClient {
    async fn get_filter(&self, source: &str, name: &str) -> Result<Option<FilterInfo>, CoreError> {
        let request = json!({ "sourceName": source, "filterName": name });
        match self.request("GetSourceFilter", Some(request)).await {
            Ok(data) => Ok(Some(FilterInfo {
                name: name.to_string(),
                kind: str_field(&data, "filterKind"),
                enabled: bool_field(&data, "filterEnabled"),
                settings: data.get("filterSettings").cloned().unwrap_or(Value::Null),
            })),
            Err(e) if e.is_not_found() && !e.is_missing_source() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_filter(
        &self,
        source: &str,
        name: &str,
        kind: &str,
        settings: Value,
    ) -> Result<(), CoreError> {
        let request = json!({
            "sourceName": source,
            "filterName": name,
            "filterKind": kind,
            "filterSettings": settings,
        });
        self.request("CreateSourceFilter", Some(request)).await?;
        Ok(())
    }

    async fn set_filter_settings(
        &self,
        source: &str,
        name: &str,
        settings: Value,
    ) -> Result<(), CoreError> {
        let request = json!({
            "sourceName": source,
            "filterName": name,
            "filterSettings": settings,
            "overlay": true,
        });
        self.request("SetSourceFilterSettings", Some(request)).await?;
        Ok(())
    }

    async fn set_filter_enabled(&self, source: &str, name: &str, enabled: bool) -> Result<(), CoreError> {
        let request = json!({
            "sourceName": source,
            "filterName": name,
            "filterEnabled": enabled,
        });
        self.request("SetSourceFilterEnabled", Some(request)).await?;
        Ok(())
    }

    async fn remove_filter(&self, source: &str, name: &str) -> Result<bool, CoreError> {
        let request = json!({ "sourceName": source, "filterName": name });
        match self.request("RemoveSourceFilter", Some(request)).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() && !e.is_missing_source() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[async_trait]
impl OutputControl for ObsClient {
    async fn get_record_directory(&self) -> Result<String, CoreError> {
        let data = self.request("GetRecordDirectory", None).await?;
        Ok(str_field(&data, "recordDirectory"))
    }

    async fn set_record_directory(&self, dir: &str) -> Result<(), CoreError> {
        self.request("SetRecordDirectory", Some(json!({ "recordDirectory": dir })))
            .await?;
        Ok(())
    }

    async fn set_filename_format(&self, format: &str) -> Result<(), CoreError> {
        let request = json!({
            "parameterCategory": "Output",
            "parameterName": "FilenameFormatting",
            "parameterValue": format,
        });
        self.request("SetProfileParameter", Some(request)).await?;
        Ok(())
    }

    async fn start_record(&self) -> Result<(), CoreError> {
        self.request("StartRecord", None).await?;
        Ok(())
    }

    async fn stop_record(&self) -> Result<Option<String>, CoreError> {
        let data = self.request("StopRecord", None).await?;
        Ok(data
            .get("outputPath")
            .and_then(Value::as_str)
            .map(str::to_string))
    }

    async fn toggle_record(&self) -> Result<(), CoreError> {
        self.request("ToggleRecord", None).await?;
        Ok(())
    }

    async fn record_status(&self) -> Result<RecordStatus, CoreError> {
        let data = self.request("GetRecordStatus", None).await?;
        Ok(RecordStatus {
            active: bool_field(&data, "outputActive"),
            paused: bool_field(&data, "outputPaused"),
            timecode: str_field(&data, "outputTimecode"),
            bytes: u64_field(&data, "outputBytes"),
        })
    }

    async fn start_replay_buffer(&self) -> Result<(), CoreError> {
        self.request("StartReplayBuffer", None).await?;
        Ok(())
    }

    async fn stop_replay_buffer(&self) -> Result<(), CoreError> {
        self.request("StopReplayBuffer", None).await?;
        Ok(())
    }

    async fn save_replay_buffer(&self) -> Result<(), CoreError> {
        self.request("SaveReplayBuffer", None).await?;
        Ok(())
    }

    async fn replay_buffer_active(&self) -> Result<bool, CoreError> {
        let data = self.request("GetReplayBufferStatus", None).await?;
        Ok(bool_field(&data, "outputActive"))
    }

    async fn start_stream(&self) -> Result<(), CoreError> {
        self.request("StartStream", None).await?;
        Ok(())
    }

    async fn stop_stream(&self) -> Result<(), CoreError> {
        self.request("StopStream", None).await?;
        Ok(())
    }

    async fn toggle_stream(&self) -> Result<(), CoreError> {
        self.request("ToggleStream", None).await?;
        Ok(())
    }

    async fn stream_status(&self) -> Result<StreamStats, CoreError> {
        let data = self.request("GetStreamStatus", None).await?;
        Ok(StreamStats {
            active: bool_field(&data, "outputActive"),
            reconnecting: bool_field(&data, "outputReconnecting"),
            timecode: str_field(&data, "outputTimecode"),
            bytes: u64_field(&data, "outputBytes"),
            skipped_frames: u64_field(&data, "outputSkippedFrames"),
            total_frames: u64_field(&data, "outputTotalFrames"),
        })
    }

    async fn set_current_scene(&self, scene: &str) -> Result<(), CoreError> {
        self.request("SetCurrentProgramScene", Some(json!({ "sceneName": scene })))
            .await?;
        Ok(())
    }

    async fn set_input_mute(&self, input: &str, muted: bool) -> Result<(), CoreError> {
        let request = json!({ "inputName": input, "inputMuted": muted });
        self.request("SetInputMute", Some(request)).await?;
        Ok(())
    }
}
