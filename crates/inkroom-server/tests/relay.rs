//! End-to-end tests against a relay server on an ephemeral port.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use inkroom_core::presence::{PARTICIPANT_COLORS, PARTICIPANT_NAMES};
use inkroom_core::{ClientMessage, Point, ServerMessage, Snapshot, Stroke, Timeline, Tool};
use inkroom_server::ServerConfig;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(inkroom_server::serve_listener(listener, ServerConfig::default()));
    addr
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    client
}

async fn send(client: &mut Client, message: &ClientMessage) {
    client
        .send(Message::text(message.to_json().unwrap()))
        .await
        .unwrap();
}

async fn send_raw(client: &mut Client, text: &str) {
    client.send(Message::text(text.to_string())).await.unwrap();
}

async fn recv(client: &mut Client) -> ServerMessage {
    loop {
        let frame = timeout(RECV_TIMEOUT, client.next())
            .await
            .expect("timed out waiting for server message")
            .expect("connection closed")
            .unwrap();
        if let Message::Text(text) = frame {
            return ServerMessage::from_json(text.as_str()).unwrap();
        }
    }
}

fn join(room: &str) -> ClientMessage {
    ClientMessage::JoinRoom {
        room_id: room.to_string(),
    }
}

fn one_stroke_timeline() -> Timeline {
    let mut timeline = Timeline::new();
    timeline.push_edit(|s: &mut Snapshot| {
        let mut stroke = Stroke::new(Point::new(10.0, 10.0), Tool::Pen, "#000000");
        stroke.add_point(Point::new(20.0, 25.0));
        s.strokes.push(stroke);
    });
    timeline
}

fn history_change(room: &str, timeline: Timeline) -> ClientMessage {
    ClientMessage::HistoryChange {
        room_id: room.to_string(),
        timeline,
    }
}

#[tokio::test]
async fn test_join_and_draw_scenario() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;

    send(&mut a, &join("abc")).await;
    assert_eq!(
        recv(&mut a).await,
        ServerMessage::LoadInitialData {
            timeline: Timeline::new()
        }
    );
    send(&mut b, &join("abc")).await;
    recv(&mut b).await;

    let drawn = one_stroke_timeline();
    send(&mut a, &history_change("abc", drawn.clone())).await;

    let expected = ServerMessage::HistoryUpdated { timeline: drawn };
    assert_eq!(recv(&mut a).await, expected);
    assert_eq!(recv(&mut b).await, expected);
}

#[tokio::test]
async fn test_cursor_reaches_others_but_not_sender() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send(&mut a, &join("abc")).await;
    recv(&mut a).await;
    send(&mut b, &join("abc")).await;
    recv(&mut b).await;

    send(
        &mut a,
        &ClientMessage::CursorMove {
            room_id: "abc".to_string(),
            x: 3.5,
            y: 4.5,
        },
    )
    .await;

    match recv(&mut b).await {
        ServerMessage::CursorMove(event) => {
            assert_eq!((event.x, event.y), (3.5, 4.5));
            assert!(PARTICIPANT_NAMES.contains(&event.display_name.as_str()));
            assert!(PARTICIPANT_COLORS.contains(&event.display_color.as_str()));
        }
        other => panic!("Wrong message type: {other:?}"),
    }

    // Events are processed in order, so A's next message being the history
    // update proves the cursor was never echoed back.
    send(&mut a, &history_change("abc", one_stroke_timeline())).await;
    assert!(matches!(recv(&mut a).await, ServerMessage::HistoryUpdated { .. }));
}

#[tokio::test]
async fn test_invalid_input_is_dropped_silently() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send(&mut b, &join("abc")).await;
    recv(&mut b).await;

    send_raw(&mut a, "not json").await;
    send_raw(&mut a, r#"{"type":"shout","roomId":"abc"}"#).await;
    // Not joined: cursor dropped. Unknown room: edit dropped.
    send(
        &mut a,
        &ClientMessage::CursorMove {
            room_id: "abc".to_string(),
            x: 1.0,
            y: 1.0,
        },
    )
    .await;
    send(&mut a, &history_change("nowhere", one_stroke_timeline())).await;

    // The connection stays usable.
    send(&mut a, &join("nowhere")).await;
    assert_eq!(
        recv(&mut a).await,
        ServerMessage::LoadInitialData {
            timeline: Timeline::new()
        }
    );

    // B saw none of it.
    send(&mut b, &history_change("abc", Timeline::new())).await;
    assert!(matches!(recv(&mut b).await, ServerMessage::HistoryUpdated { .. }));
}

#[tokio::test]
async fn test_history_survives_disconnect() {
    let addr = start_server().await;
    let mut a = connect(addr).await;
    send(&mut a, &join("abc")).await;
    recv(&mut a).await;

    let drawn = one_stroke_timeline();
    send(&mut a, &history_change("abc", drawn.clone())).await;
    recv(&mut a).await;
    a.close(None).await.unwrap();

    let mut c = connect(addr).await;
    send(&mut c, &join("abc")).await;
    assert_eq!(
        recv(&mut c).await,
        ServerMessage::LoadInitialData { timeline: drawn }
    );
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_server().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();

    let mut response = String::new();
    timeout(RECV_TIMEOUT, stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}
