//! Integration tests for the WebSocket transport.
//!
//! Each test binds a real listener on an OS-assigned port and talks to it
//! with a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use clashroom_transport::{
        Connection, PendingConnection, Transport, TransportError, WebSocketConnection,
        WebSocketTransport,
    };
    use tokio::net::TcpStream;
    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;

    type Client = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    /// Binds on port 0, connects one client, and returns both ends.
    async fn connected_pair() -> (WebSocketConnection, Client) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let server = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.establish().await.expect("handshake should complete")
        });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_websocket_send_receive_both_directions() {
        let (conn, mut client) = connected_pair().await;
        assert!(conn.id().into_inner() > 0);

        conn.send(br#"{"event":"update"}"#).await.expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "UTF-8 payloads are sent as text frames");
        assert_eq!(msg.into_data().as_ref(), br#"{"event":"update"}"#);

        client
            .send(Message::text(r#"{"event":"create_room"}"#.to_string()))
            .await
            .unwrap();
        let received = conn.recv().await.expect("recv").expect("data");
        assert_eq!(received, br#"{"event":"create_room"}"#);

        conn.close().await.expect("close");
    }

    #[tokio::test]
    async fn test_websocket_non_utf8_sent_as_binary() {
        let (conn, mut client) = connected_pair().await;

        conn.send(&[0xff, 0x00, 0xfe]).await.expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_websocket_send_not_blocked_by_pending_recv() {
        let (conn, mut client) = connected_pair().await;
        let conn = std::sync::Arc::new(conn);

        // Park a reader on the connection; the client sends nothing.
        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::task::yield_now().await;

        tokio::time::timeout(Duration::from_secs(2), conn.send(b"tick"))
            .await
            .expect("send must not wait for recv")
            .expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"tick");

        client.send(Message::Close(None)).await.unwrap();
        let received = reader.await.unwrap().expect("recv should not error");
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_websocket_recv_returns_none_on_client_close() {
        let (conn, mut client) = connected_pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_websocket_accept_returns_before_handshake() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        // A bare TCP socket that never sends the HTTP upgrade.
        let _idle = TcpStream::connect(addr).await.expect("tcp connect");

        let pending = tokio::time::timeout(Duration::from_secs(2), transport.accept())
            .await
            .expect("accept must not wait for the handshake")
            .expect("should accept");
        assert_eq!(pending.peer_addr().ip(), addr.ip());
    }

    #[tokio::test]
    async fn test_websocket_idle_peer_handshake_times_out() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind")
            .with_handshake_timeout(Duration::from_millis(100));
        let addr = transport.local_addr().expect("bound address");

        let _idle = TcpStream::connect(addr).await.expect("tcp connect");
        let pending = transport.accept().await.expect("should accept");

        let result = tokio::time::timeout(Duration::from_secs(2), pending.establish())
            .await
            .expect("establish must give up on its own");
        assert!(matches!(result, Err(TransportError::HandshakeTimeout(_))));
    }

    #[tokio::test]
    async fn test_websocket_idle_peer_does_not_block_next_client() {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address");

        let _idle = TcpStream::connect(addr).await.expect("tcp connect");
        let stalled = transport.accept().await.expect("should accept idle socket");
        let stalled = tokio::spawn(stalled.establish());

        let server = tokio::spawn(async move {
            let pending = transport.accept().await.expect("should accept");
            pending.establish().await.expect("handshake should complete")
        });
        let (_client, _) = tokio::time::timeout(
            Duration::from_secs(2),
            tokio_tungstenite::connect_async(format!("ws://{addr}")),
        )
        .await
        .expect("second client must connect while the first is idle")
        .expect("client should connect");

        let conn = server.await.expect("accept task");
        assert!(conn.peer_addr().ip().is_loopback());
        stalled.abort();
    }
}
