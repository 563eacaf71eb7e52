use std::thread;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::core::{Error, GpsStatus, Result};
use crate::protocol::StatusSnapshot;
use crate::transport::Transport;
use super::client::{MessagePayload, SendReceipt, TileClient};

/// Requests queued for the session worker
enum Request {
    FirmwareVersion(oneshot::Sender<Result<String>>),
    GpsTime(oneshot::Sender<Result<Option<DateTime<Utc>>>>),
    GpsStats(oneshot::Sender<Result<GpsStatus>>),
    MessageCount {
        unread_only: bool,
        reply: oneshot::Sender<Result<u32>>,
    },
    SendMessage {
        payload: MessagePayload,
        application_id: Option<u16>,
        reply: oneshot::Sender<Result<SendReceipt>>,
    },
    PollStatus {
        window: Duration,
        reply: oneshot::Sender<Result<StatusSnapshot>>,
    },
}

/// Cloneable async front for one [`TileClient`].
///
/// A dedicated thread owns the client and runs one request at a time, so
/// concurrent callers never interleave commands on the wire. The thread
/// exits once every handle is dropped.
#[derive(Clone)]
pub struct TileHandle {
    tx: mpsc::Sender<Request>,
}

impl TileHandle {
    /// Moves the client onto a worker thread
    pub fn spawn<T: Transport + 'static>(client: TileClient<T>) -> Result<Self> {
        let (tx, rx) = mpsc::channel(16);
        thread::Builder::new()
            .name("tile-session".to_string())
            .spawn(move || run(client, rx))?;
        Ok(TileHandle { tx })
    }

    pub async fn firmware_version(&self) -> Result<String> {
        self.call(Request::FirmwareVersion).await
    }

    pub async fn gps_time(&self) -> Result<Option<DateTime<Utc>>> {
        self.call(Request::GpsTime).await
    }

    pub async fn gps_stats(&self) -> Result<GpsStatus> {
        self.call(Request::GpsStats).await
    }

    pub async fn message_count(&self, unread_only: bool) -> Result<u32> {
        self.call(|reply| Request::MessageCount { unread_only, reply }).await
    }

    pub async fn send_message(
        &self,
        payload: MessagePayload,
        application_id: Option<u16>,
    ) -> Result<SendReceipt> {
        self.call(|reply| Request::SendMessage {
            payload,
            application_id,
            reply,
        })
        .await
    }

    pub async fn poll_status(&self, window: Duration) -> Result<StatusSnapshot> {
        self.call(|reply| Request::PollStatus { window, reply }).await
    }

    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<Result<R>>) -> Request,
    ) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::Disconnected)?;
        response.await.map_err(|_| Error::Disconnected)?
    }
}

fn run<T: Transport>(mut client: TileClient<T>, mut rx: mpsc::Receiver<Request>) {
    while let Some(request) = rx.blocking_recv() {
        // A dropped receiver only means the caller stopped waiting
        match request {
            Request::FirmwareVersion(reply) => {
                let _ = reply.send(client.get_firmware_version());
            }
            Request::GpsTime(reply) => {
                let _ = reply.send(client.get_gps_time());
            }
            Request::GpsStats(reply) => {
                let _ = reply.send(client.get_gps_stats());
            }
            Request::MessageCount { unread_only, reply } => {
                let _ = reply.send(client.get_message_count(unread_only));
            }
            Request::SendMessage {
                payload,
                application_id,
                reply,
            } => {
                let _ = reply.send(client.send_message(&payload, application_id));
            }
            Request::PollStatus { window, reply } => {
                let _ = reply.send(client.poll_status(window));
            }
        }
    }
    debug!("Tile session worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SessionConfig;
    use crate::session::{ManualClock, Session};
    use crate::transport::mock::ScriptedTransport;
    use tokio_test::{assert_err, assert_ok};

    fn spawn(transport: &ScriptedTransport) -> TileHandle {
        let clock = ManualClock::new();
        let session = Session::new(transport.clone().with_clock(clock.clone()), SessionConfig::default())
            .with_clock(clock);
        TileHandle::spawn(TileClient::new(session)).unwrap()
    }

    #[tokio::test]
    async fn test_handle_round_trip() {
        let transport = ScriptedTransport::new()
            .reply("$FV", &["$FV 2021-07-16-00:28:12,v1.0.0*7E"])
            .reply("$MM C=U", &["$MM 7*17"]);
        let handle = spawn(&transport);

        let version = assert_ok!(handle.firmware_version().await);
        assert_eq!(version, "2021-07-16-00:28:12,v1.0.0");
        let count = assert_ok!(handle.message_count(true).await);
        assert_eq!(count, 7);
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let transport = ScriptedTransport::new()
            .reply("$FV", &["$FV 2021-07-16-00:28:12,v1.0.0*7E"])
            .reply("$MM C=*", &["$MM 12*23"]);
        let handle = spawn(&transport);
        let other = handle.clone();

        let (version, count) = tokio::join!(handle.firmware_version(), other.message_count(false));
        assert_ok!(version);
        assert_eq!(assert_ok!(count), 12);

        let written = transport.written();
        assert_eq!(written.len(), 2);
        assert!(written.contains(&"$FV*10".to_string()));
        assert!(written.contains(&"$MM C=**74".to_string()));
    }

    #[tokio::test]
    async fn test_errors_cross_the_boundary() {
        let transport = ScriptedTransport::new().reply("$TD", &["$TD ERR,BADDATA*0E"]);
        let handle = spawn(&transport);

        let result = handle
            .send_message(MessagePayload::Text("Hello".into()), None)
            .await;
        let err = assert_err!(result);
        assert!(matches!(err, Error::Rejected(_)));
    }
}
