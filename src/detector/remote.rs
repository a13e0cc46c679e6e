//! 外部検出器プロセスへのTCPクライアント
//!
//! フレームループは同期なので、tokioランタイムは専用スレッドに閉じ込め、
//! チャネルで橋渡しする。送信は一方通行、結果は届いた順に取り出す。

use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc as tokio_mpsc;

use super::protocol::{self, ClientMessage, ServerMessage};
use super::{DetectorOptions, HolisticDetector};
use crate::camera::FrameImage;
use crate::landmark::HolisticResult;

const READY_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteDetector {
    outgoing: tokio_mpsc::UnboundedSender<ClientMessage>,
    incoming: std_mpsc::Receiver<ServerMessage>,
    io_thread: Option<thread::JoinHandle<()>>,
    ready: bool,
}

impl RemoteDetector {
    /// 検出器サーバへ接続する。接続確立までブロックし、
    /// 以降のI/Oはバックグラウンドスレッドで行う。
    pub fn connect(addr: &str) -> Result<Self> {
        let (outgoing_tx, outgoing_rx) = tokio_mpsc::unbounded_channel();
        let (incoming_tx, incoming_rx) = std_mpsc::channel();
        let (connect_tx, connect_rx) = std_mpsc::channel();

        let addr = addr.to_string();
        let io_thread = thread::spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = connect_tx.send(Err(anyhow::anyhow!("tokio runtime: {e}")));
                    return;
                }
            };
            runtime.block_on(async move {
                let stream = match TcpStream::connect(&addr).await {
                    Ok(s) => {
                        let _ = connect_tx.send(Ok(()));
                        s
                    }
                    Err(e) => {
                        let _ = connect_tx
                            .send(Err(anyhow::anyhow!("connect to detector {addr}: {e}")));
                        return;
                    }
                };
                if let Err(e) = io_task(stream, outgoing_rx, incoming_tx).await {
                    eprintln!("[detector] connection lost: {e:#}");
                }
            });
        });

        connect_rx
            .recv_timeout(READY_TIMEOUT)
            .context("detector connection timed out")??;

        Ok(Self {
            outgoing: outgoing_tx,
            incoming: incoming_rx,
            io_thread: Some(io_thread),
            ready: false,
        })
    }

    fn push(&self, msg: ClientMessage) -> Result<()> {
        if self.outgoing.send(msg).is_err() {
            bail!("detector connection closed");
        }
        Ok(())
    }
}

/// 接続1本分のI/Oループ。送信キューと受信ストリームを同時に待つ。
async fn io_task(
    stream: TcpStream,
    mut outgoing: tokio_mpsc::UnboundedReceiver<ClientMessage>,
    incoming: std_mpsc::Sender<ServerMessage>,
) -> Result<()> {
    let mut framed = protocol::message_stream(stream);
    loop {
        tokio::select! {
            msg = outgoing.recv() => match msg {
                Some(msg) => protocol::send_message(&mut framed, &msg).await?,
                // クライアント側がドロップされた
                None => break,
            },
            frame = framed.next() => match frame {
                Some(Ok(bytes)) => {
                    let msg: ServerMessage = bincode::deserialize(&bytes)?;
                    if incoming.send(msg).is_err() {
                        break;
                    }
                }
                Some(Err(e)) => return Err(e.into()),
                None => bail!("detector closed the connection"),
            },
        }
    }
    Ok(())
}

impl HolisticDetector for RemoteDetector {
    /// サーバのReadyを待つ。モデルロードに時間がかかるためタイムアウトは長め
    fn initialize(&mut self) -> Result<()> {
        if self.ready {
            return Ok(());
        }
        match self.incoming.recv_timeout(READY_TIMEOUT) {
            Ok(ServerMessage::Ready) => {
                self.ready = true;
                Ok(())
            }
            Ok(other) => bail!("expected Ready, got {other:?}"),
            Err(e) => bail!("waiting for detector ready: {e}"),
        }
    }

    fn set_options(&mut self, options: &DetectorOptions) -> Result<()> {
        self.push(ClientMessage::Configure {
            options: options.clone(),
        })
    }

    fn send(&mut self, frame: &FrameImage) -> Result<()> {
        self.push(ClientMessage::Frame {
            frame: frame.clone(),
        })
    }

    fn try_result(&mut self) -> Option<HolisticResult> {
        loop {
            match self.incoming.try_recv() {
                Ok(ServerMessage::Detection { result }) => return Some(result),
                Ok(ServerMessage::Ready) => {
                    self.ready = true;
                }
                Err(_) => return None,
            }
        }
    }

    fn reset(&mut self) {
        // 切断済みなら捨てるだけでよい
        let _ = self.outgoing.send(ClientMessage::Reset);
    }
}

impl Drop for RemoteDetector {
    fn drop(&mut self) {
        // 送信チャネルを閉じてI/Oループを終わらせる
        let (closed_tx, _) = tokio_mpsc::unbounded_channel();
        self.outgoing = closed_tx;
        if let Some(handle) = self.io_thread.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    /// プロトコルをしゃべるスタブサーバを立てて一往復させる
    #[test]
    fn test_remote_detector_roundtrip() {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let listener = runtime
            .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
            .unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let server = thread::spawn(move || {
            runtime.block_on(async move {
                let (stream, _) = listener.accept().await.unwrap();
                let mut framed = protocol::message_stream(stream);
                protocol::send_message(&mut framed, &ServerMessage::Ready)
                    .await
                    .unwrap();
                loop {
                    let msg: ClientMessage = match protocol::recv_message(&mut framed).await {
                        Ok(msg) => msg,
                        Err(_) => break,
                    };
                    match msg {
                        ClientMessage::Frame { frame } => {
                            let result =
                                HolisticResult::empty(frame.width, frame.height, frame.timestamp_us);
                            protocol::send_message(
                                &mut framed,
                                &ServerMessage::Detection { result },
                            )
                            .await
                            .unwrap();
                        }
                        ClientMessage::Configure { .. } | ClientMessage::Reset => {}
                    }
                }
            });
        });

        let mut detector = RemoteDetector::connect(&addr).unwrap();
        detector.initialize().unwrap();
        detector.set_options(&DetectorOptions::default()).unwrap();
        detector
            .send(&FrameImage {
                width: 320,
                height: 240,
                timestamp_us: 7,
                jpeg: Vec::new(),
            })
            .unwrap();

        let deadline = Instant::now() + Duration::from_secs(5);
        let result = loop {
            if let Some(result) = detector.try_result() {
                break result;
            }
            assert!(Instant::now() < deadline, "no detection result arrived");
            thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(result.width, 320);
        assert_eq!(result.timestamp_us, 7);
        assert!(result.pose.is_none());

        drop(detector);
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        // 未使用ポートへの接続は即エラー
        assert!(RemoteDetector::connect("127.0.0.1:1").is_err());
    }
}
