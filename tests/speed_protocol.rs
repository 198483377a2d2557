//! Echo exchange against local listeners: echo, sink, early close,
//! refused ports, port fallback and stop/pause handling.

use relay_probe::{
    logging::ProbeLogger,
    probe::speed::{SessionEnd, SpeedProber, SpeedSettings},
    ControlSignals, ProbeError, RunControl,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpSocket};

fn settings(ports: Vec<u16>, duration: Duration) -> SpeedSettings {
    SpeedSettings {
        duration,
        chunk_size: 1024,
        connect_timeout: Duration::from_secs(1),
        round_timeout: Duration::from_millis(200),
        ports,
    }
}

fn prober(ports: Vec<u16>, duration: Duration) -> SpeedProber {
    SpeedProber::new(settings(ports, duration), Arc::new(ProbeLogger::silent()))
}

/// Echoes every byte back on every accepted connection
async fn echo_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                loop {
                    match stream.read(&mut buf).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            if stream.write_all(&buf[..n]).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            });
        }
    });
    port
}

/// Reads everything and never answers
async fn sink_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                while let Ok(n) = stream.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// Accepts and immediately hangs up
async fn closing_server() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            drop(stream);
        }
    });
    port
}

/// Leaves the first block unread for `read_delay`, then reads all of it and
/// echoes it back after `echo_delay`. A small receive buffer makes the
/// client's send wait for the read.
async fn slow_reader_server(block: usize, read_delay: Duration, echo_delay: Duration) -> u16 {
    let socket = TcpSocket::new_v4().unwrap();
    socket.set_recv_buffer_size(64 * 1024).unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(16).unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                tokio::time::sleep(read_delay).await;
                let mut buf = vec![0u8; block];
                if stream.read_exact(&mut buf).await.is_err() {
                    return;
                }
                tokio::time::sleep(echo_delay).await;
                if stream.write_all(&buf).await.is_err() {
                    return;
                }
                let mut rest = vec![0u8; 8192];
                while let Ok(n) = stream.read(&mut rest).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    port
}

/// A port nothing listens on
async fn refused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn test_echo_session_measures_both_directions() {
    let port = echo_server().await;
    let report = prober(vec![port], Duration::from_millis(500))
        .probe("127.0.0.1", &ControlSignals::detached())
        .await
        .unwrap();

    assert_eq!(report.port, port);
    assert_eq!(report.end, SessionEnd::Completed);
    assert!(report.rounds > 0);
    assert_eq!(report.successful_exchanges, report.rounds);
    assert_eq!(report.bytes_sent, report.rounds as u64 * 1024);
    assert_eq!(report.bytes_received, report.bytes_sent);
    assert!(report.avg_rtt_ms.is_some());
    assert!(report.download_mbps.unwrap() > 0.0);
    assert!(report.upload_mbps.unwrap() > 0.0);
}

#[tokio::test]
async fn test_silent_peer_reports_zero_download() {
    let port = sink_server().await;
    let report = prober(vec![port], Duration::from_millis(600))
        .probe("127.0.0.1", &ControlSignals::detached())
        .await
        .unwrap();

    // Read deadlines expire every round, which is not fatal.
    assert_eq!(report.end, SessionEnd::Completed);
    assert!(report.rounds >= 2);
    assert_eq!(report.bytes_received, 0);
    assert_eq!(report.successful_exchanges, 0);
    assert_eq!(report.download_mbps, Some(0.0));
    assert!(report.upload_mbps.unwrap() > 0.0);
}

#[tokio::test]
async fn test_peer_hangup_ends_session_fatally() {
    let port = closing_server().await;
    let report = prober(vec![port], Duration::from_secs(2))
        .probe("127.0.0.1", &ControlSignals::detached())
        .await
        .unwrap();

    assert!(matches!(report.end, SessionEnd::Fatal(_)), "ended with {:?}", report.end);
    assert_eq!(report.bytes_received, 0);
    assert!(report.elapsed < Duration::from_secs(2));
}

#[tokio::test]
async fn test_refused_ports_fail_with_every_port_named() {
    let first = refused_port().await;
    let second = refused_port().await;

    let err = prober(vec![first, second], Duration::from_millis(200))
        .probe("127.0.0.1", &ControlSignals::detached())
        .await
        .unwrap_err();

    match err {
        ProbeError::ConnectFailed(detail) => {
            assert!(detail.contains(&format!("{}:", first)), "{}", detail);
            assert!(detail.contains(&format!("{}:", second)), "{}", detail);
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_falls_back_to_next_port() {
    let closed = refused_port().await;
    let open = echo_server().await;

    let speed = prober(vec![closed, open], Duration::from_millis(300));
    let report = speed.probe("127.0.0.1", &ControlSignals::detached()).await.unwrap();
    assert_eq!(report.port, open);

    let figures = speed.measure("127.0.0.1", &ControlSignals::detached()).await;
    assert!(figures.download_mbps.unwrap() > 0.0);
}

#[tokio::test]
async fn test_no_connection_measures_nothing() {
    let port = refused_port().await;
    let figures = prober(vec![port], Duration::from_millis(200))
        .measure("127.0.0.1", &ControlSignals::detached())
        .await;

    assert!(figures.download_mbps.is_none());
    assert!(figures.upload_mbps.is_none());
}

#[tokio::test]
async fn test_blank_address_is_rejected() {
    let err = prober(vec![443], Duration::from_millis(200))
        .probe("  ", &ControlSignals::detached())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::MissingAddress));
}

#[tokio::test]
async fn test_stop_before_connect_cancels() {
    let port = echo_server().await;
    let control = RunControl::new();
    control.stop();

    let err = prober(vec![port], Duration::from_secs(5))
        .probe("127.0.0.1", &control.signals())
        .await
        .unwrap_err();
    assert!(matches!(err, ProbeError::Cancelled));
}

#[tokio::test]
async fn test_stop_interrupts_running_session() {
    let port = sink_server().await;
    let control = Arc::new(RunControl::new());
    let signals = control.signals();

    let stopper = control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(150)).await;
        stopper.stop();
    });

    let started = Instant::now();
    let report = prober(vec![port], Duration::from_secs(10))
        .probe("127.0.0.1", &signals)
        .await
        .unwrap();

    assert_eq!(report.end, SessionEnd::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test]
async fn test_paused_time_is_excluded_from_elapsed() {
    let port = echo_server().await;
    let control = Arc::new(RunControl::new());
    control.pause();
    let signals = control.signals();

    let resumer = control.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(400)).await;
        resumer.resume();
    });

    let started = Instant::now();
    let report = prober(vec![port], Duration::from_millis(300))
        .probe("127.0.0.1", &signals)
        .await
        .unwrap();
    let wall = started.elapsed();

    assert_eq!(report.end, SessionEnd::Completed);
    assert!(wall >= Duration::from_millis(400));
    assert!(report.elapsed + Duration::from_millis(300) < wall);
}

#[tokio::test]
async fn test_slow_send_does_not_eat_the_receive_window() {
    // Larger than any loopback socket buffering, so the send has to wait for the peer.
    let block = 8 * 1024 * 1024;
    let port = slow_reader_server(block, Duration::from_millis(500), Duration::from_millis(500)).await;

    let speed = SpeedProber::new(
        SpeedSettings {
            duration: Duration::from_millis(300),
            chunk_size: block,
            connect_timeout: Duration::from_secs(1),
            round_timeout: Duration::from_millis(800),
            ports: vec![port],
        },
        Arc::new(ProbeLogger::silent()),
    );
    let report = speed.probe("127.0.0.1", &ControlSignals::detached()).await.unwrap();

    // The echo lands about 1s into the round: after a window counted from the
    // start of the round, but well inside one counted from the end of the send.
    assert_eq!(report.end, SessionEnd::Completed);
    assert_eq!(report.rounds, 1);
    assert_eq!(report.bytes_sent, block as u64);
    assert_eq!(report.bytes_received, block as u64);
    assert_eq!(report.successful_exchanges, 1);
}
