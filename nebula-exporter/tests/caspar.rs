//! CasparCG provider against a mock AMCP server.

mod common;

use std::time::Duration;

use nebula_exporter::Error;
use nebula_exporter::caspar::discovery::MAX_CONSECUTIVE_SKIPS;
use nebula_exporter::caspar::{CasparConfig, CasparProvider, FrameRate, ProtocolVersion};
use nebula_exporter::config::Settings;
use tokio_util::sync::CancellationToken;

use common::{MockAmcp, MockAmcpServer, free_udp_port, wait_for};

async fn config_for(server: &MockAmcpServer) -> CasparConfig {
    CasparConfig {
        host: "127.0.0.1".to_string(),
        amcp_port: server.port(),
        osc_host: "127.0.0.1".to_string(),
        osc_port: free_udp_port().await,
        heartbeat_interval: Duration::from_millis(100),
    }
}

#[tokio::test]
async fn test_disabled_without_host() {
    let settings = Settings::default();
    let cancel = CancellationToken::new();
    let provider = CasparProvider::start(CasparConfig::from_settings(&settings), &cancel)
        .await
        .unwrap();
    assert!(provider.is_none());
}

#[tokio::test]
async fn test_discovers_channels_until_first_failure() {
    let server = MockAmcpServer::start(MockAmcp::with_channels(3, "1080i5000")).await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config_for(&server).await), &cancel)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(provider.protocol(), ProtocolVersion::V2_2);
    assert_eq!(provider.protocol().to_string(), "2.2");
    assert_eq!(provider.channels().keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    for channel in provider.channels().values() {
        assert_eq!(channel.video_mode, "1080i5000");
        assert_eq!(channel.frame_rate, FrameRate::new(25, 1).unwrap());
    }
    // VERSION, INFO 1..=3 and the failing INFO 4
    assert_eq!(server.commands(), 5);

    cancel.cancel();
}

#[tokio::test]
async fn test_channel_without_video_mode_is_skipped() {
    let mut behaviour = MockAmcp::with_channels(3, "PAL");
    behaviour.video_modes[1] = None;
    let server = MockAmcpServer::start(behaviour).await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config_for(&server).await), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.channels().keys().copied().collect::<Vec<_>>(), vec![1, 3]);

    cancel.cancel();
}

#[tokio::test]
async fn test_enumeration_stops_after_consecutive_skips() {
    let mut behaviour = MockAmcp::with_channels(1, "PAL");
    behaviour.video_modes.extend(vec![None; 50]);
    let server = MockAmcpServer::start(behaviour).await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config_for(&server).await), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.channels().keys().copied().collect::<Vec<_>>(), vec![1]);
    // VERSION, INFO 1, then INFO 2..=5 without a video mode
    assert_eq!(server.commands(), 2 + MAX_CONSECUTIVE_SKIPS as usize);

    cancel.cancel();
}

#[tokio::test]
async fn test_unknown_video_mode_is_fatal() {
    let mut behaviour = MockAmcp::with_channels(2, "1080p5000");
    behaviour.video_modes[1] = Some("4320p12000".to_string());
    let server = MockAmcpServer::start(behaviour).await;
    let cancel = CancellationToken::new();

    let result = CasparProvider::start(Some(config_for(&server).await), &cancel).await;
    match result {
        Err(Error::UnknownVideoMode { channel, mode }) => {
            assert_eq!(channel, 2);
            assert_eq!(mode, "4320p12000");
        }
        other => panic!("expected an unknown video mode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_old_server_version_is_negotiated() {
    let mut behaviour = MockAmcp::with_channels(1, "NTSC");
    behaviour.version = "2.0.7.e9fc25a Stable".to_string();
    let server = MockAmcpServer::start(behaviour).await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config_for(&server).await), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.protocol(), ProtocolVersion::V2_0_7);
    assert_eq!(
        provider.channels()[&1].frame_rate,
        FrameRate::new(30000, 1001).unwrap()
    );

    cancel.cancel();
}

#[tokio::test]
async fn test_unreachable_server_starts_without_channels() {
    let server = MockAmcpServer::start(MockAmcp::with_channels(1, "PAL")).await;
    let mut config = config_for(&server).await;
    // Nothing listens on this port.
    config.amcp_port = free_tcp_port().await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert!(provider.channels().is_empty());
    assert_eq!(provider.protocol(), ProtocolVersion::FALLBACK);

    cancel.cancel();
}

#[tokio::test]
async fn test_heartbeat_reconnects_after_server_drop() {
    let mut behaviour = MockAmcp::with_channels(1, "PAL");
    // VERSION, INFO 1, INFO 2, then the server hangs up.
    behaviour.drop_first_after = Some(3);
    let server = MockAmcpServer::start(behaviour).await;
    let cancel = CancellationToken::new();

    let provider = CasparProvider::start(Some(config_for(&server).await), &cancel)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(provider.channels().len(), 1);
    assert_eq!(server.connections(), 1);

    assert!(
        wait_for(Duration::from_secs(5), || server.connections() >= 2).await,
        "heartbeat never reconnected"
    );

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    let response = loop {
        let response = provider.connection().query("VERSION").await;
        if response.is_success() || tokio::time::Instant::now() >= deadline {
            break response;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    };
    assert!(response.is_success(), "{}", response);
    assert_eq!(response.first_line(), Some("2.3.1-stable"));

    cancel.cancel();
}

async fn free_tcp_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
