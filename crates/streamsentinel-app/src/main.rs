//! # streamsentinel-app
//!
//! StreamSentinel 바이너리 진입점.
//! DI 컨테이너 역할, 라이프사이클 관리, 스케줄러/OBS 감독 오케스트레이션.

mod event_bus;
mod notifier;
mod scheduler;
mod shutdown;
mod supervisor;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use streamsentinel_analysis::engine::Engine;
use streamsentinel_core::config::AppConfig;
use streamsentinel_core::ports::remote::RemoteStatsSource;
use streamsentinel_monitor::feed::FeedReader;
use streamsentinel_monitor::system::SysInfoMonitor;
use streamsentinel_network::obs_client::ObsClient;
use tokio::io::{AsyncBufRead, BufReader};
use tokio::sync::oneshot;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::event_bus::{spawn_status_logger, EventBus};
use crate::notifier::{BusNotifier, LogNotifier};
use crate::scheduler::{LocalSource, Scheduler, SchedulerConfig};
use crate::shutdown::ShutdownController;
use crate::supervisor::{ObsSupervisor, SupervisorExit};

/// 실시간 방송 품질 모니터
///
/// 로컬 네트워크/시스템 지표와 OBS 통계를 합쳐 품질 점수와 끊김 경보를 낸다.
#[derive(Parser, Debug)]
#[command(name = "streamsentinel")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// 설정 파일 경로 (기본: 플랫폼별 설정 디렉터리의 config.toml)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// OBS WebSocket 호스트
    #[arg(long)]
    host: Option<String>,

    /// OBS WebSocket 포트
    #[arg(long, short = 'p')]
    port: Option<u16>,

    /// OBS WebSocket 비밀번호
    #[arg(long)]
    password: Option<String>,

    /// wss:// 사용
    #[arg(long)]
    tls: bool,

    /// 목표 비트레이트 (kbps)
    #[arg(long, short = 't')]
    target_bitrate: Option<f64>,

    /// 로컬 측정 피드 (파일 경로, `-`는 표준 입력). 없으면 sysinfo로 CPU/메모리만 수집.
    #[arg(long, short = 'f')]
    feed: Option<String>,

    /// OBS 연결 없이 로컬 지표만 사용
    #[arg(long, short = 'o')]
    offline: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,
}

/// CLI 인자로 설정 덮어쓰기
fn apply_overrides(config: &mut AppConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.obs.host = host.clone();
    }
    if let Some(port) = args.port {
        config.obs.port = port;
    }
    if let Some(password) = &args.password {
        config.obs.password = Some(password.clone());
    }
    if args.tls {
        config.obs.use_tls = true;
    }
    if let Some(target) = args.target_bitrate {
        config.scoring.target_bitrate_kbps = target;
    }
}

/// 로컬 측정값 공급원 결정
async fn open_local_source(feed: Option<&str>) -> Result<LocalSource> {
    let reader: Box<dyn AsyncBufRead + Unpin + Send> = match feed {
        None => {
            info!("외부 피드 없음: sysinfo로 CPU/메모리만 수집");
            return Ok(LocalSource::Polled(Arc::new(SysInfoMonitor::new())));
        }
        Some("-") => {
            info!("로컬 피드: 표준 입력");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
        Some(path) => {
            info!("로컬 피드: {path}");
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("피드 파일 열기 실패: {path}"))?;
            Box::new(BufReader::new(file))
        }
    };
    Ok(LocalSource::Feed(FeedReader::new(reader)))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // tracing 초기화
    let log_filter = format!(
        "streamsentinel={},streamsentinel_app={},streamsentinel_core={},streamsentinel_network={},streamsentinel_monitor={},streamsentinel_analysis={}",
        args.log_level, args.log_level, args.log_level, args.log_level, args.log_level, args.log_level
    );
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_filter)),
        )
        .init();

    info!("StreamSentinel 시작");

    // 설정 로드
    let config_path = args.config.clone().or_else(AppConfig::default_path);
    let mut config = AppConfig::load(config_path.as_deref()).context("설정 로드 실패")?;
    apply_overrides(&mut config, &args);
    config.validate().context("설정 검증 실패")?;

    if args.offline {
        info!("오프라인 모드: OBS 연결 없이 로컬 지표만 사용");
    } else {
        info!("OBS: {}", config.obs.url());
    }
    info!(
        "목표 비트레이트: {:.0}kbps, 점수 윈도우: {}개",
        config.scoring.target_bitrate_kbps, config.scoring.window_size
    );

    // ── 구성요소 ──

    let engine = Arc::new(Engine::new(&config));
    let event_bus = Arc::new(EventBus::default());
    let shutdown = ShutdownController::new();

    engine.subscribe_alerts(Arc::new(LogNotifier));
    engine.subscribe_alerts(Arc::new(BusNotifier::new(event_bus.clone())));

    let sched = Scheduler::new(
        SchedulerConfig::from_app_config(&config),
        engine.clone(),
        event_bus.clone(),
    );
    let (ingest_tx, ingest_rx) = sched.ingest_channel();

    // ── 태스크 시작 ──

    let gateway_task = sched.spawn_gateway(ingest_rx);
    let status_task = spawn_status_logger(&event_bus, shutdown.subscribe());

    let local_source = open_local_source(args.feed.as_deref()).await?;
    let (local_done_tx, local_done_rx) = oneshot::channel();
    let local_inner = sched.spawn_local(local_source, ingest_tx.clone(), shutdown.subscribe());
    let local_task = tokio::spawn(async move {
        if let Err(e) = local_inner.await {
            warn!("로컬 수집 태스크 비정상 종료: {e}");
        }
        let _ = local_done_tx.send(());
    });
    let report_task = sched.spawn_report(shutdown.subscribe());

    let supervisor_task = if args.offline {
        None
    } else {
        let client: Arc<dyn RemoteStatsSource> = Arc::new(ObsClient::new(config.obs.clone()));
        let supervisor = ObsSupervisor::new(
            client,
            engine.clone(),
            event_bus.clone(),
            config.reconnect.clone(),
            config.obs.poll_interval(),
        );
        let tx = ingest_tx.clone();
        let shutdown_rx = shutdown.subscribe();
        Some(tokio::spawn(async move {
            match supervisor.run(tx, shutdown_rx).await {
                SupervisorExit::Shutdown => info!("OBS 감독 종료"),
                SupervisorExit::AuthFailed(reason) => {
                    error!("OBS 인증 실패로 원격 통계 비활성화: {reason}");
                    error!("비밀번호를 확인한 뒤 다시 시작하세요 (--password)");
                }
                SupervisorExit::IngestClosed => warn!("인제스트 채널 닫힘, OBS 감독 종료"),
            }
        }))
    };
    drop(ingest_tx);

    info!("StreamSentinel 실행 중 (Ctrl+C로 종료)");

    // 시그널 또는 피드 종료 대기
    let reason = shutdown.run_until_exit(local_done_rx).await;
    info!("종료 사유: {reason}");

    // 생산자 → 게이트웨이 순으로 정리
    if let Some(task) = supervisor_task {
        if let Err(e) = task.await {
            warn!("OBS 감독 태스크 비정상 종료: {e}");
        }
    }
    for (name, task) in [
        ("로컬 수집", local_task),
        ("보고", report_task),
        ("상태 로그", status_task),
    ] {
        if let Err(e) = task.await {
            warn!("{name} 태스크 비정상 종료: {e}");
        }
    }
    if let Err(e) = gateway_task.await {
        warn!("게이트웨이 태스크 비정상 종료: {e}");
    }

    let final_score = scheduler::report(&engine, &event_bus);
    info!(
        "StreamSentinel 종료 (마지막 점수 {:.1}, {})",
        final_score.score, final_score.grade
    );
    Ok(())
}
