//! clockwardend - The clockwarden background service
//!
//! Runs inside the user's desktop session and wires together:
//! - Configuration and `.env` loading
//! - Punch ledger, credential cache and audit store
//! - HTTP punch gateway and workstation locker
//! - Session state machine, punch desk and overtime watch
//! - IPC server

use anyhow::{Context, Result, bail};
use clap::Parser;
use clockwarden_api::{
    API_VERSION, ClientRole, Command, ErrorCode, ErrorInfo, Event, EventPayload, Response,
    ResponsePayload, ServiceStateSnapshot,
};
use clockwarden_config::{EnvFile, Policy, load_config_or_default};
use clockwarden_core::{
    CoreEvent, EnforcementExecutor, EnforcementKind, LockMode, MAX_OVERTIME_HOURS, OvertimeWatch,
    ParityCompletion, PunchDesk, PunchLedger, SessionEnforcer, overtime_extension,
};
use clockwarden_host_api::{PunchGateway, WorkstationLocker};
use clockwarden_host_linux::{HttpGatewayConfig, HttpPunchGateway, LinuxLocker};
use clockwarden_ipc::{IpcServer, ServerMessage, is_daemon_running};
use clockwarden_store::{
    AuditEvent, AuditEventType, AuditStore, DiagnosticLog, ENFORCER_LOG_FILE, FileStore,
    OVERTIME_LOG_FILE, SESSION_LOG_FILE, SqliteStore,
};
use clockwarden_util::{ClientId, LocalUser, default_config_dir, default_config_path};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::signal::unix::{SignalKind, signal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

const AUDIT_DB_FILE: &str = "clockwarden.db";

/// clockwardend - Shift deadline enforcement for shared workstations
#[derive(Parser, Debug)]
#[command(name = "clockwardend")]
#[command(about = "Shift deadline enforcement for shared workstations", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/clockwarden/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Socket path override (or set CLOCKWARDEN_SOCKET env var)
    #[arg(short, long, env = "CLOCKWARDEN_SOCKET")]
    socket: Option<PathBuf>,

    /// Data directory override (or set CLOCKWARDEN_DATA_DIR env var)
    #[arg(short, long, env = "CLOCKWARDEN_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Diagnostic log directory override
    #[arg(long, env = "CLOCKWARDEN_LOG_DIR")]
    log_dir: Option<PathBuf>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Shared handles used by the control loop and request tasks
#[derive(Clone)]
struct Daemon {
    local_user: LocalUser,
    desk: Arc<PunchDesk>,
    session: SessionEnforcer,
    executor: EnforcementExecutor,
    watch: OvertimeWatch,
    ipc: Arc<IpcServer>,
    audit: Arc<dyn AuditStore>,
}

/// Main service state
struct Service {
    daemon: Daemon,
    core_events: mpsc::UnboundedReceiver<CoreEvent>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let policy = load_config_or_default(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;
        let config_found = args.config.exists();

        info!(
            config_path = %args.config.display(),
            defaults = !config_found,
            "Configuration loaded"
        );

        let socket_path = args
            .socket
            .clone()
            .unwrap_or_else(|| policy.service.socket_path.clone());
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| policy.service.data_dir.clone());
        let log_dir = args
            .log_dir
            .clone()
            .unwrap_or_else(|| policy.service.log_dir.clone());

        if is_daemon_running(&socket_path).await {
            bail!(
                "Another clockwardend is already running on {}",
                socket_path.display()
            );
        }

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", log_dir))?;

        let db_path = data_dir.join(AUDIT_DB_FILE);
        let audit: Arc<dyn AuditStore> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open database {:?}", db_path))?,
        );
        info!(db_path = %db_path.display(), "Audit store initialized");

        audit.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;
        audit.append_audit(AuditEvent::new(AuditEventType::PolicyLoaded {
            config_path: args.config.display().to_string(),
            defaults: !config_found,
        }))?;

        let gateway: Arc<dyn PunchGateway> = Arc::new(build_gateway(&policy, &data_dir)?);
        let locker: Arc<dyn WorkstationLocker> = Arc::new(LinuxLocker::new());

        let local_user = LocalUser::current();
        let (core_tx, core_rx) = mpsc::unbounded_channel();

        let ledger = Arc::new(PunchLedger::new(
            Arc::new(FileStore::new(&data_dir)),
            policy.ledger.clone(),
        ));
        let executor = EnforcementExecutor::new(
            ledger,
            gateway.clone(),
            locker,
            Arc::new(DiagnosticLog::in_dir(&log_dir, ENFORCER_LOG_FILE)),
            policy.enforcement.settle_delay,
        )
        .with_events(core_tx.clone());

        let session = SessionEnforcer::new(
            local_user.clone(),
            policy.shift.clone(),
            executor.clone(),
            core_tx.clone(),
            Arc::new(DiagnosticLog::in_dir(&log_dir, SESSION_LOG_FILE)),
        );
        let watch = OvertimeWatch::new(
            gateway.clone(),
            session.clone(),
            policy.overtime.poll_interval,
            Arc::new(DiagnosticLog::in_dir(&log_dir, OVERTIME_LOG_FILE)),
        );
        let desk = PunchDesk::new(
            gateway,
            session.clone(),
            executor.clone(),
            watch.clone(),
            core_tx,
        )
        .with_completion(Arc::new(ParityCompletion::new(
            policy.shift.end_of_day_min_logins,
        )));

        let mut ipc = IpcServer::new(&socket_path);
        ipc.start()
            .await
            .with_context(|| format!("Failed to bind socket {:?}", socket_path))?;

        info!(
            local_user = %local_user,
            socket_path = %socket_path.display(),
            data_dir = %data_dir.display(),
            log_dir = %log_dir.display(),
            "Service initialized"
        );

        Ok(Self {
            daemon: Daemon {
                local_user,
                desk: Arc::new(desk),
                session,
                executor,
                watch,
                ipc: Arc::new(ipc),
                audit,
            },
            core_events: core_rx,
        })
    }

    async fn run(self) -> Result<()> {
        let Service {
            daemon,
            mut core_events,
        } = self;

        let mut ipc_messages = daemon
            .ipc
            .take_message_receiver()
            .await
            .context("IPC message receiver already taken")?;

        let ipc_accept = daemon.ipc.clone();
        tokio::spawn(async move {
            if let Err(e) = ipc_accept.run().await {
                error!(error = %e, "IPC server error");
            }
        });

        let mut sigterm =
            signal(SignalKind::terminate()).context("Failed to create SIGTERM handler")?;
        let mut sigint =
            signal(SignalKind::interrupt()).context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup()).context("Failed to create SIGHUP handler")?;

        // A shift left open by a crash or power loss is closed before the new session starts
        daemon.executor.enforce_startup_restrictions(&daemon.local_user);
        daemon
            .session
            .start_pre_login_countdown(clockwarden_util::now());

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }
                // Sent when the desktop session ends
                _ = sighup.recv() => {
                    info!("Received SIGHUP, shutting down gracefully");
                    break;
                }

                Some(event) = core_events.recv() => {
                    daemon.handle_core_event(event);
                }

                Some(msg) = ipc_messages.recv() => {
                    daemon.handle_ipc_message(msg).await;
                }
            }
        }

        info!("Shutting down clockwardend");

        daemon.session.shutdown();
        daemon.watch.stop();
        daemon
            .ipc
            .broadcast_event(Event::new(EventPayload::Shutdown));

        if let Err(e) = daemon
            .audit
            .append_audit(AuditEvent::new(AuditEventType::ServiceStopped))
        {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }
}

impl Daemon {
    fn audit(&self, event: AuditEventType) {
        if let Err(e) = self.audit.append_audit(AuditEvent::new(event)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }

    fn handle_core_event(&self, event: CoreEvent) {
        match event {
            CoreEvent::WarningIssued {
                local_user,
                message,
            } => {
                info!(local_user = %local_user, message = %message, "Warning issued");
                self.ipc
                    .broadcast_event(Event::new(EventPayload::WarningIssued {
                        message: message.clone(),
                    }));
                self.audit(AuditEventType::WarningIssued {
                    local_user,
                    message,
                });
            }

            CoreEvent::ShiftChanged { snapshot, .. } => {
                self.ipc
                    .broadcast_event(Event::new(EventPayload::ShiftChanged(snapshot)));
            }

            CoreEvent::PunchRecorded {
                local_user,
                kind,
                label,
                ..
            } => {
                self.ipc
                    .broadcast_event(Event::new(EventPayload::PunchRecorded {
                        kind,
                        label: label.clone(),
                    }));
                self.audit(AuditEventType::PunchRecorded {
                    local_user,
                    kind,
                    label,
                });
            }

            CoreEvent::PunchDenied { local_user, reason } => {
                self.audit(AuditEventType::PunchDenied { local_user, reason });
            }

            CoreEvent::ShiftExtended {
                local_user,
                hours,
                forced_logout_at,
            } => {
                self.audit(AuditEventType::ShiftExtended {
                    local_user,
                    hours,
                    new_deadline: forced_logout_at,
                });
            }

            CoreEvent::Enforced(report) => {
                debug!(report = ?report, "Enforcement finished");
                if report.kind != EnforcementKind::LockAfterPunchOut {
                    self.audit(AuditEventType::ForcedPunch {
                        local_user: report.local_user.clone(),
                        credentials_found: report.credentials_found,
                        response: report.response.clone(),
                    });
                }
                if let Some(success) = report.locked {
                    self.audit(AuditEventType::WorkstationLocked {
                        local_user: report.local_user,
                        success,
                    });
                }
            }
        }
    }

    async fn handle_ipc_message(&self, msg: ServerMessage) {
        match msg {
            ServerMessage::Request { client_id, request } => {
                let role = self
                    .ipc
                    .get_client_info(&client_id)
                    .await
                    .map(|info| info.role)
                    .unwrap_or(ClientRole::Observer);

                debug!(
                    client_id = %client_id,
                    request_id = request.request_id,
                    command = request.command.name(),
                    "Request received"
                );

                // Punches and overtime requests wait on the network; keep them off the loop
                let daemon = self.clone();
                tokio::spawn(async move {
                    let response = if request.api_version != API_VERSION {
                        Response::error(
                            request.request_id,
                            ErrorInfo::new(
                                ErrorCode::UnsupportedVersion,
                                format!("API version {} is not supported", request.api_version),
                            ),
                        )
                    } else if request.command.requires_admin() && role != ClientRole::Admin {
                        Response::error(
                            request.request_id,
                            ErrorInfo::new(
                                ErrorCode::PermissionDenied,
                                format!("{} requires an admin client", request.command.name()),
                            ),
                        )
                    } else {
                        daemon
                            .handle_command(&client_id, request.request_id, request.command)
                            .await
                    };

                    if let Err(e) = daemon.ipc.send_response(&client_id, response).await {
                        debug!(client_id = %client_id, error = %e, "Failed to send response");
                    }
                });
            }

            ServerMessage::ClientConnected { client_id, info } => {
                info!(
                    client_id = %client_id,
                    role = ?info.role,
                    uid = ?info.uid,
                    "Client connected"
                );
                self.audit(AuditEventType::ClientConnected {
                    client_id: client_id.to_string(),
                    role: format!("{:?}", info.role),
                    uid: info.uid,
                });
            }

            ServerMessage::ClientDisconnected { client_id } => {
                debug!(client_id = %client_id, "Client disconnected");
                self.audit(AuditEventType::ClientDisconnected {
                    client_id: client_id.to_string(),
                });
            }
        }
    }

    async fn handle_command(
        &self,
        client_id: &ClientId,
        request_id: u64,
        command: Command,
    ) -> Response {
        let now = clockwarden_util::now();

        match command {
            Command::GetState => {
                Response::success(request_id, ResponsePayload::State(self.state(now)))
            }

            Command::StartCountdown => {
                self.session.start_pre_login_countdown(now);
                Response::success(request_id, ResponsePayload::CountdownStarted)
            }

            Command::Punch {
                remote_user,
                password,
            } => {
                let report = self
                    .desk
                    .punch(&self.local_user, &remote_user, &password, now)
                    .await;
                Response::success(request_id, ResponsePayload::Punch(report))
            }

            Command::OvertimeApproved { hours } => {
                if overtime_extension(hours).is_none() {
                    return Response::error(
                        request_id,
                        ErrorInfo::new(
                            ErrorCode::InvalidRequest,
                            format!(
                                "Invalid overtime hours: {} (expected 0 to {})",
                                hours, MAX_OVERTIME_HOURS
                            ),
                        ),
                    );
                }
                self.session.on_overtime_approved(hours, now);
                Response::success(request_id, ResponsePayload::ShiftExtended)
            }

            Command::RequestOvertime { note, hours } => {
                match self
                    .desk
                    .request_overtime(&self.local_user, &note, hours, now)
                    .await
                {
                    Ok(accepted) => {
                        self.audit(AuditEventType::OvertimeRequested {
                            local_user: self.local_user.clone(),
                            hours,
                            accepted,
                        });
                        Response::success(
                            request_id,
                            ResponsePayload::OvertimeRequested { accepted },
                        )
                    }
                    Err(reason) => Response::error(
                        request_id,
                        ErrorInfo::new(ErrorCode::InvalidRequest, reason.message()),
                    ),
                }
            }

            Command::LockNow => {
                self.executor
                    .force_log_off(&self.local_user, LockMode::Immediate);
                Response::success(request_id, ResponsePayload::LockRequested)
            }

            Command::SubscribeEvents => Response::success(
                request_id,
                ResponsePayload::Subscribed {
                    client_id: client_id.clone(),
                },
            ),

            Command::UnsubscribeEvents => {
                Response::success(request_id, ResponsePayload::Unsubscribed)
            }

            Command::Ping => Response::success(request_id, ResponsePayload::Pong),
        }
    }

    fn state(&self, now: chrono::DateTime<chrono::Local>) -> ServiceStateSnapshot {
        let ledger = self.desk.ledger();
        ServiceStateSnapshot {
            api_version: API_VERSION,
            local_user: self.local_user.clone(),
            shift: self.session.snapshot(),
            today_login_count: ledger.today_login_count(&self.local_user, now),
            locked_out: ledger.is_locked_out(&self.local_user, now),
            next_punch_is_out: ledger.should_next_punch_be_out(&self.local_user, now),
        }
    }
}

/// HTTP gateway from policy, with the API key taken from the environment or a `.env` file
fn build_gateway(policy: &Policy, data_dir: &Path) -> Result<HttpPunchGateway> {
    let mut search = vec![default_config_dir(), data_dir.to_path_buf()];
    if let Ok(cwd) = std::env::current_dir() {
        search.push(cwd);
    }
    let env_file = EnvFile::search(&search);

    let gateway = &policy.gateway;
    let api_key = env_file.lookup(&gateway.api_key_env);
    match (&api_key, env_file.source()) {
        (Some(_), _) => debug!(key = %gateway.api_key_env, "Gateway API key found"),
        (None, Some(source)) => warn!(
            key = %gateway.api_key_env,
            env_file = %source.display(),
            "Gateway API key missing; punches will fail"
        ),
        (None, None) => warn!(
            key = %gateway.api_key_env,
            "Gateway API key missing and no .env file found; punches will fail"
        ),
    }

    HttpPunchGateway::new(HttpGatewayConfig {
        login_url: gateway.login_url.clone(),
        punch_url: gateway.punch_url.clone(),
        overtime_url: gateway.overtime_url.clone(),
        overtime_status_url: gateway.overtime_status_url.clone(),
        company: gateway.company.clone(),
        api_key,
        api_key_env: gateway.api_key_env.clone(),
        timeout: gateway.timeout,
    })
    .context("Failed to build HTTP punch gateway")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "clockwardend starting");

    let service = Service::new(&args).await?;
    service.run().await
}
