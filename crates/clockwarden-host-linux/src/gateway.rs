//! HTTP punch gateway
//!
//! Talks to the timekeeping service (login + webclock punch) and to the
//! overtime backend. Bodies are JSON; the session token from login is kept
//! in memory and sent as a bearer token on punches.

use async_trait::async_trait;
use clockwarden_api::{OvertimeStatus, PunchOutcome};
use clockwarden_host_api::{GatewayError, GatewayResult, PunchGateway};
use clockwarden_util::LocalUser;
use reqwest::{Client, StatusCode, header};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::RwLock;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Endpoints and credentials for [`HttpPunchGateway`]
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    pub login_url: String,
    pub punch_url: String,
    pub overtime_url: String,
    pub overtime_status_url: String,
    pub company: String,
    /// Sent as `Api-Key` on login; login is refused locally without it
    pub api_key: Option<String>,
    /// Where the API key was expected, for error messages
    pub api_key_env: String,
    pub timeout: Duration,
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    credentials: LoginCredentials<'a>,
}

#[derive(Serialize)]
struct LoginCredentials<'a> {
    username: &'a str,
    password: &'a str,
    company: &'a str,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

#[derive(Serialize)]
struct PunchRequest {
    action: &'static str,
}

#[derive(Serialize)]
struct OvertimeRequest<'a> {
    ad_username: &'a str,
    reason: &'a str,
    overtime_hours: f64,
}

/// reqwest-backed [`PunchGateway`]
pub struct HttpPunchGateway {
    client: Client,
    config: HttpGatewayConfig,
    token: RwLock<Option<String>>,
}

impl HttpPunchGateway {
    pub fn new(config: HttpGatewayConfig) -> GatewayResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            config,
            token: RwLock::new(None),
        })
    }

    fn set_token(&self, token: Option<String>) {
        match self.token.write() {
            Ok(mut guard) => *guard = token,
            Err(poisoned) => *poisoned.into_inner() = token,
        }
    }

    async fn post_json<T: Serialize>(
        &self,
        url: &str,
        body: &T,
        extra: &[(&str, String)],
    ) -> GatewayResult<(StatusCode, String)> {
        let payload =
            serde_json::to_vec(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

        let mut request = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::ACCEPT, "application/json")
            .body(payload);
        for (name, value) in extra {
            request = request.header(*name, value.as_str());
        }

        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        Ok((status, text))
    }
}

#[async_trait]
impl PunchGateway for HttpPunchGateway {
    async fn authenticate(&self, remote_user: &str, password: &str) -> GatewayResult<bool> {
        let api_key = self
            .config
            .api_key
            .clone()
            .ok_or_else(|| GatewayError::MissingApiKey(self.config.api_key_env.clone()))?;

        let body = LoginRequest {
            credentials: LoginCredentials {
                username: remote_user,
                password,
                company: &self.config.company,
            },
        };

        let (status, text) = self
            .post_json(&self.config.login_url, &body, &[("Api-Key", api_key)])
            .await?;

        if !status.is_success() {
            info!(remote_user, status = status.as_u16(), "Login rejected");
            self.set_token(None);
            return Ok(false);
        }

        match parse_login_token(&text) {
            Ok(token) => {
                debug!(remote_user, "Login succeeded");
                self.set_token(Some(token));
                Ok(true)
            }
            Err(e) => {
                self.set_token(None);
                Err(e)
            }
        }
    }

    fn current_token(&self) -> Option<String> {
        match self.token.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    async fn submit_punch(&self) -> GatewayResult<PunchOutcome> {
        let Some(token) = self.current_token() else {
            warn!("Punch attempted without a session token");
            return Ok(PunchOutcome::RequestFailed);
        };

        let (status, text) = self
            .post_json(
                &self.config.punch_url,
                &PunchRequest { action: "punch" },
                &[("Authorization", format!("Bearer {}", token))],
            )
            .await?;

        let outcome = classify_punch_response(status.is_success(), &text);
        debug!(status = status.as_u16(), outcome = ?outcome, "Punch submitted");
        Ok(outcome)
    }

    async fn request_overtime(
        &self,
        local_user: &LocalUser,
        note: &str,
        hours: f64,
    ) -> GatewayResult<bool> {
        let body = OvertimeRequest {
            ad_username: local_user.as_str(),
            reason: note,
            overtime_hours: hours,
        };

        let (status, _) = self
            .post_json(&self.config.overtime_url, &body, &[])
            .await?;
        Ok(status.is_success())
    }

    async fn today_overtime_status(
        &self,
        local_user: &LocalUser,
    ) -> GatewayResult<Option<OvertimeStatus>> {
        let response = self
            .client
            .get(&self.config.overtime_status_url)
            .query(&[("ad_username", local_user.as_str())])
            .header(header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        debug!(status = status.as_u16(), body = %text, "Overtime status fetched");

        if !status.is_success() {
            return Err(GatewayError::Status(status.as_u16()));
        }

        parse_overtime_status(&text)
    }
}

/// Classify the webclock response.
///
/// `punch.type` of `PUNCH_OUT` (any case) is a clock-out, any other type a
/// clock-in. A successful response without `punch.type` means the service
/// refused the punch time.
pub fn classify_punch_response(success: bool, body: &str) -> PunchOutcome {
    if !success {
        return PunchOutcome::RequestFailed;
    }

    let punch_type = serde_json::from_str::<Value>(body).ok().and_then(|root| {
        root.get("punch")
            .and_then(|p| p.get("type"))
            .map(|t| t.as_str().unwrap_or("UNKNOWN").to_string())
    });

    match punch_type {
        Some(label) if label.eq_ignore_ascii_case("PUNCH_OUT") => PunchOutcome::PunchOut { label },
        Some(label) => PunchOutcome::PunchIn { label },
        None => PunchOutcome::InvalidPunchWindow {
            raw_response: body.to_string(),
        },
    }
}

/// Session token from a successful login body. A 2xx body without a token
/// is a decode error, so the punch fails before anything is submitted.
pub fn parse_login_token(body: &str) -> GatewayResult<String> {
    let parsed: LoginResponse =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;
    match parsed.token {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(GatewayError::Decode("login response carried no token".into())),
    }
}

/// Parse `{status, label, data: {accepted, hours}}`
pub fn parse_overtime_status(body: &str) -> GatewayResult<Option<OvertimeStatus>> {
    let root: Value =
        serde_json::from_str(body).map_err(|e| GatewayError::Decode(e.to_string()))?;

    let Some(data) = root.get("data").filter(|d| d.is_object()) else {
        return Ok(None);
    };

    let accepted = data
        .get("accepted")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let hours = match data.get("hours") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    };

    Ok(Some(OvertimeStatus { accepted, hours }))
}
