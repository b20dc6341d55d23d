//! Twilio signaling: outbound call placement and webhook payloads

use crate::TransportError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use voice_dialer_config::TelephonyConfig;
use voice_dialer_core::{PlaceCallRequest, ProviderEvent, Result, SignalingProvider};

#[derive(Debug, Deserialize)]
struct CallResource {
    sid: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: Option<u32>,
    #[serde(default)]
    message: Option<String>,
}

/// Places calls through the Twilio REST API
pub struct TwilioSignaling {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
    api_base_url: String,
}

impl TwilioSignaling {
    pub fn new(
        account_sid: impl Into<String>,
        auth_token: impl Into<String>,
        from_number: impl Into<String>,
        api_base_url: impl Into<String>,
    ) -> std::result::Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| TransportError::Http(e.to_string()))?;

        Ok(Self {
            client,
            account_sid: account_sid.into(),
            auth_token: auth_token.into(),
            from_number: from_number.into(),
            api_base_url: api_base_url.into(),
        })
    }

    pub fn from_config(config: &TelephonyConfig) -> std::result::Result<Self, TransportError> {
        let required = |value: &Option<String>, field: &str| {
            value
                .clone()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| TransportError::Config(format!("telephony.{} is required", field)))
        };

        Self::new(
            required(&config.account_sid, "account_sid")?,
            required(&config.auth_token, "auth_token")?,
            required(&config.from_number, "from_number")?,
            config.api_base_url.clone(),
        )
    }

    fn calls_url(&self) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Calls.json",
            self.api_base_url.trim_end_matches('/'),
            self.account_sid
        )
    }

    fn form_for(&self, request: &PlaceCallRequest) -> Vec<(&'static str, String)> {
        let mut form = vec![
            ("To", request.to.clone()),
            ("From", self.from_number.clone()),
            ("Url", request.answer_url.clone()),
            ("Method", "POST".to_string()),
        ];

        if let Some(callback) = &request.status_callback_url {
            form.push(("StatusCallback", callback.clone()));
            form.push(("StatusCallbackMethod", "POST".to_string()));
            for event in ["answered", "completed"] {
                form.push(("StatusCallbackEvent", event.to_string()));
            }
        }

        form
    }

    async fn create_call(
        &self,
        request: &PlaceCallRequest,
    ) -> std::result::Result<CallResource, TransportError> {
        let response = self
            .client
            .post(self.calls_url())
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&self.form_for(request))
            .send()
            .await
            .map_err(|e| TransportError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body: Option<ApiError> = response.json().await.ok();
            let message = body
                .map(|e| match (e.code, e.message) {
                    (Some(code), Some(message)) => format!("{} (code {})", message, code),
                    (_, Some(message)) => message,
                    _ => status.to_string(),
                })
                .unwrap_or_else(|| status.to_string());
            return Err(TransportError::Provider {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| TransportError::Http(format!("Failed to parse call resource: {}", e)))
    }
}

#[async_trait]
impl SignalingProvider for TwilioSignaling {
    async fn place_call(&self, request: &PlaceCallRequest) -> Result<String> {
        let call = self.create_call(request).await?;

        tracing::info!(
            call_id = %request.call_id,
            provider_call_id = %call.sid,
            status = call.status.as_deref().unwrap_or("unknown"),
            "Twilio call created"
        );

        Ok(call.sid)
    }

    fn name(&self) -> &str {
        "twilio"
    }
}

/// Form body Twilio posts to the answer webhook
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceWebhook {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: Option<String>,
}

/// Form body Twilio posts to the status callback
#[derive(Debug, Clone, Deserialize)]
pub struct CallStatusCallback {
    #[serde(rename = "CallSid")]
    pub call_sid: String,
    #[serde(rename = "CallStatus")]
    pub call_status: String,
}

impl CallStatusCallback {
    /// Map a status update to a provider event; progress states map to `None`
    pub fn into_provider_event(self) -> Option<ProviderEvent> {
        let provider_call_id = self.call_sid;
        match self.call_status.as_str() {
            "in-progress" | "answered" => Some(ProviderEvent::Answered { provider_call_id }),
            "completed" => Some(ProviderEvent::Completed { provider_call_id }),
            "busy" | "failed" | "no-answer" | "canceled" => Some(ProviderEvent::Failed {
                provider_call_id,
                status: self.call_status,
            }),
            _ => None,
        }
    }
}
