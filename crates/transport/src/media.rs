//! Media-stream wire protocol
//!
//! Messages are JSON text frames tagged by `event`. Only `start` and `media`
//! carry data the dialer acts on; `connected`, `mark` and `dtmf` are logged,
//! and unknown events are tolerated.

use crate::TransportError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::Deserialize;
use std::collections::HashMap;
use voice_dialer_core::{AudioEncoding, SampleRate};

/// Custom stream parameter that overrides the call SID as correlation key
pub const CORRELATION_PARAMETER: &str = "correlationToken";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum StreamMessage {
    Connected {
        #[serde(default)]
        protocol: Option<String>,
    },
    Start {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        start: StartMetadata,
    },
    Media {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
        media: MediaPayload,
    },
    Stop {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    Mark {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    Dtmf {
        #[serde(rename = "streamSid", default)]
        stream_sid: Option<String>,
    },
    #[serde(other)]
    Unknown,
}

impl StreamMessage {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamMessage::Connected { .. } => "connected",
            StreamMessage::Start { .. } => "start",
            StreamMessage::Media { .. } => "media",
            StreamMessage::Stop { .. } => "stop",
            StreamMessage::Mark { .. } => "mark",
            StreamMessage::Dtmf { .. } => "dtmf",
            StreamMessage::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMetadata {
    #[serde(default)]
    pub call_sid: Option<String>,
    #[serde(default)]
    pub stream_sid: Option<String>,
    #[serde(default)]
    pub custom_parameters: HashMap<String, String>,
    #[serde(default)]
    pub media_format: Option<MediaFormat>,
}

impl StartMetadata {
    /// Key used to find the call session this stream belongs to
    pub fn correlation_token(&self) -> Option<&str> {
        self.custom_parameters
            .get(CORRELATION_PARAMETER)
            .map(String::as_str)
            .filter(|t| !t.is_empty())
            .or_else(|| self.call_sid.as_deref().filter(|t| !t.is_empty()))
    }

    /// Announced encoding and rate, telephony μ-law at 8 kHz when absent
    pub fn audio_format(&self) -> Result<(AudioEncoding, SampleRate), TransportError> {
        let Some(format) = &self.media_format else {
            return Ok((AudioEncoding::Mulaw, SampleRate::Hz8000));
        };

        let encoding = AudioEncoding::from_mime(&format.encoding).ok_or_else(|| {
            TransportError::Protocol(format!("unsupported encoding '{}'", format.encoding))
        })?;
        let rate = SampleRate::from_hz(format.sample_rate).ok_or_else(|| {
            TransportError::Protocol(format!("unsupported sample rate {}", format.sample_rate))
        })?;

        Ok((encoding, rate))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFormat {
    pub encoding: String,
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u32,
}

fn default_channels() -> u32 {
    1
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MediaPayload {
    /// Base64 audio bytes
    pub payload: String,
    #[serde(default)]
    pub track: Option<String>,
    #[serde(default)]
    pub chunk: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl MediaPayload {
    pub fn decode(&self) -> Result<Vec<u8>, TransportError> {
        STANDARD
            .decode(self.payload.as_bytes())
            .map_err(|e| TransportError::Decode(e.to_string()))
    }

    /// Chunk counter announced by the sender, if numeric
    pub fn sequence(&self) -> Option<u64> {
        self.chunk.as_deref().and_then(|c| c.parse().ok())
    }

    /// Only inbound audio (the callee) is transcribed
    pub fn is_inbound(&self) -> bool {
        self.track.as_deref().map_or(true, |t| t == "inbound")
    }
}

pub fn parse_message(text: &str) -> Result<StreamMessage, TransportError> {
    serde_json::from_str(text).map_err(|e| TransportError::Protocol(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = r#"{
        "event": "start",
        "sequenceNumber": "1",
        "start": {
            "accountSid": "AC123",
            "streamSid": "MZ123",
            "callSid": "CA123",
            "tracks": ["inbound"],
            "mediaFormat": {"encoding": "audio/x-mulaw", "sampleRate": 8000, "channels": 1},
            "customParameters": {}
        },
        "streamSid": "MZ123"
    }"#;

    #[test]
    fn test_parse_start() {
        let StreamMessage::Start { stream_sid, start } = parse_message(START).unwrap() else {
            panic!("expected start");
        };
        assert_eq!(stream_sid.as_deref(), Some("MZ123"));
        assert_eq!(start.correlation_token(), Some("CA123"));
        assert_eq!(
            start.audio_format().unwrap(),
            (AudioEncoding::Mulaw, SampleRate::Hz8000)
        );
    }

    #[test]
    fn test_custom_parameter_overrides_call_sid() {
        let json = START.replace(
            r#""customParameters": {}"#,
            r#""customParameters": {"correlationToken": "call-42"}"#,
        );
        let StreamMessage::Start { start, .. } = parse_message(&json).unwrap() else {
            panic!("expected start");
        };
        assert_eq!(start.correlation_token(), Some("call-42"));
    }

    #[test]
    fn test_parse_media_and_decode() {
        let json = r#"{"event":"media","sequenceNumber":"3","media":{"track":"inbound","chunk":"2","timestamp":"5","payload":"//8A"},"streamSid":"MZ123"}"#;
        let StreamMessage::Media { media, .. } = parse_message(json).unwrap() else {
            panic!("expected media");
        };
        assert_eq!(media.decode().unwrap(), vec![0xFF, 0xFF, 0x00]);
        assert_eq!(media.sequence(), Some(2));
        assert!(media.is_inbound());
    }

    #[test]
    fn test_bad_payload_is_decode_error() {
        let payload = MediaPayload {
            payload: "not base64!!".to_string(),
            track: None,
            chunk: None,
            timestamp: None,
        };
        assert!(matches!(payload.decode(), Err(TransportError::Decode(_))));
    }

    #[test]
    fn test_unknown_and_malformed() {
        assert_eq!(
            parse_message(r#"{"event":"clear","streamSid":"MZ1"}"#).unwrap(),
            StreamMessage::Unknown
        );
        assert!(parse_message("{not json").is_err());
        assert!(parse_message(r#"{"event":"media"}"#).is_err());
    }

    #[test]
    fn test_unsupported_format() {
        let json = START.replace("audio/x-mulaw", "audio/opus");
        let StreamMessage::Start { start, .. } = parse_message(&json).unwrap() else {
            panic!("expected start");
        };
        assert!(start.audio_format().is_err());
    }
}
