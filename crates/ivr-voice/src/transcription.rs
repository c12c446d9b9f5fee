//! Transcript acquisition.
//!
//! The callback strategy receives the finished transcript with the capture
//! event. The poll strategy receives only a recording reference and asks the
//! provider for the transcript at a fixed pace until it shows up or the
//! attempt budget runs out.

use crate::config::TwilioConfig;
use crate::error::VoiceError;
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// What a capture event carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedSpeech {
    /// Final transcript text recognized by the provider.
    Transcript(String),
    /// Reference to a recording whose transcript is still pending.
    Reference(String),
}

impl CapturedSpeech {
    /// Returns `true` if there is nothing to resolve: blank text or a blank
    /// reference.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Transcript(text) => text.trim().is_empty(),
            Self::Reference(reference) => reference.trim().is_empty(),
        }
    }

    pub fn needs_polling(&self) -> bool {
        matches!(self, Self::Reference(_))
    }
}

/// Returns `true` if `reference` looks like a provider recording id.
///
/// References arrive in unauthenticated webhooks and end up in a signed
/// request path, so only ASCII letters and digits are accepted.
pub fn is_recording_reference(reference: &str) -> bool {
    !reference.is_empty() && reference.bytes().all(|b| b.is_ascii_alphanumeric())
}

/// A status lookup for a pending transcript.
#[async_trait]
pub trait TranscriptLookup: Send + Sync {
    /// Returns the transcript if it is ready, `None` otherwise.
    async fn fetch(&self, reference: &str) -> Result<Option<String>, VoiceError>;
}

#[derive(Deserialize)]
struct TranscriptionList {
    #[serde(default)]
    transcriptions: Vec<TranscriptionResource>,
}

#[derive(Deserialize)]
struct TranscriptionResource {
    #[serde(default)]
    transcription_text: Option<String>,
}

/// Looks up recording transcriptions through the Twilio REST API.
#[derive(Debug, Clone)]
pub struct TwilioTranscriptLookup {
    client: reqwest::Client,
    config: TwilioConfig,
}

impl TwilioTranscriptLookup {
    pub fn new(config: TwilioConfig) -> Result<Self, VoiceError> {
        if !config.is_configured() {
            return Err(VoiceError::Config(
                "twilio.account_sid and twilio.auth_token are required for polling".to_string(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self { client, config })
    }

    fn transcriptions_url(&self, reference: &str) -> String {
        format!(
            "{}/2010-04-01/Accounts/{}/Recordings/{}/Transcriptions.json",
            self.config.api_base.trim_end_matches('/'),
            self.config.account_sid,
            reference
        )
    }
}

#[async_trait]
impl TranscriptLookup for TwilioTranscriptLookup {
    async fn fetch(&self, reference: &str) -> Result<Option<String>, VoiceError> {
        if !is_recording_reference(reference) {
            return Err(VoiceError::Lookup(format!(
                "invalid recording reference {:?}",
                reference
            )));
        }

        let response = self
            .client
            .get(self.transcriptions_url(reference))
            .basic_auth(&self.config.account_sid, Some(&self.config.auth_token))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(VoiceError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let list: TranscriptionList = response
            .json()
            .await
            .map_err(|e| VoiceError::Lookup(format!("unreadable transcription list: {}", e)))?;

        Ok(list
            .transcriptions
            .into_iter()
            .filter_map(|t| t.transcription_text)
            .map(|text| text.trim().to_string())
            .find(|text| !text.is_empty()))
    }
}

/// One in-flight resolution attempt for a recording reference.
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub reference: String,
    pub attempts: u32,
    pub delay: Duration,
    pub max_attempts: u32,
}

impl TranscriptionRequest {
    pub fn new(reference: impl Into<String>, delay: Duration, max_attempts: u32) -> Self {
        Self {
            reference: reference.into(),
            attempts: 0,
            delay,
            max_attempts,
        }
    }

    pub fn exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }
}

/// Polls a [`TranscriptLookup`] at a fixed interval with a bounded attempt
/// budget.
#[derive(Clone)]
pub struct TranscriptPoller {
    lookup: Arc<dyn TranscriptLookup>,
    interval: Duration,
    max_attempts: u32,
}

impl TranscriptPoller {
    pub fn new(lookup: Arc<dyn TranscriptLookup>, interval: Duration, max_attempts: u32) -> Self {
        Self {
            lookup,
            interval,
            max_attempts,
        }
    }

    /// Waits for the transcript of `reference`.
    ///
    /// Each attempt sleeps for the interval, then looks up. The first
    /// non-blank transcript wins. A failed lookup uses up its attempt.
    ///
    /// # Errors
    ///
    /// Returns `VoiceError::TranscriptionTimeout` once every attempt has come
    /// back without a transcript.
    pub async fn resolve(&self, reference: &str) -> Result<String, VoiceError> {
        let mut request = TranscriptionRequest::new(reference, self.interval, self.max_attempts);

        while !request.exhausted() {
            tokio::time::sleep(request.delay).await;
            request.attempts += 1;

            match self.lookup.fetch(&request.reference).await {
                Ok(Some(text)) if !text.trim().is_empty() => {
                    info!(
                        reference = %request.reference,
                        attempts = request.attempts,
                        "transcript ready"
                    );
                    return Ok(text.trim().to_string());
                }
                Ok(_) => {
                    debug!(
                        reference = %request.reference,
                        attempt = request.attempts,
                        "transcript not ready"
                    );
                }
                Err(e) => {
                    warn!(
                        reference = %request.reference,
                        attempt = request.attempts,
                        error = %e,
                        "transcript lookup failed"
                    );
                }
            }
        }

        Err(VoiceError::TranscriptionTimeout {
            attempts: request.attempts,
        })
    }
}

/// The statically selected transcript-acquisition strategy.
#[derive(Clone)]
pub enum Transcriber {
    Callback,
    Poll(TranscriptPoller),
}

impl Transcriber {
    pub fn is_polling(&self) -> bool {
        matches!(self, Self::Poll(_))
    }

    /// Resolves captured speech to transcript text.
    ///
    /// A transcript carried by the event is used as-is under either
    /// strategy. A recording reference requires the poll strategy.
    pub async fn resolve(&self, captured: &CapturedSpeech) -> Result<String, VoiceError> {
        match (self, captured) {
            (_, CapturedSpeech::Transcript(text)) => Ok(text.trim().to_string()),
            (Self::Poll(_), CapturedSpeech::Reference(reference))
                if !is_recording_reference(reference.trim()) =>
            {
                Err(VoiceError::Lookup(format!(
                    "invalid recording reference {:?}",
                    reference
                )))
            }
            (Self::Poll(poller), CapturedSpeech::Reference(reference)) => {
                poller.resolve(reference.trim()).await
            }
            (Self::Callback, CapturedSpeech::Reference(reference)) => Err(VoiceError::Config(
                format!(
                    "recording {} arrived but transcript polling is not enabled",
                    reference
                ),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    /// Answers "not ready" until `ready_on`, then returns the text.
    struct Scripted {
        calls: AtomicU32,
        ready_on: u32,
        text: &'static str,
    }

    impl Scripted {
        fn new(ready_on: u32, text: &'static str) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                ready_on,
                text,
            })
        }
    }

    #[async_trait]
    impl TranscriptLookup for Scripted {
        async fn fetch(&self, _reference: &str) -> Result<Option<String>, VoiceError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n >= self.ready_on {
                Ok(Some(self.text.to_string()))
            } else {
                Ok(Some(String::new()))
            }
        }
    }

    struct Broken(AtomicU32);

    #[async_trait]
    impl TranscriptLookup for Broken {
        async fn fetch(&self, _reference: &str) -> Result<Option<String>, VoiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(VoiceError::Lookup("unreachable".to_string()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_non_empty_transcript() {
        let lookup = Scripted::new(3, "  What are your hours?  ");
        let poller = TranscriptPoller::new(lookup.clone(), Duration::from_secs(1), 10);

        let start = Instant::now();
        let text = poller.resolve("RE123").await.unwrap();

        assert_eq!(text, "What are your hours?");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_millis(3_100));
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_after_budget() {
        let lookup = Scripted::new(u32::MAX, "never");
        let poller = TranscriptPoller::new(lookup.clone(), Duration::from_secs(1), 10);

        let start = Instant::now();
        let err = poller.resolve("RE123").await.unwrap_err();

        assert!(matches!(err, VoiceError::TranscriptionTimeout { attempts: 10 }));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 10);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_millis(10_100));
    }

    #[tokio::test(start_paused = true)]
    async fn lookup_errors_use_up_attempts() {
        let lookup = Arc::new(Broken(AtomicU32::new(0)));
        let poller = TranscriptPoller::new(lookup.clone(), Duration::from_millis(100), 4);

        let err = poller.resolve("RE9").await.unwrap_err();
        assert!(matches!(err, VoiceError::TranscriptionTimeout { attempts: 4 }));
        assert_eq!(lookup.0.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn callback_uses_event_text() {
        let text = Transcriber::Callback
            .resolve(&CapturedSpeech::Transcript(" Hello ".to_string()))
            .await
            .unwrap();
        assert_eq!(text, "Hello");
    }

    #[tokio::test]
    async fn callback_rejects_recording_reference() {
        let err = Transcriber::Callback
            .resolve(&CapturedSpeech::Reference("RE1".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, VoiceError::Config(_)));
    }

    #[tokio::test]
    async fn poll_rejects_malformed_reference_without_lookup() {
        let lookup = Scripted::new(1, "unused");
        let transcriber = Transcriber::Poll(TranscriptPoller::new(
            lookup.clone(),
            Duration::from_millis(10),
            3,
        ));

        for reference in ["../../Calls", "RE1?PageSize=1000", "RE1/Transcriptions"] {
            let err = transcriber
                .resolve(&CapturedSpeech::Reference(reference.to_string()))
                .await
                .unwrap_err();
            assert!(matches!(err, VoiceError::Lookup(_)), "{reference}");
        }
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn recording_reference_shape() {
        assert!(is_recording_reference("RE0123456789abcdef0123456789abcdef"));
        assert!(!is_recording_reference(""));
        assert!(!is_recording_reference("RE%2F.."));
        assert!(!is_recording_reference("RE 1"));
    }

    #[test]
    fn empty_capture_detection() {
        assert!(CapturedSpeech::Transcript("   ".to_string()).is_empty());
        assert!(CapturedSpeech::Reference(String::new()).is_empty());
        assert!(!CapturedSpeech::Transcript("hi".to_string()).is_empty());
        assert!(CapturedSpeech::Reference("RE1".to_string()).needs_polling());
    }
}
