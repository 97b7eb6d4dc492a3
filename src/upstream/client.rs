use axum::body::Bytes;
use backon::{ExponentialBuilder, Retryable};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::StatusCode;
use reqwest::header::{CONNECTION, HeaderMap, HeaderValue};
use serde_json::Value;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;
use walt_schema::MobileUploadRequest;

use super::api::{MasterApi, OutboundPayload};
use super::WALT_USER_AGENT;
use crate::config::{MasterConfig, Transport};
use crate::error::{IsRetryable, UploadError, WaltError};
use crate::image::{CapturedImageSet, ImageSlot};
use crate::utils::logging::body_preview;

/// Passthrough client for the master server `mobile-upload` endpoint.
///
/// Notes:
/// - One logical call per submission; retries only cover transport errors and upstream 5xx.
/// - Successful responses keep the exact upstream bytes; nothing is re-shaped.
#[derive(Clone)]
pub struct MasterClient {
    client: reqwest::Client,
    upload_url: Url,
    api_key: Arc<str>,
    transport: Transport,
    timeout: Duration,
    retry_policy: ExponentialBuilder,
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

/// A 2xx answer from the master server.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: StatusCode,
    /// Body bytes exactly as received; this is what gets relayed.
    pub body: Bytes,
    /// Parsed view of `body`, used for bookkeeping only.
    pub value: Value,
}

impl MasterClient {
    pub fn new(cfg: &MasterConfig) -> Result<Self, WaltError> {
        let client = build_client(cfg)?;
        Self::with_client(cfg, client)
    }

    pub fn with_client(cfg: &MasterConfig, client: reqwest::Client) -> Result<Self, WaltError> {
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(100))
            .with_max_delay(Duration::from_millis(300))
            .with_max_times(cfg.retry_max_times)
            .with_jitter();

        let limiter = NonZeroU32::new(cfg.max_rps).map(|rps| {
            let burst = NonZeroU32::new(cfg.max_rps.saturating_mul(2)).unwrap_or(rps);
            Arc::new(RateLimiter::direct(
                Quota::per_second(rps).allow_burst(burst),
            ))
        });

        Ok(Self {
            client,
            upload_url: cfg.upload_url()?,
            api_key: Arc::from(cfg.api_key.as_str()),
            transport: cfg.transport,
            timeout: cfg.timeout(),
            retry_policy,
            limiter,
        })
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Sends the image set to the master server and returns its JSON verdict unchanged.
    pub async fn submit(
        &self,
        session_id: &str,
        images: &CapturedImageSet,
    ) -> Result<UpstreamReply, UploadError> {
        let payload = self.prepare_payload(session_id, images)?;

        let op = || async {
            if let Some(limiter) = &self.limiter {
                limiter.until_ready().await;
            }

            let start = Instant::now();
            let req = MasterApi::build_request(
                &self.client,
                &self.upload_url,
                &self.api_key,
                &payload,
                self.timeout,
            )?;
            let resp = self.client.execute(req).await?;

            info!(
                session_id,
                transport = self.transport.as_str(),
                status = resp.status().as_u16(),
                elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
                "[Master] mobile-upload responded"
            );

            read_json_response(resp).await
        };

        op.retry(self.retry_policy)
            .when(|err: &UploadError| err.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("Master server retrying after error {} in {:?}", err, dur);
            })
            .await
    }

    fn prepare_payload(
        &self,
        session_id: &str,
        images: &CapturedImageSet,
    ) -> Result<OutboundPayload, UploadError> {
        match self.transport {
            Transport::Json => Ok(OutboundPayload::Json(MobileUploadRequest {
                session_id: session_id.to_string(),
                front_image_data: images.stripped(ImageSlot::Front).unwrap_or_default(),
                back_image_data: images.stripped(ImageSlot::Back),
                angled_image_data: images.stripped(ImageSlot::Angled),
            })),
            Transport::Multipart => Ok(OutboundPayload::Multipart {
                session_id: session_id.to_string(),
                images: images.decode()?,
            }),
        }
    }
}

async fn read_json_response(resp: reqwest::Response) -> Result<UpstreamReply, UploadError> {
    let status = resp.status();
    let bytes = resp.bytes().await?;

    if !status.is_success() {
        return Err(UploadError::UpstreamStatus {
            status,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        });
    }

    match serde_json::from_slice::<Value>(&bytes) {
        Ok(value) => Ok(UpstreamReply {
            status,
            body: bytes,
            value,
        }),
        Err(e) => {
            let raw = String::from_utf8_lossy(&bytes);
            debug!(
                error = %e,
                body = %body_preview(&raw),
                "[Master] response was not JSON"
            );
            Err(UploadError::UpstreamPayload(raw.into_owned()))
        }
    }
}

fn build_client(cfg: &MasterConfig) -> Result<reqwest::Client, WaltError> {
    let mut headers = HeaderMap::new();

    let mut builder = reqwest::Client::builder()
        .user_agent(WALT_USER_AGENT)
        .redirect(reqwest::redirect::Policy::none())
        .connect_timeout(cfg.connect_timeout())
        .timeout(cfg.timeout());

    if let Some(proxy_url) = cfg.proxy.as_ref() {
        builder = builder.proxy(reqwest::Proxy::all(proxy_url.as_str())?);
    }

    if cfg.enable_multiplexing {
        builder = builder.http2_adaptive_window(true);
    } else {
        headers.insert(CONNECTION, HeaderValue::from_static("close"));

        builder = builder
            .http1_only()
            .pool_max_idle_per_host(0)
            .pool_idle_timeout(Duration::from_secs(0));
    }

    Ok(builder.default_headers(headers).build()?)
}
