//! `POST /api`: transcribe, complete, synthesize.
//!
//! The three vendor calls run strictly in sequence. Validation and the
//! configuration check both happen before the first outbound request, and
//! the synthesized audio is piped to the caller without buffering.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{Multipart, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue};
use axum::response::Response;
use chrono::Utc;
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use voxrelay_core::types::{ConversationMessage, PipelineInput, PipelineRequest};
use voxrelay_media::{AudioStream, Synthesis};
use voxrelay_providers::CompletionRequest;

use crate::error::PipelineError;
use crate::form::parse_pipeline_form;
use crate::prompt::{render_system_prompt, CallerContext};
use crate::state::{GatewayState, Pipeline};

pub const TRANSCRIPT_HEADER: &str = "x-transcript";
pub const RESPONSE_HEADER: &str = "x-response";
const AUDIO_CONTENT_TYPE: &str = "audio/mpeg";

/// Output of one pipeline run. Nothing is kept after the response is sent.
pub struct PipelineResult {
    pub transcript: String,
    pub reply: String,
    pub audio: AudioStream,
}

pub async fn pipeline_handler(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    form: Result<Multipart, MultipartRejection>,
) -> Result<Response, PipelineError> {
    #[cfg(feature = "metrics")]
    crate::metrics::record_request();

    let multipart = form.map_err(|e| PipelineError::InvalidRequest(e.body_text()))?;
    let request = parse_pipeline_form(multipart).await?;

    let pipeline = state
        .pipeline
        .as_ref()
        .ok_or(PipelineError::ConfigurationMissing("Pipeline"))?;

    let caller = CallerContext::from_headers(&headers);
    let system = render_system_prompt(&pipeline.system_prompt, &caller, Utc::now());

    let span = info_span!(
        "pipeline",
        request_id = %Uuid::new_v4(),
        input = request.input.kind(),
        history = request.history.len(),
    );
    let started = Instant::now();
    let result = run_pipeline(pipeline, &system, request).instrument(span).await?;

    #[cfg(feature = "metrics")]
    crate::metrics::record_pipeline(started.elapsed().as_secs_f64());

    info!(
        transcript_len = result.transcript.len(),
        reply_len = result.reply.len(),
        latency_ms = started.elapsed().as_millis() as u64,
        "Pipeline response streaming"
    );

    audio_response(result)
}

/// Run the three stages against the injected services.
pub async fn run_pipeline(
    pipeline: &Pipeline,
    system: &str,
    request: PipelineRequest,
) -> Result<PipelineResult, PipelineError> {
    let transcript = transcribe(pipeline, request.input).await?;
    debug!(transcript = %transcript, "Transcript ready");

    let reply = complete(pipeline, system, &request.history, &transcript).await?;
    debug!(reply = %reply, "Completion ready");

    let audio = synthesize(pipeline, &reply).await?;

    Ok(PipelineResult {
        transcript,
        reply,
        audio,
    })
}

async fn transcribe(pipeline: &Pipeline, input: PipelineInput) -> Result<String, PipelineError> {
    let clip = match input {
        PipelineInput::Text(text) => return Ok(text),
        PipelineInput::Audio(clip) => clip,
    };

    let stage = Instant::now();
    let text = pipeline
        .transcriber
        .transcribe(&clip)
        .await
        .map_err(PipelineError::from_transcription)?;
    record_stage("transcription", stage);

    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::InvalidAudio);
    }
    Ok(text.to_string())
}

async fn complete(
    pipeline: &Pipeline,
    system: &str,
    history: &[ConversationMessage],
    transcript: &str,
) -> Result<String, PipelineError> {
    let request = CompletionRequest::for_turn(system, history, transcript);

    let stage = Instant::now();
    let reply = pipeline
        .chat
        .complete(&request)
        .await
        .map_err(PipelineError::from_completion)?;
    record_stage("completion", stage);

    reply
        .filter(|r| !r.is_empty())
        .ok_or(PipelineError::EmptyCompletion)
}

async fn synthesize(pipeline: &Pipeline, reply: &str) -> Result<AudioStream, PipelineError> {
    let stage = Instant::now();
    let outcome = pipeline
        .synthesizer
        .synthesize(reply)
        .await
        .map_err(PipelineError::Internal)?;
    record_stage("synthesis", stage);

    match outcome {
        Synthesis::Audio { stream, .. } => Ok(stream),
        Synthesis::Rejected(details) => Err(PipelineError::SynthesisError { details }),
        Synthesis::Failed(details) => Err(PipelineError::SynthesisFailed { details }),
    }
}

fn audio_response(result: PipelineResult) -> Result<Response, PipelineError> {
    let transcript = encoded_header(&result.transcript)?;
    let reply = encoded_header(&result.reply)?;

    Response::builder()
        .header(CONTENT_TYPE, AUDIO_CONTENT_TYPE)
        .header(TRANSCRIPT_HEADER, transcript)
        .header(RESPONSE_HEADER, reply)
        .body(Body::from_stream(result.audio))
        .map_err(|e| PipelineError::Internal(e.into()))
}

/// Percent-encode UTF-8 text so it survives as an ASCII header value.
fn encoded_header(text: &str) -> Result<HeaderValue, PipelineError> {
    HeaderValue::from_str(&urlencoding::encode(text)).map_err(|e| PipelineError::Internal(e.into()))
}

#[cfg(feature = "metrics")]
fn record_stage(stage: &'static str, started: Instant) {
    crate::metrics::record_stage(stage, started.elapsed().as_secs_f64());
}

#[cfg(not(feature = "metrics"))]
fn record_stage(stage: &'static str, started: Instant) {
    debug!(stage, elapsed_ms = started.elapsed().as_millis() as u64, "Stage complete");
}
