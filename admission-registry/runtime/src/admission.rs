use crate::{core, metrics::AdmissionMetrics};
use futures::future;
use http_body_util::BodyExt;
use hyper::{http, Request, Response};
use kube::core::{
    admission::{self, META_API_VERSION_V1, META_KIND},
    DynamicObject, TypeMeta,
};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

pub const VALIDATE_PATH: &str = "/validate";
pub const MUTATE_PATH: &str = "/mutate";

const JSON_CONTENT_TYPE: &str = "application/json";

/// Serves the `/validate` and `/mutate` admission webhooks.
#[derive(Clone, Debug)]
pub struct Admission {
    whitelist: core::Whitelist,
    metrics: AdmissionMetrics,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read request body: {0}")]
    Request(#[source] BoxError),

    #[error("empty data body")]
    EmptyBody,

    #[error("Content-Type invalid, expect application/json")]
    UnsupportedContentType(Option<String>),

    #[error("Can't decode body: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("Can't encode response: {0}")]
    Encode(#[source] serde_json::Error),
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
type AdmissionRequest = admission::AdmissionRequest<DynamicObject>;
type AdmissionResponse = admission::AdmissionResponse;
type AdmissionReview = admission::AdmissionReview<DynamicObject>;

type Body = http_body_util::Full<bytes::Bytes>;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Policy {
    Validate,
    Mutate,
}

/// The envelope fields of a review body, read leniently so that they can be
/// echoed even when the review itself fails to decode.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct EnvelopeTypes {
    api_version: String,
    kind: String,
}

// === impl Admission ===

impl<B> tower::Service<Request<B>> for Admission
where
    B: hyper::body::Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = Error;
    type Future = future::BoxFuture<'static, Result<Response<Body>, Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let (parts, body) = req.into_parts();
        trace!(method = %parts.method, uri = %parts.uri, headers = ?parts.headers);

        let admission = self.clone();
        Box::pin(async move {
            let bytes = body
                .collect()
                .await
                .map_err(|e| Error::Request(e.into()))?
                .to_bytes();
            let content_type = parts
                .headers
                .get(http::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok());
            Ok(admission.respond(parts.uri.path(), content_type, &bytes))
        })
    }
}

impl Admission {
    pub fn new(whitelist: core::Whitelist) -> Self {
        Self::with_metrics(whitelist, AdmissionMetrics::default())
    }

    pub(crate) fn with_metrics(whitelist: core::Whitelist, metrics: AdmissionMetrics) -> Self {
        Self { whitelist, metrics }
    }

    /// Produces the HTTP response for a fully-read request body.
    ///
    /// The body is decoded before the path is inspected, so a malformed body
    /// is reported the same way on every path.
    fn respond(&self, path: &str, content_type: Option<&str>, body: &[u8]) -> Response<Body> {
        let (review, object) = match decode(content_type, body) {
            Ok(decoded) => decoded,
            Err(Error::Decode(error)) => {
                warn!(%error, "Can't decode body");
                self.metrics.reject("decode");
                let mut rsp = AdmissionResponse::invalid(&error);
                rsp.result.code = 500;
                return self.encode(AdmissionReview {
                    types: envelope_types(body),
                    request: None,
                    response: Some(rsp),
                });
            }
            Err(error) => {
                match &error {
                    Error::UnsupportedContentType(content_type) => {
                        warn!(?content_type, "Content-Type is not {JSON_CONTENT_TYPE}");
                        self.metrics.reject("content_type");
                    }
                    _ => {
                        warn!(%error);
                        self.metrics.reject("empty_body");
                    }
                }
                return text_response(http::StatusCode::BAD_REQUEST, error.to_string());
            }
        };
        trace!(?review);

        let types = review.types.clone();
        let response = self.review(path, review, object);
        debug!(?response);
        self.encode(AdmissionReview {
            types,
            request: None,
            response,
        })
    }

    /// Routes a decoded review to the policy for `path`. Unknown paths produce
    /// no decision at all.
    ///
    /// `object` is the request's raw target object; each policy decodes it
    /// into the kind it expects.
    fn review(
        &self,
        path: &str,
        review: AdmissionReview,
        object: Option<Value>,
    ) -> Option<AdmissionResponse> {
        let policy = match path {
            VALIDATE_PATH => Policy::Validate,
            MUTATE_PATH => Policy::Mutate,
            _ => {
                debug!(%path, "No admission policy for path");
                return None;
            }
        };

        let req: AdmissionRequest = match review.try_into() {
            Ok(req) => req,
            Err(error) => {
                warn!(%error, "Invalid admission request");
                let mut rsp = AdmissionResponse::invalid(error);
                rsp.result.code = core::Decision::BAD_REQUEST;
                return Some(rsp);
            }
        };
        info!(
            kind = %req.kind.kind,
            ns = req.namespace.as_deref().unwrap_or_default(),
            name = %req.name,
            uid = %req.uid,
            "AdmissionReview"
        );

        let decision = match policy {
            Policy::Validate => core::validate::validate(&self.whitelist, object),
            Policy::Mutate => core::mutate::mutate(&req.kind.group, &req.kind.kind, object),
        };
        if !decision.allowed {
            info!(
                kind = %req.kind.kind,
                uid = %req.uid,
                message = decision.status.as_ref().map(|s| s.message.as_str()).unwrap_or_default(),
                "Denied"
            );
        }

        let rsp = into_response(&req, decision);
        self.metrics.review(policy.as_str(), rsp.allowed);
        Some(rsp)
    }

    fn encode(&self, review: AdmissionReview) -> Response<Body> {
        match serde_json::to_vec(&review) {
            Ok(bytes) => json_response(bytes),
            Err(error) => {
                let error = Error::Encode(error);
                warn!(%error);
                self.metrics.reject("encode");
                text_response(http::StatusCode::BAD_REQUEST, error.to_string())
            }
        }
    }
}

// === impl Policy ===

impl Policy {
    fn as_str(&self) -> &'static str {
        match self {
            Self::Validate => "validate",
            Self::Mutate => "mutate",
        }
    }
}

/// Decodes the review envelope, detaching the request's target objects so
/// that a malformed object fails its policy rather than the whole review.
fn decode(
    content_type: Option<&str>,
    body: &[u8],
) -> Result<(AdmissionReview, Option<Value>), Error> {
    if body.is_empty() {
        return Err(Error::EmptyBody);
    }

    if content_type != Some(JSON_CONTENT_TYPE) {
        return Err(Error::UnsupportedContentType(content_type.map(Into::into)));
    }

    let mut review = serde_json::from_slice::<Value>(body).map_err(Error::Decode)?;
    let object = match review.get_mut("request").and_then(Value::as_object_mut) {
        Some(req) => {
            if let Some(old) = req.get_mut("oldObject") {
                old.take();
            }
            req.get_mut("object").map(Value::take)
        }
        None => None,
    }
    .filter(|object| !object.is_null());

    let review = serde_json::from_value(review).map_err(Error::Decode)?;
    Ok((review, object))
}

fn envelope_types(body: &[u8]) -> TypeMeta {
    let EnvelopeTypes { api_version, kind } = serde_json::from_slice(body).unwrap_or_default();
    // Unreadable tags fall back to v1 rather than being left empty, so the
    // API server can still parse the reply.
    TypeMeta {
        api_version: if api_version.is_empty() {
            META_API_VERSION_V1.to_string()
        } else {
            api_version
        },
        kind: if kind.is_empty() {
            META_KIND.to_string()
        } else {
            kind
        },
    }
}

fn into_response(req: &AdmissionRequest, decision: core::Decision) -> AdmissionResponse {
    let core::Decision {
        allowed,
        status,
        patch,
    } = decision;

    let mut rsp = AdmissionResponse::from(req);
    rsp.allowed = allowed;
    if let Some(core::Status { code, message }) = status {
        rsp.result.code = code;
        rsp.result.message = message;
    }

    match patch {
        None => rsp,
        Some(patch) => rsp.with_patch(patch).unwrap_or_else(|error| {
            warn!(%error, uid = %req.uid, "Can't encode patch");
            let mut rsp = AdmissionResponse::from(req).deny(&error);
            rsp.result.code = core::Decision::BAD_REQUEST;
            rsp
        }),
    }
}

fn json_response(bytes: Vec<u8>) -> Response<Body> {
    Response::builder()
        .status(http::StatusCode::OK)
        .header(http::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
        .body(Body::from(bytes))
        .expect("admission review response must be valid")
}

fn text_response(status: http::StatusCode, text: String) -> Response<Body> {
    Response::builder()
        .status(status)
        .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .header(http::header::X_CONTENT_TYPE_OPTIONS, "nosniff")
        .body(Body::from(text))
        .expect("error response must be valid")
}
