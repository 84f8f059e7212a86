use std::fmt::Debug;

use async_trait::async_trait;
use bytes::Bytes;
use opentelemetry::otel_debug;
use opentelemetry_http::{HttpClient, HttpError, Request, Response};

use crate::context::TraceContext;
use crate::interceptor::RequestInterceptor;
use crate::target::HttpHost;

/// An [`HttpClient`] that traces every request sent through the wrapped
/// client.
///
/// The target host is taken from the request URI, so only requests with an
/// absolute URI are traced. Responses and errors of the inner client are
/// returned unchanged.
#[derive(Debug)]
pub struct TracedHttpClient<C, T> {
    inner: C,
    interceptor: RequestInterceptor<T>,
}

impl<C, T: TraceContext> TracedHttpClient<C, T> {
    /// Wrap `inner`, using the default interceptor configuration.
    pub fn new(inner: C, trace_context: T) -> Self {
        TracedHttpClient::with_interceptor(inner, RequestInterceptor::new(trace_context))
    }

    pub fn with_interceptor(inner: C, interceptor: RequestInterceptor<T>) -> Self {
        TracedHttpClient { inner, interceptor }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn interceptor(&self) -> &RequestInterceptor<T> {
        &self.interceptor
    }
}

#[async_trait]
impl<C, T> HttpClient for TracedHttpClient<C, T>
where
    C: HttpClient,
    T: TraceContext + Debug + Send + Sync,
    T::Span: Send,
{
    async fn send_bytes(&self, mut request: Request<Bytes>) -> Result<Response<Bytes>, HttpError> {
        let host = match HttpHost::try_from(request.uri()) {
            Ok(host) => Some(host),
            Err(err) => {
                otel_debug!(
                    name: "TracedHttpClient.UnresolvedHost",
                    error = format!("{err}")
                );
                None
            }
        };

        let mut span = self.interceptor.before(host.as_ref(), Some(&mut request));
        match self.inner.send_bytes(request).await {
            Ok(response) => {
                self.interceptor.after(span, Some(&response));
                Ok(response)
            }
            Err(err) => {
                self.interceptor.on_exception(span.as_mut(), &*err);
                self.interceptor.after::<Bytes>(span, None);
                Err(err)
            }
        }
    }
}
