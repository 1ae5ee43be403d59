use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use prost_reflect::ReflectMessage;
use tokio_stream::Stream;
use tonic::metadata::MetadataMap;
use tonic::Status;

use crate::call_meta::{CallMeta, RpcType};
use crate::metrics::DeprecationMetrics;
use crate::options::CallContext;

impl DeprecationMetrics {
    /// Observe the request message of a unary call.
    ///
    /// `full_method` is the wire form (`/package.Service/Method`), available
    /// from `tonic` request extensions or the service codegen.
    pub fn observe_unary<T: ReflectMessage>(
        &self,
        full_method: &str,
        metadata: Option<&MetadataMap>,
        request: &T,
    ) {
        self.observe_request(&CallMeta::new(full_method, RpcType::Unary), metadata, request);
    }

    /// Observe one received protobuf message under the given call identity.
    pub fn observe_request<T: ReflectMessage>(
        &self,
        meta: &CallMeta,
        metadata: Option<&MetadataMap>,
        request: &T,
    ) {
        let msg = request.transcode_to_dynamic();
        let ctx = CallContext { meta, metadata };
        self.observe(&ctx, &msg);
    }

    // Ran once when a stream opens; returns whether the method itself is
    // deprecated, which suppresses per-message reporting for the call.
    fn observe_stream_open(&self, meta: &CallMeta, metadata: Option<&MetadataMap>) -> bool {
        let ctx = CallContext { meta, metadata };
        self.report_method(&ctx, None)
    }

    fn observe_received<T: ReflectMessage>(
        &self,
        meta: &CallMeta,
        metadata: Option<&MetadataMap>,
        request: &T,
    ) {
        let msg = request.transcode_to_dynamic();
        let ctx = CallContext { meta, metadata };
        self.report_fields(&ctx, &msg);
    }
}

/// Inbound-stream wrapper for client-streaming and bidi RPCs.
///
/// The method-deprecation check runs once, when the wrapper is created;
/// every subsequently received `Ok` message is evaluated for deprecated
/// fields. Items and errors pass through verbatim, and nothing is reported
/// for a failed receive.
pub struct ReportedStream<S> {
    inner: S,
    metrics: Arc<DeprecationMetrics>,
    meta: CallMeta,
    metadata: Option<MetadataMap>,
    method_deprecated: bool,
}

impl<S> ReportedStream<S> {
    pub fn new(metrics: Arc<DeprecationMetrics>, meta: CallMeta, inner: S) -> Self {
        Self::with_metadata(metrics, meta, None, inner)
    }

    /// Like [`ReportedStream::new`], with call metadata made available to
    /// label extractors.
    pub fn with_metadata(
        metrics: Arc<DeprecationMetrics>,
        meta: CallMeta,
        metadata: Option<MetadataMap>,
        inner: S,
    ) -> Self {
        let method_deprecated = metrics.observe_stream_open(&meta, metadata.as_ref());
        Self {
            inner,
            metrics,
            meta,
            metadata,
            method_deprecated,
        }
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S, T> Stream for ReportedStream<S>
where
    S: Stream<Item = Result<T, Status>> + Unpin,
    T: ReflectMessage,
{
    type Item = Result<T, Status>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_next(cx);
        if !this.method_deprecated {
            if let Poll::Ready(Some(Ok(msg))) = &polled {
                this.metrics
                    .observe_received(&this.meta, this.metadata.as_ref(), msg);
            }
        }
        polled
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
