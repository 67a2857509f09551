/// Receiver for human-readable status lines, one per call, in pipeline order.
pub type ProgressSink<'a> = &'a (dyn Fn(&str) + Send + Sync);

/// Forwards to an optional sink and mirrors every line into tracing.
#[derive(Clone, Copy)]
pub(crate) struct Progress<'a> {
    sink: Option<ProgressSink<'a>>,
}

impl<'a> Progress<'a> {
    pub(crate) fn new(sink: Option<ProgressSink<'a>>) -> Self { Self { sink } }

    pub(crate) fn emit(&self, msg: &str) {
        tracing::debug!(target: "engine::progress", "{msg}");
        if let Some(sink) = self.sink { sink(msg); }
    }
}
