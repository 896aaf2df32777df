/// A unit of work accepted by a [`Queue`](crate::Queue).
///
/// The key is only used for correlation (it is attached to the queue's tracing spans);
/// the queue never deduplicates by it.
pub trait Task: Send + 'static {
    fn key(&self) -> &str;
}

impl Task for String {
    #[inline]
    fn key(&self) -> &str {
        self
    }
}

impl Task for &'static str {
    #[inline]
    fn key(&self) -> &str {
        self
    }
}
