/// Named teardown actions, run newest first.
#[derive(Default)]
pub struct Subscriptions {
    disposers: Vec<(String, Box<dyn FnOnce() + Send>)>,
}

impl Subscriptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, disposer: impl FnOnce() + Send + 'static) {
        self.disposers.push((name.into(), Box::new(disposer)));
    }

    pub fn len(&self) -> usize {
        self.disposers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposers.is_empty()
    }

    /// Runs every disposer once, in reverse registration order.
    pub fn dispose_all(&mut self) {
        while let Some((name, disposer)) = self.disposers.pop() {
            tracing::debug!(subscription = %name, "disposing");
            disposer();
        }
    }
}

impl Drop for Subscriptions {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
