use bytes::Bytes;

/// Events waiting for the next flush, concatenated in arrival order.
///
/// Lines are stored back to back without a delimiter; each HEC event is a
/// self-delimiting JSON object.
#[derive(Debug, Default)]
pub struct BatchBuffer {
    payload: String,
    count: usize,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: &str) {
        self.payload.push_str(event);
        self.count += 1;
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn size_bytes(&self) -> usize {
        self.payload.len()
    }

    /// Take the payload out, leaving the buffer empty.
    pub fn take(&mut self) -> Bytes {
        self.count = 0;
        Bytes::from(std::mem::take(&mut self.payload))
    }
}
