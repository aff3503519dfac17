use std::collections::VecDeque;

use crate::data::OperationId;

/// Strict FIFO of operations waiting for the throttle gate.
#[derive(Debug, Default)]
pub struct PendingQueue {
    items: VecDeque<OperationId>,
}

impl PendingQueue {
    pub fn new() -> Self { Self::default() }

    pub fn enqueue(&mut self, id: OperationId) { self.items.push_back(id); }

    pub fn dequeue(&mut self) -> Option<OperationId> { self.items.pop_front() }

    /// Remove a queued operation. Linear in queue depth.
    pub fn remove(&mut self, id: OperationId) -> bool {
        match self.items.iter().position(|queued| *queued == id) {
            Some(index) => {
                self.items.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: OperationId) -> bool { self.items.contains(&id) }

    /// Empty the queue, yielding operations in submission order.
    pub fn drain(&mut self) -> impl Iterator<Item = OperationId> + '_ { self.items.drain(..) }

    pub fn len(&self) -> usize { self.items.len() }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }
}
