use crate::ctx::Ctx;
use crate::types::{Scn, ZERO_SCN};

/// One in-flight message awaiting client confirmation. Messages that had
/// to be merged across ring chunks own their payload until confirmed;
/// in-chunk messages borrow from the ring and carry no payload here.
#[derive(Debug)]
pub struct QueuedMessage {
    pub id: u64,
    /// Ring chunk holding the start of the message.
    pub queue_id: u64,
    pub scn: Scn,
    pub length: u64,
    pub confirmed: bool,
    pub payload: Option<Vec<u8>>,
}

/// In-flight tracker: a binary min-heap keyed by message id. Ids are
/// assigned in build order, so `confirmed_scn` advances exactly when every
/// earlier message has been confirmed, whatever order confirmations
/// arrive in.
#[derive(Debug)]
pub struct DeliveryQueue {
    heap: Vec<QueuedMessage>,
    capacity: usize,
    pub confirmed_scn: Scn,
    pub sent_messages: u64,
    pub confirmed_messages: u64,
    pub max_queue_size: usize,
}

impl DeliveryQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            heap: Vec::new(),
            capacity,
            confirmed_scn: ZERO_SCN,
            sent_messages: 0,
            confirmed_messages: 0,
            max_queue_size: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Discards in-flight state after a session restart; the ring replays
    /// unreleased messages.
    pub fn clear(&mut self) {
        self.heap.clear();
    }

    /// Tracks a freshly sent message. Ids arrive in ascending order, so
    /// appending keeps the heap shape intact.
    pub fn create_message(&mut self, msg: QueuedMessage) {
        self.sent_messages += 1;
        self.heap.push(msg);
        if self.heap.len() > self.max_queue_size {
            self.max_queue_size = self.heap.len();
        }
    }

    /// Confirms a message — the head when `msg_id` is `None`, otherwise
    /// the given id, wherever it sits in the queue. Owned payloads are
    /// freed immediately. Then every confirmed message at the head is
    /// popped in id order, advancing `confirmed_scn`.
    ///
    /// Returns the largest ring-chunk id released by the pops, for
    /// `Builder::release_buffers` (0 when nothing popped).
    pub fn confirm_message(&mut self, ctx: &Ctx, msg_id: Option<u64>) -> u64 {
        let index = match msg_id {
            None => {
                if self.heap.is_empty() {
                    ctx.warning(70007, "trying to confirm empty message");
                    return 0;
                }
                0
            }
            Some(id) => match self.heap.iter().position(|msg| msg.id == id) {
                Some(index) => index,
                None => {
                    ctx.warning(70007, format!("trying to confirm unknown message: {id}"));
                    return 0;
                }
            },
        };

        self.heap[index].confirmed = true;
        self.heap[index].payload = None;
        self.confirmed_messages += 1;

        let mut max_queue_id = 0;
        while let Some(head) = self.heap.first() {
            if !head.confirmed {
                break;
            }
            max_queue_id = head.queue_id;
            self.confirmed_scn = head.scn;
            self.pop_head();
        }
        max_queue_id
    }

    /// Restores heap order after the queue was refilled out of id order
    /// (checkpoint reload). A sorted array is a valid min-heap.
    pub fn sort_queue(&mut self) {
        self.heap.sort_by_key(|msg| msg.id);
    }

    pub fn peek(&self) -> Option<&QueuedMessage> {
        self.heap.first()
    }

    fn pop_head(&mut self) {
        let last = self.heap.len() - 1;
        self.heap.swap(0, last);
        self.heap.pop();
        if !self.heap.is_empty() {
            self.sift_down(0);
        }
    }

    fn sift_down(&mut self, mut index: usize) {
        loop {
            let left = index * 2 + 1;
            let right = index * 2 + 2;
            let mut smallest = index;
            if left < self.heap.len() && self.heap[left].id < self.heap[smallest].id {
                smallest = left;
            }
            if right < self.heap.len() && self.heap[right].id < self.heap[smallest].id {
                smallest = right;
            }
            if smallest == index {
                return;
            }
            self.heap.swap(index, smallest);
            index = smallest;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn ctx() -> Ctx {
        Ctx::new(&EngineConfig::default())
    }

    fn msg(id: u64, scn: Scn) -> QueuedMessage {
        QueuedMessage {
            id,
            queue_id: id,
            scn,
            length: 8,
            confirmed: false,
            payload: None,
        }
    }

    #[test]
    fn out_of_order_confirmation_holds_back_scn() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(16);
        queue.create_message(msg(1, 100));
        queue.create_message(msg(2, 200));
        queue.create_message(msg(3, 300));

        // confirming the middle message must not advance anything
        queue.confirm_message(&ctx, Some(2));
        assert_eq!(queue.confirmed_scn, ZERO_SCN);
        assert_eq!(queue.len(), 3);

        // confirming the head releases both 1 and 2
        let released = queue.confirm_message(&ctx, Some(1));
        assert_eq!(queue.confirmed_scn, 200);
        assert_eq!(queue.len(), 1);
        assert_eq!(released, 2);

        queue.confirm_message(&ctx, Some(3));
        assert_eq!(queue.confirmed_scn, 300);
        assert!(queue.is_empty());
    }

    #[test]
    fn popping_order_is_ascending_by_id() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(64);
        for id in 1..=20u64 {
            queue.create_message(msg(id, id * 10));
        }
        // confirm in reverse, nothing pops until the head confirms
        for id in (2..=20u64).rev() {
            queue.confirm_message(&ctx, Some(id));
            assert_eq!(queue.confirmed_scn, ZERO_SCN);
        }
        queue.confirm_message(&ctx, Some(1));
        assert_eq!(queue.confirmed_scn, 200);
        assert!(queue.is_empty());
    }

    #[test]
    fn sift_down_at_sizes_one_and_two() {
        let ctx = ctx();

        let mut queue = DeliveryQueue::new(4);
        queue.create_message(msg(1, 100));
        queue.confirm_message(&ctx, None);
        assert!(queue.is_empty());
        assert_eq!(queue.confirmed_scn, 100);

        let mut queue = DeliveryQueue::new(4);
        queue.create_message(msg(1, 100));
        queue.create_message(msg(2, 200));
        queue.confirm_message(&ctx, Some(1));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.peek().map(|m| m.id), Some(2));
        assert_eq!(queue.confirmed_scn, 100);
        queue.confirm_message(&ctx, None);
        assert_eq!(queue.confirmed_scn, 200);
    }

    #[test]
    fn confirming_when_empty_warns_70007() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(4);
        queue.confirm_message(&ctx, None);
        assert_eq!(ctx.diagnostic_count(70007), 1);
        queue.confirm_message(&ctx, Some(42));
        assert_eq!(ctx.diagnostic_count(70007), 2);
    }

    #[test]
    fn allocated_payload_is_freed_on_confirm() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(4);
        queue.create_message(QueuedMessage {
            id: 1,
            queue_id: 0,
            scn: 100,
            length: 3,
            confirmed: false,
            payload: Some(vec![1, 2, 3]),
        });
        queue.create_message(QueuedMessage {
            id: 2,
            queue_id: 0,
            scn: 200,
            length: 3,
            confirmed: false,
            payload: Some(vec![4, 5, 6]),
        });
        // confirming a non-head message frees its copy right away
        queue.confirm_message(&ctx, Some(2));
        assert!(queue.heap.iter().all(|m| m.payload.is_none() || m.id == 1));
    }

    #[test]
    fn sort_queue_restores_heap_order_after_reload() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(16);
        // refill from a checkpoint in arbitrary order
        for id in [5u64, 1, 4, 2, 3] {
            queue.heap.push(msg(id, id * 100));
        }
        queue.sort_queue();
        for expected in 1..=5u64 {
            assert_eq!(queue.peek().map(|m| m.id), Some(expected));
            queue.confirm_message(&ctx, None);
        }
        assert_eq!(queue.confirmed_scn, 500);
    }

    #[test]
    fn max_queue_size_tracks_high_water_mark() {
        let ctx = ctx();
        let mut queue = DeliveryQueue::new(8);
        for id in 1..=5u64 {
            queue.create_message(msg(id, id));
        }
        for _ in 0..5 {
            queue.confirm_message(&ctx, None);
        }
        assert_eq!(queue.max_queue_size, 5);
        assert_eq!(queue.sent_messages, 5);
        assert_eq!(queue.confirmed_messages, 5);
        assert!(!queue.is_full());
    }
}
