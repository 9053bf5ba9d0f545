//! Event bus for broadcasting workflow events to subscribers.
//!
//! Built on a tokio broadcast channel. Publishing is fire-and-forget: a
//! slow or absent subscriber never blocks or fails a workflow operation.

use dispatch_types::WorkflowEvent;
use tokio::sync::broadcast;

/// Broadcast channel for workflow events.
#[derive(Debug, Clone)]
pub struct EventBus {
	sender: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
	/// Creates a bus that buffers up to `capacity` events per subscriber.
	pub fn new(capacity: usize) -> Self {
		let (sender, _) = broadcast::channel(capacity);
		Self { sender }
	}

	/// Subscribes to all events published after this call.
	pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
		self.sender.subscribe()
	}

	/// Publishes an event. Dropped silently when nobody is subscribed.
	pub fn publish(&self, event: WorkflowEvent) {
		let _ = self.sender.send(event);
	}
}
