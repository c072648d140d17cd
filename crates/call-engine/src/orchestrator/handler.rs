//! Per-channel event dispatch
//!
//! Events for distinct channels may progress concurrently, but events for
//! the same channel are serialized: each channel id owns a dedicated worker
//! task that applies its events in arrival order. Workers wind down after a
//! terminal event (`StasisEnd` or `ChannelDestroyed`) and are respawned if a
//! straggler arrives later.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

use acd_ari_client::AriEvent;

use super::core::CallCenterEngine;

pub struct EventDispatcher {
    engine: CallCenterEngine,
    workers: Arc<DashMap<String, mpsc::UnboundedSender<AriEvent>>>,
}

impl EventDispatcher {
    pub fn new(engine: CallCenterEngine) -> Self {
        Self {
            engine,
            workers: Arc::new(DashMap::new()),
        }
    }

    /// Hand an event to the worker owning its channel.
    pub fn dispatch(&self, event: AriEvent) {
        let Some(channel_id) = event.channel_id().map(str::to_string) else {
            return;
        };

        let sender = self
            .workers
            .entry(channel_id.clone())
            .or_insert_with(|| self.spawn_worker(channel_id.clone()))
            .clone();
        if let Err(unsent) = sender.send(event) {
            // The worker wound down between lookup and send; start a fresh
            // one and hand the event over.
            let sender = self.spawn_worker(channel_id.clone());
            let _ = sender.send(unsent.0);
            self.workers.insert(channel_id, sender);
        }
    }

    fn spawn_worker(&self, channel_id: String) -> mpsc::UnboundedSender<AriEvent> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<AriEvent>();
        let engine = self.engine.clone();
        let workers = Arc::clone(&self.workers);
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let terminal = matches!(
                    &event,
                    AriEvent::StasisEnd { .. } | AriEvent::ChannelDestroyed { .. }
                );
                engine.handle_event(event).await;
                if terminal {
                    break;
                }
            }
            workers.remove(&channel_id);
        });
        sender
    }
}
