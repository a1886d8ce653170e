use engine_logging::engine_info;
use watch_core::{ChangeEvent, ChangeKind, CycleChanges, Episode};
use watch_engine::{DispatchError, Dispatcher, SubscriptionStore};

/// Standalone delivery: every change is written to the log together with the
/// number of subscribers who follow the title.
pub struct LoggingDispatcher {
    subscriptions: SubscriptionStore,
}

impl LoggingDispatcher {
    pub fn new(subscriptions: SubscriptionStore) -> Self {
        Self { subscriptions }
    }
}

impl Dispatcher for LoggingDispatcher {
    fn dispatch(&self, changes: &CycleChanges) -> Result<(), DispatchError> {
        for event in &changes.new_titles {
            engine_info!("New title: {} <{}>", event.title, event.url);
        }
        for event in &changes.updates {
            let subscribers = self.subscriptions.subscribers(&event.title).len();
            engine_info!(
                "{} [{} subscriber(s)] <{}>",
                describe(event),
                subscribers,
                event.url
            );
        }
        Ok(())
    }
}

pub fn describe(event: &ChangeEvent) -> String {
    match (&event.kind, &event.episode) {
        (ChangeKind::NewItem, Episode::Absent) => format!("New in updates: {}", event.title),
        (ChangeKind::NewItem, episode) => {
            format!("New in updates: {} episode {}", event.title, episode)
        }
        (_, Episode::Unknown) => format!("New episode of {} (number unknown)", event.title),
        (_, episode) if event.prev_episode.is_present() => format!(
            "{}: episode {} -> {}",
            event.title, event.prev_episode, episode
        ),
        (_, episode) => format!("{}: episode {}", event.title, episode),
    }
}
