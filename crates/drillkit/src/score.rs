use drillcore::{EventBus, FlowError, SubscriptionId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

/// Points awarded per published event name
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScoreRules {
    pub points: BTreeMap<String, i64>,
}

impl ScoreRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, event_name: impl Into<String>, points: i64) -> Self {
        self.points.insert(event_name.into(), points);
        self
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, FlowError> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[derive(Default)]
struct ScoreCard {
    total: i64,
    hits: Vec<(String, i64)>,
}

/// Bus subscriber that tallies points as events are published.
///
/// Purely observational: it never publishes and never touches engine state.
pub struct ScoreRecorder {
    card: Arc<Mutex<ScoreCard>>,
    subscriptions: Vec<SubscriptionId>,
}

impl ScoreRecorder {
    pub fn attach(bus: &EventBus, rules: &ScoreRules) -> Self {
        let card = Arc::new(Mutex::new(ScoreCard::default()));
        let subscriptions = rules
            .points
            .iter()
            .map(|(name, &points)| {
                let card = Arc::clone(&card);
                bus.subscribe(name.clone(), move |event: &str| {
                    let mut card = card.lock().unwrap_or_else(PoisonError::into_inner);
                    card.total += points;
                    card.hits.push((event.to_string(), points));
                })
            })
            .collect();
        tracing::debug!("Score recorder watching {} events", rules.points.len());
        Self {
            card,
            subscriptions,
        }
    }

    pub fn total(&self) -> i64 {
        self.card
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .total
    }

    /// Scored events in publish order.
    pub fn hits(&self) -> Vec<(String, i64)> {
        self.card
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .hits
            .clone()
    }

    /// Stop listening. Returns how many subscriptions were still live.
    pub fn detach(self, bus: &EventBus) -> usize {
        self.subscriptions
            .into_iter()
            .filter(|id| bus.unsubscribe(*id))
            .count()
    }
}
