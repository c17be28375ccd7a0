use crate::services::settlement::Notifier;
use crate::types::{ServerMessage, SettlementEvent};
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

/// A client's subscription information.
pub struct ClientSubscription {
    /// Subscribed account IDs.
    pub accounts: HashSet<String>,
    /// Channel to send messages to the client.
    pub tx: mpsc::UnboundedSender<String>,
}

/// Manages WebSocket client subscriptions, keyed by account.
pub struct RoomManager {
    /// Client subscriptions keyed by client ID.
    pub clients: DashMap<Uuid, ClientSubscription>,
    /// Account rooms: account ID -> set of client IDs.
    rooms: DashMap<String, HashSet<Uuid>>,
}

impl RoomManager {
    /// Create a new room manager.
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            clients: DashMap::new(),
            rooms: DashMap::new(),
        })
    }

    /// Register a new client.
    pub fn register(&self, tx: mpsc::UnboundedSender<String>) -> Uuid {
        let client_id = Uuid::new_v4();
        self.clients.insert(
            client_id,
            ClientSubscription {
                accounts: HashSet::new(),
                tx,
            },
        );
        client_id
    }

    /// Unregister a client and remove from all rooms.
    pub fn unregister(&self, client_id: Uuid) {
        if let Some((_, subscription)) = self.clients.remove(&client_id) {
            for account in subscription.accounts {
                if let Some(mut room) = self.rooms.get_mut(&account) {
                    room.remove(&client_id);
                }
            }
        }
    }

    /// Subscribe a client to accounts.
    pub fn subscribe(&self, client_id: Uuid, accounts: &[String]) -> Vec<String> {
        let mut subscribed = Vec::new();

        if let Some(mut client) = self.clients.get_mut(&client_id) {
            for account in accounts {
                if client.accounts.insert(account.clone()) {
                    subscribed.push(account.clone());

                    self.rooms
                        .entry(account.clone())
                        .or_insert_with(HashSet::new)
                        .insert(client_id);
                }
            }
        }

        subscribed
    }

    /// Unsubscribe a client from accounts.
    pub fn unsubscribe(&self, client_id: Uuid, accounts: &[String]) -> Vec<String> {
        let mut unsubscribed = Vec::new();

        if let Some(mut client) = self.clients.get_mut(&client_id) {
            for account in accounts {
                if client.accounts.remove(account) {
                    unsubscribed.push(account.clone());

                    if let Some(mut room) = self.rooms.get_mut(account) {
                        room.remove(&client_id);
                    }
                }
            }
        }

        unsubscribed
    }

    /// Get the senders of all clients subscribed to an account.
    pub fn get_subscribers(&self, account: &str) -> Vec<mpsc::UnboundedSender<String>> {
        let client_ids: Vec<Uuid> = self
            .rooms
            .get(account)
            .map(|room| room.iter().copied().collect())
            .unwrap_or_default();

        client_ids
            .iter()
            .filter_map(|id| self.clients.get(id).map(|c| c.tx.clone()))
            .collect()
    }

    /// Broadcast a message to all clients subscribed to an account.
    pub fn broadcast(&self, account: &str, message: &str) {
        let senders = self.get_subscribers(account);
        for tx in senders {
            let _ = tx.send(message.to_string());
        }
    }

    /// Get the number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Get the number of accounts with at least one subscriber.
    pub fn room_count(&self) -> usize {
        self.rooms.iter().filter(|r| !r.is_empty()).count()
    }
}

impl Notifier for RoomManager {
    fn notify(&self, account_id: &str, event: &SettlementEvent) {
        let msg = ServerMessage::Settlement {
            data: event.clone(),
        };
        match serde_json::to_string(&msg) {
            Ok(json) => self.broadcast(account_id, &json),
            Err(e) => debug!("Failed to serialize settlement event: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Trade, TradeDirection};

    #[tokio::test]
    async fn test_subscribe_and_broadcast() {
        let manager = RoomManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let client_id = manager.register(tx);
        let subscribed = manager.subscribe(client_id, &["acct-1".to_string()]);
        assert_eq!(subscribed, vec!["acct-1".to_string()]);

        manager.broadcast("acct-1", "hello");
        assert_eq!(rx.recv().await.unwrap(), "hello");

        // Not subscribed to this account.
        manager.broadcast("acct-2", "ignored");
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_unregister_leaves_rooms() {
        let manager = RoomManager::new();
        let (tx, _rx) = mpsc::unbounded_channel();

        let client_id = manager.register(tx);
        manager.subscribe(client_id, &["acct-1".to_string()]);
        assert_eq!(manager.client_count(), 1);
        assert_eq!(manager.room_count(), 1);

        manager.unregister(client_id);
        assert_eq!(manager.client_count(), 0);
        assert_eq!(manager.room_count(), 0);
    }

    #[tokio::test]
    async fn test_notify_sends_settlement_message() {
        let manager = RoomManager::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let account = Account::new(1000.0);
        let client_id = manager.register(tx);
        manager.subscribe(client_id, &[account.id.clone()]);

        let trade = Trade::new(
            account.id.clone(),
            "eurusd".to_string(),
            TradeDirection::Call,
            100.0,
            60,
            1.1,
            0.8,
        );
        let event = SettlementEvent::new(trade, account.snapshot());
        manager.notify(&account.id, &event);

        let json = rx.recv().await.unwrap();
        assert!(json.contains("\"type\":\"settlement\""));
        assert!(json.contains(&account.id));
    }
}
