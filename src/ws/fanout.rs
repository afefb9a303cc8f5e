// 连接与兴趣键的双向映射 - 单把锁保证两边一致
// Bidirectional connection/interest maps - one lock keeps both sides consistent
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;
use uuid::Uuid;

/// 下行信封 {type, payload} / Outbound envelope {type, payload}
pub fn envelope(kind: &str, payload: Value) -> String {
    json!({ "type": kind, "payload": payload }).to_string()
}

#[derive(Default)]
struct Inner {
    senders: HashMap<Uuid, mpsc::UnboundedSender<String>>,
    interests_by_conn: HashMap<Uuid, HashSet<String>>,
    conns_by_interest: HashMap<String, HashSet<Uuid>>,
}

impl Inner {
    fn unsubscribe(&mut self, conn_id: &Uuid, keys: &[String]) {
        for key in keys {
            if let Some(conns) = self.conns_by_interest.get_mut(key) {
                conns.remove(conn_id);
                if conns.is_empty() {
                    self.conns_by_interest.remove(key);
                }
            }
        }
        if let Some(interests) = self.interests_by_conn.get_mut(conn_id) {
            for key in keys {
                interests.remove(key);
            }
            if interests.is_empty() {
                self.interests_by_conn.remove(conn_id);
            }
        }
    }
}

/// 扇出注册表 / Fan-out registry
#[derive(Default)]
pub struct FanoutRegistry {
    inner: Mutex<Inner>,
}

impl FanoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 新连接挂上发送端 / Attach the sender of a new connection
    pub async fn attach(&self, conn_id: Uuid, sender: mpsc::UnboundedSender<String>) {
        self.inner.lock().await.senders.insert(conn_id, sender);
    }

    /// 连接订阅一组兴趣键 / Subscribe a connection to interest keys
    pub async fn subscribe(&self, conn_id: Uuid, keys: &[String]) {
        let mut inner = self.inner.lock().await;
        for key in keys {
            inner
                .interests_by_conn
                .entry(conn_id)
                .or_default()
                .insert(key.clone());
            inner
                .conns_by_interest
                .entry(key.clone())
                .or_default()
                .insert(conn_id);
        }
    }

    /// 释放连接的全部兴趣，连接本身还在 / Release all interests, the connection itself stays
    pub async fn release_interests(&self, conn_id: &Uuid) -> Vec<String> {
        let mut inner = self.inner.lock().await;
        let keys: Vec<String> = inner
            .interests_by_conn
            .get(conn_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        inner.unsubscribe(conn_id, &keys);
        keys
    }

    /// 连接关闭，两边映射都剪干净 / Connection closed, both maps pruned
    pub async fn detach(&self, conn_id: &Uuid) {
        let mut inner = self.inner.lock().await;
        let keys: Vec<String> = inner
            .interests_by_conn
            .get(conn_id)
            .map(|s| s.iter().cloned().collect())
            .unwrap_or_default();
        inner.unsubscribe(conn_id, &keys);
        inner.senders.remove(conn_id);
        debug!("🔌 WebSocket connection detached: {}", conn_id);
    }

    /// 单发 / Direct send
    pub async fn send_to(&self, conn_id: &Uuid, message: String) {
        let mut inner = self.inner.lock().await;
        let dead = match inner.senders.get(conn_id) {
            Some(sender) => sender.send(message).is_err(),
            None => false,
        };
        if dead {
            inner.senders.remove(conn_id);
        }
    }

    /// 对某个兴趣键广播 / Broadcast to one interest key
    pub async fn broadcast(&self, key: &str, message: &str) {
        let mut inner = self.inner.lock().await;
        let Some(conns) = inner.conns_by_interest.get(key) else {
            return;
        };
        let mut dead = Vec::new();
        for conn_id in conns.clone() {
            match inner.senders.get(&conn_id) {
                Some(sender) if sender.send(message.to_string()).is_ok() => {}
                _ => dead.push(conn_id),
            }
        }
        for conn_id in dead {
            let keys: Vec<String> = inner
                .interests_by_conn
                .get(&conn_id)
                .map(|s| s.iter().cloned().collect())
                .unwrap_or_default();
            inner.unsubscribe(&conn_id, &keys);
            inner.senders.remove(&conn_id);
        }
    }

    /// 新机器人: 推给订阅了owner的连接，并顺手把新账户也订上
    /// New bot: push to connections on the owner key, and subscribe them to the new account
    pub async fn broadcast_new_bot(&self, owner: &str, mango_account: &str, bot: Value) {
        let message = envelope("newBot", json!({ "bot": bot }));
        let conns: Vec<Uuid> = {
            let inner = self.inner.lock().await;
            match inner.conns_by_interest.get(owner) {
                Some(conns) => conns.iter().copied().collect(),
                None => {
                    debug!("No active connections for owner: {}", owner);
                    return;
                }
            }
        };
        for conn_id in &conns {
            self.send_to(conn_id, message.clone()).await;
            self.subscribe(*conn_id, &[mango_account.to_string()]).await;
        }
    }

    /// 事件广播给订阅了该mango账户的连接 / Broadcast an event to connections on that mango account
    pub async fn broadcast_update(&self, mango_account: &str, event: Value) {
        let message = envelope("botUpdate", json!({ "event": event }));
        self.broadcast(mango_account, &message).await;
    }

    #[cfg(test)]
    pub async fn interest_count(&self, key: &str) -> usize {
        self.inner
            .lock()
            .await
            .conns_by_interest
            .get(key)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_broadcast_is_scoped_to_interest() {
        let registry = FanoutRegistry::new();
        let (tx_a, mut rx_a) = mpsc::unbounded_channel();
        let (tx_b, mut rx_b) = mpsc::unbounded_channel();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        registry.attach(a, tx_a).await;
        registry.attach(b, tx_b).await;
        registry.subscribe(a, &["acct1".to_string()]).await;
        registry.subscribe(b, &["acct2".to_string()]).await;

        registry.broadcast_update("acct1", json!({"x": 1})).await;

        let got = rx_a.try_recv().unwrap();
        assert!(got.contains("botUpdate"));
        assert!(rx_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detach_prunes_both_maps() {
        let registry = FanoutRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        registry.attach(conn, tx).await;
        registry
            .subscribe(conn, &["owner".to_string(), "acct".to_string()])
            .await;
        assert_eq!(registry.interest_count("acct").await, 1);

        registry.detach(&conn).await;
        assert_eq!(registry.interest_count("acct").await, 0);
        assert_eq!(registry.interest_count("owner").await, 0);
    }

    #[tokio::test]
    async fn test_release_keeps_connection_alive() {
        let registry = FanoutRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        registry.attach(conn, tx).await;
        registry.subscribe(conn, &["acct".to_string()]).await;

        let mut released = registry.release_interests(&conn).await;
        released.sort();
        assert_eq!(released, vec!["acct".to_string()]);

        // 连接还能收到定向消息 / The connection still receives direct messages
        registry.send_to(&conn, "ping".to_string()).await;
        assert_eq!(rx.try_recv().unwrap(), "ping");
    }

    #[tokio::test]
    async fn test_new_bot_subscribes_listener_to_account() {
        let registry = FanoutRegistry::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let conn = Uuid::new_v4();
        registry.attach(conn, tx).await;
        registry.subscribe(conn, &["owner1".to_string()]).await;

        registry
            .broadcast_new_bot("owner1", "acctX", json!({"id": 1}))
            .await;

        assert!(rx.try_recv().unwrap().contains("newBot"));
        assert_eq!(registry.interest_count("acctX").await, 1);
    }
}
