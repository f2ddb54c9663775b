use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use stun::message::Message;
use tokio::sync::mpsc;

use crate::error::Error;

/// TransactionResult is the bag of values a completed STUN transaction
/// delivers to its waiter.
#[derive(Debug)]
pub struct TransactionResult {
    pub msg: Message,
    pub from: SocketAddr,
    pub err: Option<Error>,
}

impl Default for TransactionResult {
    fn default() -> Self {
        TransactionResult {
            msg: Message::default(),
            from: SocketAddr::new(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)), 0),
            err: None,
        }
    }
}

/// Transaction is one outstanding request awaiting its response.
#[derive(Debug)]
pub struct Transaction {
    pub key: String,
    pub raw: Vec<u8>,
    pub to: SocketAddr,
    result_ch_tx: Option<mpsc::Sender<TransactionResult>>,
    result_ch_rx: Option<mpsc::Receiver<TransactionResult>>,
}

impl Transaction {
    pub fn new(key: String, raw: Vec<u8>, to: SocketAddr) -> Self {
        let (tx, rx) = mpsc::channel(1);
        Transaction {
            key,
            raw,
            to,
            result_ch_tx: Some(tx),
            result_ch_rx: Some(rx),
        }
    }

    /// Hands the receiving half to the waiter. Valid exactly once.
    pub fn get_result_channel(&mut self) -> Option<mpsc::Receiver<TransactionResult>> {
        self.result_ch_rx.take()
    }

    /// Delivers the result; returns false when nobody is listening.
    pub async fn write_result(&self, res: TransactionResult) -> bool {
        if let Some(result_ch) = &self.result_ch_tx {
            result_ch.send(res).await.is_ok()
        } else {
            false
        }
    }

    pub fn close(&mut self) {
        self.result_ch_tx.take();
    }
}

/// TransactionMap indexes outstanding transactions by transaction-id key.
#[derive(Default, Debug)]
pub struct TransactionMap {
    tr_map: HashMap<String, Transaction>,
}

impl TransactionMap {
    pub fn new() -> TransactionMap {
        TransactionMap {
            tr_map: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: String, tr: Transaction) {
        self.tr_map.insert(key, tr);
    }

    pub fn get(&mut self, key: &str) -> Option<&mut Transaction> {
        self.tr_map.get_mut(key)
    }

    pub fn delete(&mut self, key: &str) -> Option<Transaction> {
        self.tr_map.remove(key)
    }

    pub fn close_and_delete_all(&mut self) {
        for tr in self.tr_map.values_mut() {
            tr.close();
        }
        self.tr_map.clear();
    }

    pub fn size(&self) -> usize {
        self.tr_map.len()
    }
}
