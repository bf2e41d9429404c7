//! Append-only JSON Lines queue file.

use crate::error::QueueError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// FIFO of raw alerts, one compact JSON document per line.
///
/// All access from this process goes through one lock. The file is not
/// locked against other processes.
#[derive(Debug)]
pub struct AlertQueue {
    path: PathBuf,
    lock: Mutex<()>,
}

impl AlertQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one alert. The content is not interpreted.
    pub async fn enqueue(&self, alert: &Value) -> Result<(), QueueError> {
        let mut line = serde_json::to_string(alert)?;
        line.push('\n');

        let _guard = self.lock.lock().await;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Remove and return the oldest alert, or `None` when the queue is empty.
    pub async fn dequeue(&self) -> Result<Option<String>, QueueError> {
        let _guard = self.lock.lock().await;
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let mut lines = content.lines().filter(|l| !l.trim().is_empty());
        let Some(head) = lines.next() else {
            return Ok(None);
        };
        let head = head.to_string();
        let rest: String = lines.map(|l| format!("{l}\n")).collect();

        let tmp = self.path.with_extension("jsonl.tmp");
        fs::write(&tmp, rest).await?;
        fs::rename(&tmp, &self.path).await?;
        Ok(Some(head))
    }

    /// Number of queued alerts.
    pub async fn len(&self) -> Result<usize, QueueError> {
        let _guard = self.lock.lock().await;
        match fs::read_to_string(&self.path).await {
            Ok(c) => Ok(c.lines().filter(|l| !l.trim().is_empty()).count()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn is_empty(&self) -> Result<bool, QueueError> {
        Ok(self.len().await? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dequeues_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let queue = AlertQueue::new(dir.path().join("workbench/alerts.jsonl"));

        assert_eq!(queue.dequeue().await.unwrap(), None);

        queue.enqueue(&json!({"host": "r1"})).await.unwrap();
        queue.enqueue(&json!("plain text alert")).await.unwrap();
        queue.enqueue(&json!({"host": "r3"})).await.unwrap();
        assert_eq!(queue.len().await.unwrap(), 3);

        assert_eq!(queue.dequeue().await.unwrap().as_deref(), Some(r#"{"host":"r1"}"#));
        assert_eq!(queue.dequeue().await.unwrap().as_deref(), Some(r#""plain text alert""#));
        assert_eq!(queue.len().await.unwrap(), 1);
        assert_eq!(queue.dequeue().await.unwrap().as_deref(), Some(r#"{"host":"r3"}"#));
        assert!(queue.is_empty().await.unwrap());
        assert_eq!(queue.dequeue().await.unwrap(), None);
    }

    #[tokio::test]
    async fn skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.jsonl");
        std::fs::write(&path, "\n{\"a\":1}\n\n{\"b\":2}\n").unwrap();

        let queue = AlertQueue::new(&path);
        assert_eq!(queue.dequeue().await.unwrap().as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"b\":2}\n");
    }

    #[tokio::test]
    async fn concurrent_enqueues_keep_whole_lines() {
        let dir = tempfile::tempdir().unwrap();
        let queue = std::sync::Arc::new(AlertQueue::new(dir.path().join("alerts.jsonl")));

        let mut handles = Vec::new();
        for i in 0..20 {
            let queue = queue.clone();
            handles.push(tokio::spawn(async move {
                queue.enqueue(&json!({"n": i})).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(queue.len().await.unwrap(), 20);
        while let Some(line) = queue.dequeue().await.unwrap() {
            serde_json::from_str::<Value>(&line).unwrap();
        }
    }
}
