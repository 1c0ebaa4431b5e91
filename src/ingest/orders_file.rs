use super::broker::{BrokerClient, BrokerError, BrokerOrder};
use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};

/// Broker client backed by a JSON array of filled orders, as exported by a
/// broker's order history
#[derive(Debug, Clone)]
pub struct JsonOrdersFile {
    path: PathBuf,
}

impl JsonOrdersFile {
    pub fn new(path: impl AsRef<Path>) -> Self {
        JsonOrdersFile {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl BrokerClient for JsonOrdersFile {
    fn fetch_filled_orders_since(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<BrokerOrder>, BrokerError> {
        let file = File::open(&self.path).map_err(|e| {
            let message = format!("{}: {}", self.path.display(), e);
            match e.kind() {
                io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => {
                    BrokerError::Permanent(message)
                }
                _ => BrokerError::Transient(message),
            }
        })?;
        let mut orders: Vec<BrokerOrder> = serde_json::from_reader(BufReader::new(file))
            .map_err(|e| BrokerError::Permanent(format!("{}: {}", self.path.display(), e)))?;

        // the checkpoint boundary is inclusive; idempotency absorbs the overlap
        orders.retain(|o| since.map_or(true, |since| o.filled_at >= since));
        orders.sort_by_key(|o| o.filled_at);
        Ok(orders)
    }

    fn broker_name(&self) -> &str {
        "orders-file"
    }
}
