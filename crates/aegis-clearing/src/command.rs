use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::info;

use aegis_core::error::AegisError;
use aegis_core::types::{Address, Amount, TxHash};
use aegis_ledger::Transfer;

use crate::core::{
    ClearingCore, QuoteEntry, SettleResponse, SlashResponse, SubscribeRequest, SubscribeResponse,
};

/// Commands consumed by the single writer task. Every registry mutation flows
/// through here, which is what serializes the "read ledger → decide → write
/// ledger → mutate registry" critical sections.
pub enum Command {
    Subscribe {
        request: SubscribeRequest,
        merchant: Address,
        stake: Amount,
        reply: oneshot::Sender<Result<SubscribeResponse, AegisError>>,
    },
    Settle {
        tx_hash: TxHash,
        reply: oneshot::Sender<Result<SettleResponse, AegisError>>,
    },
    Slash {
        tx_hash: TxHash,
        client: Address,
        reply: oneshot::Sender<Result<SlashResponse, AegisError>>,
    },
    PaymentDetected {
        transfer: Transfer,
    },
    DeadlineTick {
        reply: oneshot::Sender<usize>,
    },
}

/// Clone-able front door to the clearing core. Writes are queued to the writer
/// task; quotes go straight to the core since they take no locks the writer
/// holds across awaits.
#[derive(Clone)]
pub struct ClearingHandle {
    tx: mpsc::Sender<Command>,
    core: Arc<ClearingCore>,
}

/// Start the writer task and return its handle.
pub fn spawn_writer(core: Arc<ClearingCore>, buffer: usize) -> ClearingHandle {
    let (tx, mut rx) = mpsc::channel::<Command>(buffer);
    let writer_core = Arc::clone(&core);

    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            let now = chrono::Utc::now().timestamp();
            match cmd {
                Command::Subscribe {
                    request,
                    merchant,
                    stake,
                    reply,
                } => {
                    let result = writer_core.subscribe(request, merchant, stake, now).await;
                    let _ = reply.send(result);
                }
                Command::Settle { tx_hash, reply } => {
                    let _ = reply.send(writer_core.settle(&tx_hash).await);
                }
                Command::Slash {
                    tx_hash,
                    client,
                    reply,
                } => {
                    let _ = reply.send(writer_core.slash(&tx_hash, &client, now).await);
                }
                Command::PaymentDetected { transfer } => {
                    writer_core.payment_detected(transfer).await;
                }
                Command::DeadlineTick { reply } => {
                    let _ = reply.send(writer_core.deadline_tick(now).await);
                }
            }
        }
        info!("clearing writer stopped");
    });

    ClearingHandle { tx, core }
}

impl ClearingHandle {
    async fn send(&self, cmd: Command) -> Result<(), AegisError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| AegisError::Internal("clearing core stopped".to_string()))
    }

    pub async fn subscribe(
        &self,
        request: SubscribeRequest,
        merchant: Address,
        stake: Amount,
    ) -> Result<SubscribeResponse, AegisError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Subscribe {
            request,
            merchant,
            stake,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| AegisError::Internal("clearing core dropped reply".to_string()))?
    }

    pub async fn settle(&self, tx_hash: TxHash) -> Result<SettleResponse, AegisError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Settle { tx_hash, reply }).await?;
        rx.await
            .map_err(|_| AegisError::Internal("clearing core dropped reply".to_string()))?
    }

    pub async fn slash(
        &self,
        tx_hash: TxHash,
        client: Address,
    ) -> Result<SlashResponse, AegisError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Slash {
            tx_hash,
            client,
            reply,
        })
        .await?;
        rx.await
            .map_err(|_| AegisError::Internal("clearing core dropped reply".to_string()))?
    }

    pub async fn notify_payment(&self, transfer: Transfer) -> Result<(), AegisError> {
        self.send(Command::PaymentDetected { transfer }).await
    }

    /// Run one deadline sweep and wait for it to finish. Returns the number of
    /// payments expired.
    pub async fn deadline_tick(&self) -> Result<usize, AegisError> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::DeadlineTick { reply }).await?;
        rx.await
            .map_err(|_| AegisError::Internal("clearing core dropped reply".to_string()))
    }

    /// Read-only discovery; bypasses the writer queue.
    pub async fn quote(&self, skill: &str, price: Amount) -> Result<Vec<QuoteEntry>, AegisError> {
        self.core.quote(skill, price).await
    }
}
