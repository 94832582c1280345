use std::time::Duration;

use tracing::info;

use crate::command::ClearingHandle;

/// Periodic sweeper that auto-expires pending payments past their deadlines.
///
/// Each tick is sent to the writer and awaited before the interval re-arms, so
/// a slow sweep can never overlap the next one; missed ticks are skipped.
pub struct DeadlineSweeper {
    handle: ClearingHandle,
    period: Duration,
}

impl DeadlineSweeper {
    pub fn new(handle: ClearingHandle, period: Duration) -> Self {
        Self { handle, period }
    }

    /// Run until the clearing core stops.
    pub async fn run(self) {
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match self.handle.deadline_tick().await {
                Ok(expired) if expired > 0 => info!(expired, "deadline sweep"),
                Ok(_) => {}
                Err(_) => return,
            }
        }
    }
}
