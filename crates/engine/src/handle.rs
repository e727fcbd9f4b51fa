use crate::commands::{TokenCommand, TokenStatus};
use anyhow::Result;
use flywheel_core::TokenConfig;
use tokio::sync::{mpsc, oneshot, watch};

/// Cloneable handle to a running token actor.
#[derive(Clone)]
pub struct TokenHandle {
    tx: mpsc::Sender<TokenCommand>,
    status_rx: watch::Receiver<TokenStatus>,
}

impl TokenHandle {
    #[must_use]
    pub const fn new(
        tx: mpsc::Sender<TokenCommand>,
        status_rx: watch::Receiver<TokenStatus>,
    ) -> Self {
        Self { tx, status_rx }
    }

    /// Starts cycle scheduling for this token.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the actor.
    pub async fn start(&self) -> Result<()> {
        self.tx.send(TokenCommand::Start).await?;
        Ok(())
    }

    /// Stops cycle scheduling without shutting the actor down.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the actor.
    pub async fn stop(&self) -> Result<()> {
        self.tx.send(TokenCommand::Stop).await?;
        Ok(())
    }

    /// Replaces the token's trading parameters.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the actor.
    pub async fn update_config(&self, config: TokenConfig) -> Result<()> {
        self.tx
            .send(TokenCommand::UpdateConfig(Box::new(config)))
            .await?;
        Ok(())
    }

    /// Requests a fresh status snapshot from the actor.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent or the reply is lost.
    pub async fn get_status(&self) -> Result<TokenStatus> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(TokenCommand::GetStatus(tx)).await?;
        let status = rx.await?;
        Ok(status)
    }

    /// Last published status, without a round-trip to the actor.
    #[must_use]
    pub fn latest_status(&self) -> TokenStatus {
        self.status_rx.borrow().clone()
    }

    /// Shuts the actor down. Its final state is force-persisted on the way
    /// out.
    ///
    /// # Errors
    /// Returns an error if the command cannot be sent to the actor.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(TokenCommand::Shutdown).await?;
        Ok(())
    }
}
