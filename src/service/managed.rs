use super::template::TransactionTemplate;
use super::transfer::{TransferConfig, TransferRequest, transfer_within};
use crate::core::{DbError, Result};
use crate::repository::PooledMemberRepository;
use tracing::{info, instrument};

/// Transfers whose transaction boundary is owned by a [`TransactionTemplate`].
#[derive(Clone)]
pub struct TemplateTransferService {
    template: TransactionTemplate,
    repository: PooledMemberRepository,
    config: TransferConfig,
}

impl TemplateTransferService {
    /// Uses the repository's pool for the template.
    pub fn new(repository: PooledMemberRepository) -> Self {
        let template = TransactionTemplate::new(repository.pool().clone());
        Self::with_template(template, repository, TransferConfig::default())
    }

    pub fn with_template(
        template: TransactionTemplate,
        repository: PooledMemberRepository,
        config: TransferConfig,
    ) -> Self {
        Self {
            template,
            repository,
            config,
        }
    }

    #[instrument(name = "template_transfer", skip(self))]
    pub async fn transfer(&self, from_id: &str, to_id: &str, amount: i64) -> Result<()> {
        let request = TransferRequest::new(from_id, to_id, amount);
        request.validate().map_err(DbError::transfer_failed)?;

        let repository = self.repository.clone();
        let config = self.config.clone();

        self.template
            .execute(move |conn| {
                Box::pin(async move {
                    transfer_within(&repository, conn, &request, &config).await
                })
            })
            .await
            .map_err(DbError::transfer_failed)?;

        info!("transfer committed");
        Ok(())
    }
}
