//! Elastic IP lookup and association.

use crate::codec::{self, Action, Address};
use crate::error::EbsError;
use crate::gateway::{Params, SignedRequester};

use super::EbsClient;

impl<R: SignedRequester> EbsClient<R> {
    /// Fetches exactly one elastic IP by its public address.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::NotFound`] or [`EbsError::Ambiguous`] when the
    /// service does not answer with a single address.
    pub async fn describe_address(&self, public_ip: &str) -> Result<Address, EbsError> {
        let body = self
            .requester
            .send(
                Action::DescribeAddresses,
                Params::new().with("PublicIp.1", public_ip),
            )
            .await?;
        EbsError::exactly_one(codec::decode_address_set(&body)?, "address", public_ip)
    }

    /// Binds an elastic IP to an instance, taking it over from any holder.
    ///
    /// Returns the association id when the service reports one.
    ///
    /// # Errors
    ///
    /// Propagates lookup, gateway, and decode failures.
    pub async fn associate_address(
        &self,
        instance_id: &str,
        public_ip: &str,
    ) -> Result<Option<String>, EbsError> {
        let address = self.describe_address(public_ip).await?;
        if let Some(holder) = address.instance_id.as_deref().filter(|id| *id != instance_id) {
            tracing::warn!(public_ip, previous = holder, instance_id, "reassociating address");
        }
        let params = Params::new()
            .with("AllocationId", address.allocation_id)
            .with("InstanceId", instance_id)
            .with("AllowReassociation", "true");
        let body = self.requester.send(Action::AssociateAddress, params).await?;
        let association = codec::decode_association(&body)?;
        tracing::info!(public_ip, instance_id, association = ?association, "address associated");
        Ok(association)
    }
}
