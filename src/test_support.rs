//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use reqwest::Request;

use crate::codec::Action;
use crate::error::EbsError;
use crate::gateway::{
    Gateway, RawResponse, Transport, TransportError, TransportFuture, UnsignedRequests,
};

/// Endpoint used by scripted gateways; never contacted.
pub const SCRIPTED_ENDPOINT: &str = "https://ec2.scripted.invalid";

#[derive(Clone, Debug)]
enum Scripted {
    Response(RawResponse),
    Unreachable(String),
}

#[derive(Debug, Default)]
struct ScriptState {
    responses: HashMap<String, VecDeque<Scripted>>,
    calls: Vec<RecordedCall>,
}

/// Records a single request seen by [`ScriptedTransport`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RecordedCall {
    /// Value of the `Action` query parameter.
    pub action: String,
    /// All decoded query parameters, including `Action` and `Version`.
    pub params: BTreeMap<String, String>,
    /// Request headers, as added by the signer.
    pub headers: BTreeMap<String, String>,
}

impl RecordedCall {
    /// Returns the value of a query parameter.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// In-memory transport that answers each action with pre-seeded responses.
///
/// Responses for one action are consumed in FIFO order; the last one stays
/// in place and is repeated, which lets polling loops observe a steady
/// state. Actions without a scripted response receive HTTP 400.
#[derive(Clone, Debug, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedTransport {
    /// Creates a transport with no scripted responses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, ScriptState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push(&self, action: Action, scripted: Scripted) {
        self.lock()
            .responses
            .entry(action.as_str().to_owned())
            .or_default()
            .push_back(scripted);
    }

    /// Queues a successful response body for `action`.
    pub fn respond(&self, action: Action, body: impl Into<String>) {
        self.respond_with_status(action, 200, body);
    }

    /// Queues a response with an explicit status code for `action`.
    pub fn respond_with_status(&self, action: Action, status: u16, body: impl Into<String>) {
        self.push(
            action,
            Scripted::Response(RawResponse {
                status,
                body: body.into().into_bytes(),
            }),
        );
    }

    /// Queues a connectivity failure for `action`.
    pub fn fail(&self, action: Action, message: impl Into<String>) {
        self.push(action, Scripted::Unreachable(message.into()));
    }

    /// Returns every recorded call in order.
    #[must_use]
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.lock().calls.clone()
    }

    /// Returns the recorded action names in order.
    #[must_use]
    pub fn actions(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .map(|call| call.action.clone())
            .collect()
    }

    /// Counts the calls made for `action`.
    #[must_use]
    pub fn count(&self, action: Action) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.action == action.as_str())
            .count()
    }

    /// Returns the calls made for `action`.
    #[must_use]
    pub fn calls_for(&self, action: Action) -> Vec<RecordedCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.action == action.as_str())
            .cloned()
            .collect()
    }

    /// Builds an unsigned gateway on top of this transport.
    ///
    /// # Errors
    ///
    /// Returns [`EbsError::InvalidEndpoint`] only if [`SCRIPTED_ENDPOINT`]
    /// stops parsing.
    pub fn gateway(&self) -> Result<Gateway<Self, UnsignedRequests>, EbsError> {
        Gateway::new(self.clone(), SCRIPTED_ENDPOINT, UnsignedRequests)
    }

    fn record(&self, request: &Request) -> Scripted {
        let params: BTreeMap<String, String> = request
            .url()
            .query_pairs()
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();
        let headers = request
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_owned(),
                    value.to_str().unwrap_or_default().to_owned(),
                )
            })
            .collect();
        let action = params.get("Action").cloned().unwrap_or_default();

        let mut state = self.lock();
        state.calls.push(RecordedCall {
            action: action.clone(),
            params,
            headers,
        });
        match state.responses.get_mut(&action) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().cloned(),
            None => None,
        }
        .unwrap_or_else(|| {
            Scripted::Response(RawResponse {
                status: 400,
                body: format!("no scripted response for {action}").into_bytes(),
            })
        })
    }
}

impl Transport for ScriptedTransport {
    fn execute(&self, request: Request) -> TransportFuture<'_> {
        let scripted = self.record(&request);
        Box::pin(async move {
            match scripted {
                Scripted::Response(response) => Ok(response),
                Scripted::Unreachable(message) => Err(TransportError { message }),
            }
        })
    }
}

/// XML response builders mirroring the shapes returned by EC2.
pub mod xml {
    /// Attachment entry for [`volume`].
    #[derive(Clone, Copy, Debug)]
    pub struct AttachmentSpec<'a> {
        /// Instance the volume is attached to.
        pub instance_id: &'a str,
        /// Device path on the instance.
        pub device: &'a str,
        /// Attachment status.
        pub status: &'a str,
    }

    /// Renders a volume `<item>` for a `DescribeVolumes` response.
    #[must_use]
    pub fn volume(
        id: &str,
        zone: &str,
        status: &str,
        name: &str,
        attachments: &[AttachmentSpec<'_>],
    ) -> String {
        let attachment_items: String = attachments
            .iter()
            .map(|spec| {
                format!(
                    "<item><volumeId>{id}</volumeId><instanceId>{}</instanceId>\
                     <device>{}</device><status>{}</status>\
                     <attachTime>2014-10-05T09:00:00.000Z</attachTime>\
                     <deleteOnTermination>false</deleteOnTermination></item>",
                    spec.instance_id, spec.device, spec.status
                )
            })
            .collect();
        format!(
            "<item><volumeId>{id}</volumeId><size>10</size><snapshotId/>\
             <availabilityZone>{zone}</availabilityZone><status>{status}</status>\
             <createTime>2014-10-03T15:18:42.354Z</createTime>\
             <attachmentSet>{attachment_items}</attachmentSet>\
             <tagSet><item><key>Name</key><value>{name}</value></item></tagSet>\
             <volumeType>standard</volumeType></item>"
        )
    }

    /// Wraps volume items in a `DescribeVolumes` response.
    #[must_use]
    pub fn volume_set(items: &[String]) -> String {
        format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
             <DescribeVolumesResponse xmlns=\"http://ec2.amazonaws.com/doc/2014-05-01/\">\
             <requestId>req</requestId><volumeSet>{}</volumeSet></DescribeVolumesResponse>",
            items.concat()
        )
    }

    /// Renders a `CreateVolume` response.
    #[must_use]
    pub fn created_volume(id: &str, zone: &str) -> String {
        format!(
            "<CreateVolumeResponse><requestId>req</requestId><volumeId>{id}</volumeId>\
             <size>10</size><snapshotId/><availabilityZone>{zone}</availabilityZone>\
             <status>creating</status><createTime>2014-10-04T16:30:35.740Z</createTime>\
             <volumeType>standard</volumeType></CreateVolumeResponse>"
        )
    }

    /// Renders a `CreateSnapshot` response.
    #[must_use]
    pub fn created_snapshot(id: &str, volume_id: &str, description: &str) -> String {
        format!(
            "<CreateSnapshotResponse><requestId>req</requestId><snapshotId>{id}</snapshotId>\
             <volumeId>{volume_id}</volumeId><status>pending</status>\
             <description>{description}</description></CreateSnapshotResponse>"
        )
    }

    /// Renders a `DescribeSnapshots` response holding one snapshot.
    #[must_use]
    pub fn snapshot_set(id: &str, volume_id: &str, status: &str) -> String {
        format!(
            "<DescribeSnapshotsResponse><requestId>req</requestId><snapshotSet><item>\
             <snapshotId>{id}</snapshotId><volumeId>{volume_id}</volumeId>\
             <status>{status}</status><description>migrate_zone</description>\
             </item></snapshotSet></DescribeSnapshotsResponse>"
        )
    }

    /// Renders a `DescribeInstanceAttribute` block-device mapping response.
    #[must_use]
    pub fn device_mapping(devices: &[&str]) -> String {
        let entries: String = devices
            .iter()
            .map(|device| {
                format!(
                    "<item><deviceName>{device}</deviceName><ebs><volumeId>vol-{}</volumeId>\
                     <status>attached</status><attachTime>2014-10-01T10:00:00.000Z</attachTime>\
                     <deleteOnTermination>false</deleteOnTermination></ebs></item>",
                    device.rsplit('/').next().unwrap_or_default()
                )
            })
            .collect();
        format!(
            "<DescribeInstanceAttributeResponse><requestId>req</requestId>\
             <instanceId>i-test</instanceId><blockDeviceMapping>{entries}</blockDeviceMapping>\
             </DescribeInstanceAttributeResponse>"
        )
    }

    /// Renders an `AttachVolume` or `DetachVolume` response.
    #[must_use]
    pub fn attachment(root: &str, volume_id: &str, instance_id: &str, device: &str, status: &str) -> String {
        format!(
            "<{root}><requestId>req</requestId><volumeId>{volume_id}</volumeId>\
             <instanceId>{instance_id}</instanceId><device>{device}</device>\
             <status>{status}</status><attachTime>2014-10-05T09:00:00.000Z</attachTime></{root}>"
        )
    }

    /// Renders a `DescribeAddresses` response.
    #[must_use]
    pub fn address_set(addresses: &[(&str, &str)]) -> String {
        let items: String = addresses
            .iter()
            .map(|(ip, allocation)| {
                format!(
                    "<item><publicIp>{ip}</publicIp><allocationId>{allocation}</allocationId>\
                     <domain>vpc</domain></item>"
                )
            })
            .collect();
        format!(
            "<DescribeAddressesResponse><requestId>req</requestId>\
             <addressesSet>{items}</addressesSet></DescribeAddressesResponse>"
        )
    }

    /// Renders a response that only acknowledges the call.
    #[must_use]
    pub fn acknowledged(root: &str) -> String {
        format!("<{root}><requestId>req</requestId><return>true</return></{root}>")
    }
}
