//! Workflow tests for the volume orchestrator.

use std::time::Duration;

use rstest::{fixture, rstest};

use super::*;
use crate::codec::Action;
use crate::gateway::{Gateway, UnsignedRequests};
use crate::test_support::{ScriptedTransport, xml};

type ScriptedOrchestrator = VolumeOrchestrator<Gateway<ScriptedTransport, UnsignedRequests>>;

const ZONE: &str = "eu-west-1a";
const OTHER_ZONE: &str = "eu-west-1b";
const INSTANCE: &str = "i-1a2b3c4d";

#[fixture]
fn transport() -> ScriptedTransport {
    ScriptedTransport::new()
}

fn orchestrator(transport: &ScriptedTransport) -> ScriptedOrchestrator {
    let gateway = transport
        .gateway()
        .unwrap_or_else(|err| panic!("scripted gateway: {err}"));
    VolumeOrchestrator::new(EbsClient::new(gateway)).with_poll_settings(PollSettings::new(
        Duration::from_millis(2),
        Duration::from_millis(250),
    ))
}

fn request() -> AttachRequest {
    AttachRequest::new("data", INSTANCE, ZONE)
}

fn named(id: &str, zone: &str, status: &str) -> String {
    xml::volume_set(&[xml::volume(id, zone, status, "data", &[])])
}

#[rstest]
#[tokio::test]
async fn reuses_volume_in_same_zone(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-1", ZONE, "available"));
    transport.respond(Action::DescribeInstanceAttribute, xml::device_mapping(&["/dev/xvda"]));
    transport.respond(
        Action::AttachVolume,
        xml::attachment("AttachVolumeResponse", "vol-1", INSTANCE, "/dev/sdf", "attaching"),
    );

    let outcome = orchestrator(&transport)
        .attach(&request())
        .await
        .unwrap_or_else(|err| panic!("attach should succeed: {err}"));
    assert_eq!(
        outcome,
        AttachOutcome {
            volume_id: String::from("vol-1"),
            device: String::from("/dev/sdf"),
            resolution: Resolution::Reused,
        }
    );
    assert_eq!(transport.count(Action::CreateVolume), 0);
    assert_eq!(transport.count(Action::CreateSnapshot), 0);
    assert_eq!(
        transport.actions(),
        ["DescribeVolumes", "DescribeInstanceAttribute", "AttachVolume"]
    );
}

#[rstest]
#[tokio::test]
async fn existing_attachment_is_returned_without_attach_call(transport: ScriptedTransport) {
    let attached = xml::volume(
        "vol-1",
        ZONE,
        "in-use",
        "data",
        &[xml::AttachmentSpec {
            instance_id: INSTANCE,
            device: "/dev/sdg",
            status: "attached",
        }],
    );
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[attached]));

    let outcome = orchestrator(&transport)
        .attach(&request())
        .await
        .unwrap_or_else(|err| panic!("attach should succeed: {err}"));
    assert_eq!(outcome.device, "/dev/sdg");
    assert_eq!(outcome.resolution, Resolution::Reused);
    assert_eq!(transport.actions(), ["DescribeVolumes"]);
}

#[rstest]
#[tokio::test]
async fn attachment_to_another_instance_still_attaches(transport: ScriptedTransport) {
    let elsewhere = xml::volume(
        "vol-1",
        ZONE,
        "in-use",
        "data",
        &[xml::AttachmentSpec {
            instance_id: "i-other",
            device: "/dev/sdf",
            status: "attached",
        }],
    );
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[elsewhere]));
    transport.respond(Action::DescribeInstanceAttribute, xml::device_mapping(&[]));
    transport.respond_with_status(Action::AttachVolume, 400, "VolumeInUse");

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("service rejection should surface");
    assert!(
        matches!(
            err,
            OrchestratorError::Ebs(EbsError::Remote {
                action: Action::AttachVolume,
                ..
            })
        ),
        "unexpected: {err:?}"
    );
}

#[rstest]
#[tokio::test]
async fn creates_tags_waits_and_attaches(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[]));
    transport.respond(Action::CreateVolume, xml::created_volume("vol-new", ZONE));
    transport.respond(Action::CreateTags, xml::acknowledged("CreateTagsResponse"));
    transport.respond(Action::DescribeVolumes, named("vol-new", ZONE, "creating"));
    transport.respond(Action::DescribeVolumes, named("vol-new", ZONE, "available"));
    transport.respond(
        Action::DescribeInstanceAttribute,
        xml::device_mapping(&["/dev/xvda", "/dev/sdf"]),
    );
    transport.respond(
        Action::AttachVolume,
        xml::attachment("AttachVolumeResponse", "vol-new", INSTANCE, "/dev/sdg", "attaching"),
    );

    let outcome = orchestrator(&transport)
        .attach(&request().size_gib(20).ssd(true))
        .await
        .unwrap_or_else(|err| panic!("attach should succeed: {err}"));
    assert_eq!(outcome.volume_id, "vol-new");
    assert_eq!(outcome.device, "/dev/sdg");
    assert_eq!(outcome.resolution, Resolution::Created);

    let creates = transport.calls_for(Action::CreateVolume);
    let Some(create) = creates.first() else {
        panic!("expected a CreateVolume call");
    };
    assert_eq!(create.param("Size"), Some("20"));
    assert_eq!(create.param("VolumeType"), Some("gp2"));
    let tags = transport.calls_for(Action::CreateTags);
    assert_eq!(
        tags.first().and_then(|call| call.param("Tag.1.Value")),
        Some("data")
    );
    assert_eq!(transport.count(Action::DescribeVolumes), 3);
}

#[rstest]
#[tokio::test]
async fn timeout_before_available_skips_attach(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[]));
    transport.respond(Action::CreateVolume, xml::created_volume("vol-slow", ZONE));
    transport.respond(Action::CreateTags, xml::acknowledged("CreateTagsResponse"));
    transport.respond(Action::DescribeVolumes, named("vol-slow", ZONE, "creating"));

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("volume never becomes available");
    assert!(
        matches!(
            &err,
            OrchestratorError::Ebs(EbsError::Timeout { resource_id, .. }) if resource_id == "vol-slow"
        ),
        "unexpected: {err:?}"
    );
    assert_eq!(transport.count(Action::AttachVolume), 0);
    assert_eq!(transport.count(Action::DescribeInstanceAttribute), 0);
}

#[rstest]
#[tokio::test]
async fn volume_error_state_is_fatal(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[]));
    transport.respond(Action::CreateVolume, xml::created_volume("vol-bad", ZONE));
    transport.respond(Action::CreateTags, xml::acknowledged("CreateTagsResponse"));
    transport.respond(Action::DescribeVolumes, named("vol-bad", ZONE, "error"));

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("error state should fail");
    assert_eq!(
        err,
        OrchestratorError::VolumeFailed {
            volume_id: String::from("vol-bad"),
        }
    );
    assert_eq!(transport.count(Action::AttachVolume), 0);
}

#[rstest]
#[tokio::test]
async fn migrates_volume_from_other_zone(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-old", OTHER_ZONE, "available"));
    transport.respond(
        Action::CreateSnapshot,
        xml::created_snapshot("snap-1", "vol-old", MIGRATION_SNAPSHOT_DESCRIPTION),
    );
    transport.respond(Action::DescribeSnapshots, xml::snapshot_set("snap-1", "vol-old", "pending"));
    transport.respond(Action::DescribeSnapshots, xml::snapshot_set("snap-1", "vol-old", "completed"));
    transport.respond(Action::DeleteVolume, xml::acknowledged("DeleteVolumeResponse"));
    transport.respond(Action::CreateVolume, xml::created_volume("vol-new", ZONE));
    transport.respond(Action::CreateTags, xml::acknowledged("CreateTagsResponse"));
    transport.respond(Action::DescribeVolumes, named("vol-new", ZONE, "available"));
    transport.respond(Action::DescribeInstanceAttribute, xml::device_mapping(&[]));
    transport.respond(
        Action::AttachVolume,
        xml::attachment("AttachVolumeResponse", "vol-new", INSTANCE, "/dev/sdf", "attaching"),
    );

    let outcome = orchestrator(&transport)
        .attach(&request())
        .await
        .unwrap_or_else(|err| panic!("migration should succeed: {err}"));
    assert_eq!(
        outcome,
        AttachOutcome {
            volume_id: String::from("vol-new"),
            device: String::from("/dev/sdf"),
            resolution: Resolution::Migrated {
                snapshot_id: String::from("snap-1"),
            },
        }
    );

    let snapshot_calls = transport.calls_for(Action::CreateSnapshot);
    assert_eq!(
        snapshot_calls.first().and_then(|call| call.param("Description")),
        Some("migrate_zone")
    );
    let deletes = transport.calls_for(Action::DeleteVolume);
    assert_eq!(
        deletes.first().and_then(|call| call.param("VolumeId")),
        Some("vol-old")
    );
    let creates = transport.calls_for(Action::CreateVolume);
    let Some(create) = creates.first() else {
        panic!("expected a CreateVolume call");
    };
    assert_eq!(create.param("SnapshotId"), Some("snap-1"));
    assert_eq!(create.param("AvailabilityZone"), Some(ZONE));

    let actions = transport.actions();
    let position = |name: &str| {
        actions
            .iter()
            .position(|action| action == name)
            .unwrap_or_else(|| panic!("{name} was not called"))
    };
    assert!(position("CreateSnapshot") < position("DeleteVolume"));
    assert!(position("DeleteVolume") < position("CreateVolume"));
}

#[rstest]
#[tokio::test]
async fn failed_old_volume_deletion_is_not_fatal(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-old", OTHER_ZONE, "in-use"));
    transport.respond(
        Action::CreateSnapshot,
        xml::created_snapshot("snap-2", "vol-old", MIGRATION_SNAPSHOT_DESCRIPTION),
    );
    transport.respond(Action::DescribeSnapshots, xml::snapshot_set("snap-2", "vol-old", "completed"));
    transport.respond_with_status(Action::DeleteVolume, 400, "VolumeInUse");
    transport.respond(Action::CreateVolume, xml::created_volume("vol-new", ZONE));
    transport.respond(Action::CreateTags, xml::acknowledged("CreateTagsResponse"));
    transport.respond(Action::DescribeVolumes, named("vol-new", ZONE, "available"));
    transport.respond(Action::DescribeInstanceAttribute, xml::device_mapping(&[]));
    transport.respond(
        Action::AttachVolume,
        xml::attachment("AttachVolumeResponse", "vol-new", INSTANCE, "/dev/sdf", "attaching"),
    );

    let outcome = orchestrator(&transport)
        .attach(&request())
        .await
        .unwrap_or_else(|err| panic!("deletion failure should be tolerated: {err}"));
    assert_eq!(outcome.volume_id, "vol-new");
    assert_eq!(transport.count(Action::AttachVolume), 1);
}

#[rstest]
#[tokio::test]
async fn snapshot_timeout_stops_migration(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-old", OTHER_ZONE, "available"));
    transport.respond(
        Action::CreateSnapshot,
        xml::created_snapshot("snap-3", "vol-old", MIGRATION_SNAPSHOT_DESCRIPTION),
    );
    transport.respond(Action::DescribeSnapshots, xml::snapshot_set("snap-3", "vol-old", "pending"));

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("snapshot never completes");
    assert!(
        matches!(&err, OrchestratorError::Ebs(EbsError::Timeout { .. })),
        "unexpected: {err:?}"
    );
    assert_eq!(transport.count(Action::DeleteVolume), 0);
    assert_eq!(transport.count(Action::CreateVolume), 0);
}

#[rstest]
#[tokio::test]
async fn snapshot_error_state_is_fatal(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-old", OTHER_ZONE, "available"));
    transport.respond(
        Action::CreateSnapshot,
        xml::created_snapshot("snap-4", "vol-old", MIGRATION_SNAPSHOT_DESCRIPTION),
    );
    transport.respond(Action::DescribeSnapshots, xml::snapshot_set("snap-4", "vol-old", "error"));

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("snapshot error should fail");
    assert_eq!(
        err,
        OrchestratorError::SnapshotFailed {
            snapshot_id: String::from("snap-4"),
        }
    );
    assert_eq!(transport.count(Action::DeleteVolume), 0);
}

#[rstest]
#[tokio::test]
async fn ambiguous_name_makes_no_mutating_call(transport: ScriptedTransport) {
    let first = xml::volume("vol-1", ZONE, "available", "data", &[]);
    let second = xml::volume("vol-2", OTHER_ZONE, "available", "data", &[]);
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[first, second]));

    let err = orchestrator(&transport)
        .attach(&request())
        .await
        .expect_err("duplicate names should fail");
    assert_eq!(
        err,
        OrchestratorError::AmbiguousName {
            name: String::from("data"),
            count: 2,
        }
    );
    assert_eq!(transport.actions(), ["DescribeVolumes"]);
}

#[rstest]
#[tokio::test]
async fn invalid_request_makes_no_call(transport: ScriptedTransport) {
    let err = orchestrator(&transport)
        .attach(&request().provisioned_iops(500))
        .await
        .expect_err("piops without ssd should fail");
    assert_eq!(
        err,
        OrchestratorError::Ebs(EbsError::Validation(String::from(
            "Provisioned IOPS volumes are only available as SSD"
        )))
    );
    assert!(transport.calls().is_empty());
}

#[rstest]
#[case(AttachRequest::new("", INSTANCE, ZONE), "volume name must not be empty")]
#[case(AttachRequest::new("data", " ", ZONE), "instance id must not be empty")]
#[case(AttachRequest::new("data", INSTANCE, ""), "availability zone must not be empty")]
fn blank_fields_are_rejected(#[case] attach: AttachRequest, #[case] message: &str) {
    assert_eq!(
        attach.validate(),
        Err(EbsError::Validation(message.to_owned()))
    );
}

#[rstest]
#[tokio::test]
async fn detach_by_name_returns_status(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, named("vol-1", ZONE, "in-use"));
    transport.respond(
        Action::DetachVolume,
        xml::attachment("DetachVolumeResponse", "vol-1", INSTANCE, "/dev/sdf", "detaching"),
    );

    let status = orchestrator(&transport)
        .detach("data")
        .await
        .unwrap_or_else(|err| panic!("detach should succeed: {err}"));
    assert_eq!(status, AttachmentStatus::Detaching);
    let detaches = transport.calls_for(Action::DetachVolume);
    assert_eq!(
        detaches.first().and_then(|call| call.param("VolumeId")),
        Some("vol-1")
    );
}

#[rstest]
#[tokio::test]
async fn detach_with_blank_name_sends_nothing(transport: ScriptedTransport) {
    let err = orchestrator(&transport)
        .detach("   ")
        .await
        .expect_err("blank name should fail");
    assert_eq!(
        err,
        OrchestratorError::Ebs(EbsError::Validation(String::from(
            "volume name must not be empty"
        )))
    );
    assert!(transport.calls().is_empty());
}

#[rstest]
#[tokio::test]
async fn detach_without_match_fails(transport: ScriptedTransport) {
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[]));
    let err = orchestrator(&transport)
        .detach("missing")
        .await
        .expect_err("unknown name should fail");
    assert_eq!(
        err,
        OrchestratorError::NoVolumeNamed {
            name: String::from("missing"),
        }
    );
    assert_eq!(transport.count(Action::DetachVolume), 0);
}

#[rstest]
#[tokio::test]
async fn detach_with_duplicates_fails(transport: ScriptedTransport) {
    let first = xml::volume("vol-1", ZONE, "in-use", "data", &[]);
    let second = xml::volume("vol-2", ZONE, "in-use", "data", &[]);
    transport.respond(Action::DescribeVolumes, xml::volume_set(&[first, second]));
    let err = orchestrator(&transport)
        .detach("data")
        .await
        .expect_err("duplicate names should fail");
    assert!(
        matches!(err, OrchestratorError::AmbiguousName { count: 2, .. }),
        "unexpected: {err:?}"
    );
}
