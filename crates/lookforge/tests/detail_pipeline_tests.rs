//! Detail sessions: model photos per garment group, detail-page sections,
//! and the final stitch.

mod common;

use common::{upload, uploads, TestHarness};

use lookforge::pipeline::PipelineError;
use lookforge::session::{SectionType, Session, SessionStatus, SessionType, Side};

/// Detail session with both model photos and the given complete groups.
async fn session_with_groups(harness: &TestHarness, groups: &[&str]) -> Session {
    let models = harness.models();
    let mut session = harness.create(SessionType::Detail).await;
    models
        .upload_model(&mut session, Side::Front, &upload("model-front.jpg"))
        .await
        .unwrap();
    models
        .upload_model(&mut session, Side::Back, &upload("model-back.jpg"))
        .await
        .unwrap();
    for group in groups {
        for side in [Side::Front, Side::Back] {
            models
                .upload_garment(&mut session, group, side, &upload("flat.png"), None)
                .await
                .unwrap();
        }
    }
    session
}

#[tokio::test]
async fn test_model_generation_runs_complete_groups_only() {
    let harness = TestHarness::new();
    harness.add_pose("stand.png");
    let models = harness.models();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models
        .upload_garment(&mut session, "blue", Side::Front, &upload("blue.png"), Some("Blue tee"))
        .await
        .unwrap();

    let report = models.generate(&mut session, None).await.unwrap();

    assert_eq!(report.new_count, 1);
    assert_eq!(report.failed_count, 0);
    assert_eq!(report.status.status, SessionStatus::Step1Done);
    assert_eq!(harness.generator.call_count(), 2);
    // Model side, garment side, pose.
    assert!(harness.generator.recorded().iter().all(|c| c.image_count == 3));

    let red = &report.status.groups[0];
    assert!(red.generated);
    assert_eq!(red.front.as_deref(), Some(harness.session_file(&session, "step1/red-front.jpg").as_path()));
    assert!(harness.session_file(&session, "step1/red-back.jpg").exists());

    let blue = &report.status.groups[1];
    assert_eq!(blue.label, "Blue tee");
    assert!(!blue.complete && !blue.generated);

    let again = models.generate(&mut session, None).await;
    assert!(matches!(again, Err(PipelineError::NothingPending(_))));
    assert_eq!(harness.generator.call_count(), 2);
}

#[tokio::test]
async fn test_model_generation_without_poses() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = session_with_groups(&harness, &["red"]).await;

    models.generate(&mut session, None).await.unwrap();
    assert!(harness.generator.recorded().iter().all(|c| c.image_count == 2));
}

#[tokio::test]
async fn test_model_generation_preconditions_in_order() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = harness.create(SessionType::Detail).await;

    models
        .upload_garment(&mut session, "red", Side::Front, &upload("f.png"), None)
        .await
        .unwrap();
    let result = models.generate(&mut session, None).await;
    match result {
        Err(PipelineError::Validation(message)) => assert!(message.contains("model")),
        other => panic!("expected validation error, got {:?}", other.map(|r| r.new_count)),
    }

    models
        .upload_model(&mut session, Side::Front, &upload("mf.jpg"))
        .await
        .unwrap();
    models
        .upload_model(&mut session, Side::Back, &upload("mb.jpg"))
        .await
        .unwrap();
    let result = models.generate(&mut session, Some("notes".into())).await;
    match result {
        Err(PipelineError::Validation(message)) => assert!(message.contains("garment group")),
        other => panic!("expected validation error, got {:?}", other.map(|r| r.new_count)),
    }
    assert_eq!(session.detail().unwrap().additional_notes, "");
    assert_eq!(harness.generator.call_count(), 0);
}

#[tokio::test]
async fn test_unsafe_group_id_rejected() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = harness.create(SessionType::Detail).await;

    let result = models
        .upload_garment(&mut session, "../escape", Side::Front, &upload("f.png"), None)
        .await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));
    assert!(session.detail().unwrap().clothes_groups.is_empty());
}

#[tokio::test]
async fn test_model_reupload_replaces_file() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = harness.create(SessionType::Detail).await;

    models
        .upload_model(&mut session, Side::Front, &upload("first.png"))
        .await
        .unwrap();
    let status = models
        .upload_model(&mut session, Side::Front, &upload("second.jpg"))
        .await
        .unwrap();

    assert_eq!(status.model_front.as_deref(), Some("second.jpg"));
    assert!(!harness.session_file(&session, "input/model/front.png").exists());
    assert!(harness.session_file(&session, "input/model/front.jpg").exists());
}

#[tokio::test]
async fn test_regenerate_model_side() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models.generate(&mut session, Some("slim fit".into())).await.unwrap();

    models
        .regenerate(&mut session, "red", Side::Back, Some("arms down"))
        .await
        .unwrap();
    assert_eq!(harness.generator.call_count(), 3);
    let last = harness.generator.recorded().pop().unwrap();
    assert!(last.prompt.contains("Additional notes: slim fit"));
    assert!(last.prompt.contains("Adjustment request: arms down"));

    let unknown = models.regenerate(&mut session, "green", Side::Front, None).await;
    assert!(matches!(unknown, Err(PipelineError::UnknownGroup(_))));
}

#[tokio::test]
async fn test_regenerate_single_side_waits_for_other_side() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = session_with_groups(&harness, &["red"]).await;

    let status = models
        .regenerate(&mut session, "red", Side::Front, None)
        .await
        .unwrap();
    assert!(!status.groups[0].generated);
    assert!(session.detail().unwrap().step1_results.is_empty());

    let status = models
        .regenerate(&mut session, "red", Side::Back, None)
        .await
        .unwrap();
    assert!(status.groups[0].generated);
    assert_eq!(status.status, SessionStatus::Step1Done);
}

#[tokio::test]
async fn test_remove_group_drops_result_and_files() {
    let harness = TestHarness::new();
    let models = harness.models();
    let mut session = session_with_groups(&harness, &["red", "blue"]).await;
    models.generate(&mut session, None).await.unwrap();

    let status = models.remove_group(&mut session, "red").await.unwrap();
    assert_eq!(status.groups.len(), 1);
    assert_eq!(status.groups[0].group_id, "blue");
    assert!(!harness.session_file(&session, "step1/red-front.jpg").exists());
    assert!(!harness.session_file(&session, "input/clothes/red-back.png").exists());
    assert_eq!(harness.reload(&session).await.detail().unwrap().step1_results.len(), 1);

    let missing = models.remove_group(&mut session, "red").await;
    assert!(matches!(missing, Err(PipelineError::UnknownGroup(_))));
}

#[tokio::test]
async fn test_sections_route_materials_by_type() {
    // One worker so calls reach the mock in section order.
    let harness = TestHarness::with_concurrency(1);
    let models = harness.models();
    let page = harness.detail_page();
    let mut session = session_with_groups(&harness, &["red", "blue"]).await;
    models.generate(&mut session, None).await.unwrap();
    assert_eq!(harness.generator.call_count(), 4);

    page.upload_sections(&mut session, &[upload("hero.jpg")], SectionType::Showcase)
        .await
        .unwrap();
    page.upload_sections(&mut session, &[upload("zoom.jpg")], SectionType::Highlight)
        .await
        .unwrap();
    let status = page
        .upload_sections(&mut session, &[upload("table.jpg")], SectionType::Detail)
        .await
        .unwrap();
    let indices: Vec<u32> = status.sections.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 2]);

    let report = page.generate(&mut session).await.unwrap();
    assert_eq!(report.new_count, 3);
    assert_eq!(report.status.status, SessionStatus::Step2Done);

    let counts: Vec<usize> = harness.generator.recorded()[4..]
        .iter()
        .map(|c| c.image_count)
        .collect();
    // Showcase: one group. Highlight: first group. Detail: every group.
    assert_eq!(counts, vec![3, 3, 5]);
    assert!(harness.generator.recorded()[4].prompt.contains("40px wide"));
}

#[tokio::test]
async fn test_sections_need_step1_results() {
    let harness = TestHarness::new();
    let page = harness.detail_page();
    let mut session = harness.create(SessionType::Detail).await;

    let result = page.generate(&mut session).await;
    assert!(matches!(result, Err(PipelineError::Validation(_))));

    page.upload_sections(&mut session, &[upload("hero.jpg")], SectionType::Detail)
        .await
        .unwrap();
    let result = page.generate(&mut session).await;
    match result {
        Err(PipelineError::Validation(message)) => assert!(message.contains("model photos")),
        other => panic!("expected validation error, got {:?}", other.map(|r| r.new_count)),
    }
}

#[tokio::test]
async fn test_stitch_requires_every_section() {
    let harness = TestHarness::with_concurrency(1);
    let models = harness.models();
    let page = harness.detail_page();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models.generate(&mut session, None).await.unwrap();

    page.upload_sections(
        &mut session,
        &uploads(&["a.jpg", "b.jpg", "c.jpg"]),
        SectionType::Detail,
    )
    .await
    .unwrap();

    // Calls 1 and 2 were the model photos; call 5 is the third section.
    harness.generator.fail_call(5);
    let report = page.generate(&mut session).await.unwrap();
    assert_eq!(report.new_count, 2);
    assert_eq!(report.failed_count, 1);

    let result = page.stitch(&mut session).await;
    match result {
        Err(PipelineError::IncompleteSections { missing }) => assert_eq!(missing, vec![2]),
        other => panic!("expected incomplete sections, got {:?}", other.map(|s| s.status)),
    }
    assert!(!harness.session_file(&session, "final/detail-page.jpg").exists());

    harness.generator.clear_failures();
    page.generate(&mut session).await.unwrap();
    let status = page.stitch(&mut session).await.unwrap();

    assert_eq!(status.status, SessionStatus::Finished);
    let final_path = status.final_path.unwrap();
    assert_eq!(final_path, harness.session_file(&session, "final/detail-page.jpg"));
    // Mock images are 8x6, scaled to the 40px page width: 30px per section.
    assert_eq!(image::image_dimensions(&final_path).unwrap(), (40, 90));

    // Stitching again rewrites the page.
    let again = page.stitch(&mut session).await.unwrap();
    assert_eq!(again.status, SessionStatus::Finished);
}

#[tokio::test]
async fn test_delete_section_then_stitch_remaining() {
    let harness = TestHarness::new();
    let models = harness.models();
    let page = harness.detail_page();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models.generate(&mut session, None).await.unwrap();
    page.upload_sections(&mut session, &uploads(&["a.jpg", "b.jpg"]), SectionType::Detail)
        .await
        .unwrap();
    page.generate(&mut session).await.unwrap();

    let status = page.delete_section(&mut session, 0).await.unwrap();
    assert_eq!(status.sections.len(), 1);
    assert_eq!(status.sections[0].index, 1);
    assert!(!harness.session_file(&session, "step2/section-01.jpg").exists());

    let status = page.stitch(&mut session).await.unwrap();
    let final_path = status.final_path.unwrap();
    assert_eq!(image::image_dimensions(&final_path).unwrap(), (40, 30));

    let stitch_empty = {
        page.delete_section(&mut session, 1).await.unwrap();
        page.stitch(&mut session).await
    };
    assert!(matches!(stitch_empty, Err(PipelineError::Validation(_))));
}

#[tokio::test]
async fn test_regenerate_section() {
    let harness = TestHarness::new();
    let models = harness.models();
    let page = harness.detail_page();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models.generate(&mut session, None).await.unwrap();
    page.upload_sections(&mut session, &[upload("a.jpg")], SectionType::Highlight)
        .await
        .unwrap();
    page.generate(&mut session).await.unwrap();

    let status = page
        .regenerate(&mut session, 0, Some("bigger headline"))
        .await
        .unwrap();
    assert!(status.section_results[0].generated);
    let last = harness.generator.recorded().pop().unwrap();
    assert!(last.prompt.contains("Adjustment request: bigger headline"));

    let unknown = page.regenerate(&mut session, 4, None).await;
    assert!(matches!(unknown, Err(PipelineError::UnknownIndex { index: 4, .. })));
}

#[tokio::test]
async fn test_section_changes_discard_stitched_page() {
    let harness = TestHarness::new();
    let models = harness.models();
    let page = harness.detail_page();
    let mut session = session_with_groups(&harness, &["red"]).await;
    models.generate(&mut session, None).await.unwrap();
    page.upload_sections(
        &mut session,
        &uploads(&["a.jpg", "b.jpg", "c.jpg"]),
        SectionType::Detail,
    )
    .await
    .unwrap();
    page.generate(&mut session).await.unwrap();

    let final_file = harness.session_file(&session, "final/detail-page.jpg");
    let status = page.stitch(&mut session).await.unwrap();
    assert_eq!(status.status, SessionStatus::Finished);
    assert!(final_file.exists());

    let status = page.regenerate(&mut session, 1, None).await.unwrap();
    assert!(status.final_path.is_none());
    assert_eq!(status.status, SessionStatus::Step2Done);
    assert!(!final_file.exists());

    page.stitch(&mut session).await.unwrap();
    let status = page.delete_section(&mut session, 2).await.unwrap();
    assert!(status.final_path.is_none());
    assert_eq!(status.status, SessionStatus::Step2Done);
    assert!(!final_file.exists());

    // The deleted tail index is not handed out again.
    let status = page
        .upload_sections(&mut session, &[upload("d.jpg")], SectionType::Detail)
        .await
        .unwrap();
    let indices: Vec<u32> = status.sections.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1, 3]);

    let stored = harness.reload(&session).await;
    assert_eq!(stored, session);
    assert!(stored.detail().unwrap().final_path.is_none());
}
