//! End-to-end tests over the public API: load, edit, serialize.

mod common;

use common::{pdf, png, rotations, widths};
use pagesmith::{
    inspect_bytes, process_files, write_outputs, ControllerState, EditAction, InputFile,
    MetadataPatch, PageRange, PageRef, PageSmithError, ProcessingConfig, SerializeError,
    SplitMode, ToolController, ToolKind, ValidationError,
};

fn input(name: &str, bytes: Vec<u8>) -> InputFile {
    InputFile::new(name, None, bytes)
}

#[tokio::test]
async fn five_pages_delete_two_and_four() {
    let mut c = ToolController::new(ToolKind::DeletePages.spec(), ProcessingConfig::default());
    c.load(vec![input("five.pdf", pdf(5, 100, None))]).unwrap();
    let ids: Vec<_> = c.pages().pages().iter().map(|p| p.id.clone()).collect();
    c.toggle_delete(&ids[1]).unwrap();
    c.toggle_delete(&ids[3]).unwrap();

    let output = c.process().await.unwrap();
    assert_eq!(widths(&output.files[0].bytes), vec![100.0, 102.0, 104.0]);
}

#[tokio::test]
async fn unmodified_page_set_reproduces_source() {
    let source = pdf(4, 300, None);
    let output = process_files(
        ToolKind::Organize.spec(),
        vec![input("a.pdf", source.clone())],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(widths(&output.files[0].bytes), widths(&source));
}

#[tokio::test]
async fn move_and_inverse_move_restore_order() {
    let edits = [
        EditAction::Reorder { from: 0, to: 3 },
        EditAction::Reorder { from: 3, to: 0 },
    ];
    let output = process_files(
        ToolKind::Organize.spec(),
        vec![input("a.pdf", pdf(4, 100, None))],
        &edits,
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(
        widths(&output.files[0].bytes),
        vec![100.0, 101.0, 102.0, 103.0]
    );
}

#[tokio::test]
async fn rotation_adds_to_inherited_rotate() {
    let edits = [
        EditAction::Rotate {
            page: PageRef::Position(1),
            degrees: 90,
        },
        EditAction::Rotate {
            page: PageRef::Position(2),
            degrees: -90,
        },
    ];
    let output = process_files(
        ToolKind::Rotate.spec(),
        vec![input("a.pdf", pdf(3, 100, Some(90)))],
        &edits,
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(rotations(&output.files[0].bytes), vec![180, 0, 90]);
}

#[tokio::test]
async fn deleting_every_page_fails_and_keeps_session() {
    let mut c = ToolController::new(ToolKind::DeletePages.spec(), ProcessingConfig::default());
    c.load(vec![input("a.pdf", pdf(2, 100, None))]).unwrap();
    c.apply_edits(&[
        EditAction::Delete {
            page: PageRef::Position(1),
        },
        EditAction::Delete {
            page: PageRef::Position(2),
        },
    ])
    .unwrap();

    let err = c.process().await.unwrap_err();
    assert!(matches!(
        err,
        PageSmithError::Serialize(SerializeError::EmptyDocument)
    ));
    assert_eq!(c.state(), ControllerState::Loaded);
    assert_eq!(c.pages().live_count(), 0);
    assert!(!c.notification().unwrap().retryable);
}

#[tokio::test]
async fn merge_keeps_source_order() {
    let output = process_files(
        ToolKind::Merge.spec(),
        vec![
            input("a.pdf", pdf(2, 100, None)),
            input("b.pdf", pdf(3, 200, None)),
        ],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(output.files[0].name, "merged-document.pdf");
    assert_eq!(
        widths(&output.files[0].bytes),
        vec![100.0, 101.0, 200.0, 201.0, 202.0]
    );
}

#[tokio::test]
async fn merge_needs_two_files() {
    let err = process_files(
        ToolKind::Merge.spec(),
        vec![input("a.pdf", pdf(2, 100, None))],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        PageSmithError::Validation(ValidationError::NotEnoughFiles { min: 2, got: 1 })
    ));
}

#[tokio::test]
async fn split_by_ranges() {
    let config = ProcessingConfig::builder()
        .split_mode(SplitMode::Ranges(vec![
            PageRange::new(1, 2),
            PageRange::new(3, 5),
        ]))
        .build()
        .unwrap();
    let output = process_files(
        ToolKind::Split.spec(),
        vec![input("a.pdf", pdf(5, 100, None))],
        &[],
        &config,
    )
    .await
    .unwrap();
    assert_eq!(output.files.len(), 2);
    assert_eq!(widths(&output.files[0].bytes), vec![100.0, 101.0]);
    assert_eq!(widths(&output.files[1].bytes), vec![102.0, 103.0, 104.0]);
}

#[tokio::test]
async fn split_rejects_range_past_end() {
    let config = ProcessingConfig::builder()
        .split_mode(SplitMode::Ranges(vec![PageRange::new(2, 9)]))
        .build()
        .unwrap();
    let err = process_files(
        ToolKind::Split.spec(),
        vec![input("a.pdf", pdf(3, 100, None))],
        &[],
        &config,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PageSmithError::InvalidRange { .. }));
}

#[tokio::test]
async fn metadata_round_trip_with_unicode() {
    let config = ProcessingConfig::builder()
        .metadata(MetadataPatch {
            title: Some("Résumé – 2024".into()),
            author: Some("Ada".into()),
            ..Default::default()
        })
        .build()
        .unwrap();
    let output = process_files(
        ToolKind::EditMetadata.spec(),
        vec![input("a.pdf", pdf(1, 100, None))],
        &[],
        &config,
    )
    .await
    .unwrap();
    let meta = inspect_bytes(&output.files[0].bytes, "out.pdf").unwrap();
    assert_eq!(meta.title.as_deref(), Some("Résumé – 2024"));
    assert_eq!(meta.author.as_deref(), Some("Ada"));
    assert!(meta.producer.unwrap().starts_with("pagesmith"));
}

#[tokio::test]
async fn images_become_pages() {
    let output = process_files(
        ToolKind::ImagesToPdf.spec(),
        vec![input("wide.png", png(40, 20)), input("tall.png", png(20, 40))],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(widths(&output.files[0].bytes), vec![842.0, 595.0]);
}

#[tokio::test]
async fn wrong_type_is_rejected_before_loading() {
    let err = process_files(
        ToolKind::Rotate.spec(),
        vec![input("photo.png", png(4, 4))],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn not_a_pdf_is_a_parse_error() {
    let err = process_files(
        ToolKind::Rotate.spec(),
        vec![InputFile::new(
            "fake.pdf",
            Some("application/pdf"),
            b"GIF89a....".to_vec(),
        )],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, PageSmithError::Parse(_)));
}

#[tokio::test]
async fn outputs_land_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let output = process_files(
        ToolKind::Split.spec(),
        vec![input("a.pdf", pdf(2, 100, None))],
        &[],
        &ProcessingConfig::default(),
    )
    .await
    .unwrap();
    let paths = write_outputs(&output, dir.path()).await.unwrap();
    let names: Vec<_> = paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["split-document-1.pdf", "split-document-2.pdf"]);
    assert_eq!(widths(&std::fs::read(&paths[1]).unwrap()), vec![101.0]);
}
