//! End-to-end tests of project and report lifecycle over temporary trees.

mod common;

use serde_json::Value;
use std::path::{Path, PathBuf};
use zip::CompressionMethod;

use common::{build_zip, create_project, setup};
use reporthub::{
    ArchiveSource, HubErrorKind, IngestOutcome, IngestRequest, NewProject, ProjectIcon, ReportHub,
    ReportKind,
};

async fn upload(
    hub: &ReportHub,
    project: &str,
    report: &str,
    archive: &[u8],
    kind: Option<ReportKind>,
    override_existing: bool,
) -> reporthub::Result<IngestOutcome> {
    let staged = hub
        .stage_upload(project, &format!("{report}.zip"), archive)
        .await?;
    hub.ingest_report(IngestRequest {
        project: project.to_string(),
        report: report.to_string(),
        archive: ArchiveSource::File(staged),
        kind,
        override_existing,
    })
    .await
}

fn report_dir(root: &Path, project: &str, report: &str) -> PathBuf {
    root.join("public/projects").join(project).join(report)
}

fn quarantined(root: &Path, sub: &str) -> Vec<String> {
    let mut names: Vec<_> = std::fs::read_dir(root.join(".lostandfound").join(sub))
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_created_project_is_listed_once() {
    let (_temp, hub) = setup();
    create_project(&hub, "checkout").await;
    create_project(&hub, "billing").await;

    let projects = hub.list_projects().await.unwrap();
    let ids: Vec<_> = projects.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["billing", "checkout"]);
    assert_eq!(projects[1].name, "checkout");
    assert!(projects[1].created > 0);

    let err = hub
        .create_project(NewProject {
            identifier: " checkout ".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Conflict);
}

#[tokio::test]
async fn test_invalid_project_id_creates_nothing() {
    let (temp, hub) = setup();
    for id in ["a/b", "semi;colon", "  "] {
        let err = hub
            .create_project(NewProject {
                identifier: id.to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), HubErrorKind::Validation, "{id}");
    }
    assert!(!temp.path().join("public/projects/a").exists());
    assert!(hub.list_projects().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_project_with_name_and_icon() {
    let (temp, hub) = setup();
    let icon = ProjectIcon::from_file_name("logo.png", vec![0x89, b'P', b'N', b'G']).unwrap();
    hub.create_project(NewProject {
        identifier: "shop".to_string(),
        display_name: Some("Web Shop".to_string()),
        icon: Some(icon),
    })
    .await
    .unwrap();

    let summary = hub.project("shop").await.unwrap();
    assert_eq!(summary.name, "Web Shop");
    assert_eq!(summary.icon_uri.as_deref(), Some("/projects/shop/project.png"));
    assert_eq!(
        std::fs::read(temp.path().join("public/projects/shop/project.png")).unwrap(),
        vec![0x89, b'P', b'N', b'G']
    );
}

#[tokio::test]
async fn test_ingest_round_trip() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(
        &[
            ("a/", b""),
            ("a/index.html", b"<html>alpha</html>"),
            ("a/b/data.txt", b"raw data\n"),
        ],
        CompressionMethod::Deflated,
    );

    let outcome = upload(&hub, "alpha", "run1", &archive, None, false)
        .await
        .unwrap();

    let staged = temp.path().join("public/projects/alpha/run1.zip");
    assert_eq!(outcome.archive, staged.display().to_string());
    assert!(!staged.exists(), "uploaded archive is deleted");
    assert_eq!(outcome.index_file.as_deref(), Some("a/index.html"));
    assert_eq!(
        outcome.deep_link.as_deref(),
        Some("http://localhost:3000/projects/alpha/#run1")
    );

    let dir = report_dir(temp.path(), "alpha", "run1");
    assert_eq!(std::fs::read(dir.join("a/index.html")).unwrap(), b"<html>alpha</html>");
    assert_eq!(std::fs::read(dir.join("a/b/data.txt")).unwrap(), b"raw data\n");

    let meta: Value =
        serde_json::from_slice(&std::fs::read(dir.join(".meta.json")).unwrap()).unwrap();
    assert_eq!(meta["name"], "run1");
    assert_eq!(meta["reportType"], "nexial");
    assert_eq!(meta["indexFile"], "a/index.html");

    let reports = hub.list_reports("alpha", ReportKind::Nexial).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].index_uri.as_deref(),
        Some("/projects/alpha/run1/a/index.html")
    );
}

#[tokio::test]
async fn test_shallowest_index_is_entry_point() {
    let (_temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(
        &[("y/z/index.html", b"deep"), ("x/index.html", b"top")],
        CompressionMethod::Stored,
    );

    let outcome = upload(&hub, "alpha", "run1", &archive, None, false)
        .await
        .unwrap();
    assert_eq!(outcome.index_file.as_deref(), Some("x/index.html"));
}

#[tokio::test]
async fn test_report_without_index_has_no_link() {
    let (_temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(&[("results.jtl", b"1,2,3")], CompressionMethod::Deflated);

    let outcome = upload(&hub, "alpha", "perf", &archive, Some(ReportKind::Jmeter), false)
        .await
        .unwrap();
    assert_eq!(outcome.deep_link, None);

    let reports = hub.list_reports("alpha", ReportKind::Jmeter).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].index_uri, None);
}

#[tokio::test]
async fn test_listing_filters_kind_and_hides_incomplete_reports() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(&[("index.html", b"x")], CompressionMethod::Stored);

    upload(&hub, "alpha", "r-b", &archive, Some(ReportKind::Nexial), false)
        .await
        .unwrap();
    upload(&hub, "alpha", "r-a", &archive, Some(ReportKind::Nexial), false)
        .await
        .unwrap();
    upload(&hub, "alpha", "perf", &archive, Some(ReportKind::Jmeter), false)
        .await
        .unwrap();

    // a report directory without descriptor, and one with a broken descriptor
    std::fs::create_dir_all(report_dir(temp.path(), "alpha", "half-done")).unwrap();
    let broken = report_dir(temp.path(), "alpha", "broken");
    std::fs::create_dir_all(&broken).unwrap();
    std::fs::write(broken.join(".meta.json"), b"{not json").unwrap();

    let names: Vec<_> = hub
        .list_reports("alpha", ReportKind::Nexial)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.name)
        .collect();
    assert_eq!(names, vec!["r-a", "r-b"]);

    let err = hub
        .list_reports("missing", ReportKind::Nexial)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);
}

#[tokio::test]
async fn test_existing_report_needs_override() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let first = build_zip(&[("old.txt", b"old")], CompressionMethod::Stored);
    let second = build_zip(&[("index.html", b"new")], CompressionMethod::Stored);

    upload(&hub, "alpha", "run1", &first, None, false).await.unwrap();

    let err = upload(&hub, "alpha", "run1", &second, None, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Conflict);

    upload(&hub, "alpha", "run1", &second, None, true)
        .await
        .unwrap();
    let dir = report_dir(temp.path(), "alpha", "run1");
    assert!(!dir.join("old.txt").exists(), "override replaces the whole report");
    assert_eq!(std::fs::read(dir.join("index.html")).unwrap(), b"new");
    // override destroys rather than quarantines
    assert!(!temp.path().join(".lostandfound").exists());
}

#[tokio::test]
async fn test_failed_extraction_leaves_report_invisible() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let mut archive = build_zip(
        &[("index.html", b"ok"), ("data.txt", b"SOME-BYTES-TO-BREAK")],
        CompressionMethod::Stored,
    );
    let at = archive
        .windows(19)
        .position(|w| w == b"SOME-BYTES-TO-BREAK")
        .unwrap();
    archive[at + 3] ^= 0x20;

    let err = upload(&hub, "alpha", "broken", &archive, None, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Extraction);

    let dir = report_dir(temp.path(), "alpha", "broken");
    assert!(!dir.join(".meta.json").exists());
    assert!(
        temp.path().join("public/projects/alpha/broken.zip").exists(),
        "failed uploads are kept"
    );
    assert!(hub
        .list_reports("alpha", ReportKind::Nexial)
        .await
        .unwrap()
        .is_empty());

    let truncated = build_zip(&[("index.html", b"ok")], CompressionMethod::Stored);
    let err = upload(&hub, "alpha", "cut", &truncated[..truncated.len() - 30], None, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Extraction);
}

#[tokio::test]
async fn test_ingest_validation() {
    let (_temp, hub) = setup();
    let archive = build_zip(&[("index.html", b"x")], CompressionMethod::Stored);

    let err = upload(&hub, "nope", "run1", &archive, None, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);

    create_project(&hub, "alpha").await;
    let err = hub
        .stage_upload("alpha", "report.tar.gz", &archive[..])
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Validation);

    let err = hub
        .ingest_report(IngestRequest {
            project: "alpha".to_string(),
            report: "bad{id}".to_string(),
            archive: ArchiveSource::File(
                hub.stage_upload("alpha", "ok.zip", &archive[..]).await.unwrap(),
            ),
            kind: None,
            override_existing: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Validation);

    let err = hub
        .ingest_report(IngestRequest {
            project: "alpha".to_string(),
            report: "run1".to_string(),
            archive: ArchiveSource::File(PathBuf::from("/definitely/not/here.zip")),
            kind: None,
            override_existing: false,
        })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);
}

#[tokio::test]
async fn test_remove_report_quarantines_once() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(&[("index.html", b"x")], CompressionMethod::Stored);
    upload(&hub, "alpha", "run1", &archive, None, false).await.unwrap();

    let moved = hub.remove_report("alpha", "run1").await.unwrap();
    assert!(moved.starts_with(temp.path().join(".lostandfound/alpha")));
    assert!(moved.join("index.html").exists());
    assert!(!report_dir(temp.path(), "alpha", "run1").exists());
    assert!(hub
        .list_reports("alpha", ReportKind::Nexial)
        .await
        .unwrap()
        .is_empty());

    let err = hub.remove_report("alpha", "run1").await.unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);
}

#[tokio::test]
async fn test_repeated_removal_keeps_every_copy() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let archive = build_zip(&[("index.html", b"x")], CompressionMethod::Stored);

    upload(&hub, "alpha", "run1", &archive, None, false).await.unwrap();
    hub.remove_report("alpha", "run1").await.unwrap();
    upload(&hub, "alpha", "run1", &archive, None, false).await.unwrap();
    hub.remove_report("alpha", "run1").await.unwrap();

    let entries = quarantined(temp.path(), "alpha");
    assert_eq!(entries.len(), 2, "{entries:?}");
    assert!(entries.iter().all(|name| name.starts_with("run1.")));
}

#[tokio::test]
async fn test_remove_project() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    create_project(&hub, "beta").await;

    let moved = hub.remove_project("alpha").await.unwrap();
    assert_eq!(moved.parent().unwrap(), temp.path().join(".lostandfound"));
    assert!(moved.join(".meta.json").exists());

    let ids: Vec<_> = hub
        .list_projects()
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(ids, vec!["beta"]);

    let err = hub.remove_project("alpha").await.unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);
    let err = hub.project("alpha").await.unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::NotFound);
}

#[tokio::test]
async fn test_archive_cannot_supply_its_own_descriptor() {
    let (temp, hub) = setup();
    create_project(&hub, "alpha").await;
    let forged: &[u8] = br#"{"name":"forged","reportType":"nexial","created":1}"#;

    let mut broken = build_zip(
        &[
            (".meta.json", forged),
            ("index.html", b"ok"),
            ("data.txt", b"SOME-BYTES-TO-BREAK"),
        ],
        CompressionMethod::Stored,
    );
    let at = broken
        .windows(19)
        .position(|w| w == b"SOME-BYTES-TO-BREAK")
        .unwrap();
    broken[at] ^= 0x20;

    let err = upload(&hub, "alpha", "broken", &broken, None, false)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), HubErrorKind::Extraction);
    assert!(!report_dir(temp.path(), "alpha", "broken").join(".meta.json").exists());
    assert!(hub
        .list_reports("alpha", ReportKind::Nexial)
        .await
        .unwrap()
        .is_empty());

    // on success the hub's own descriptor wins
    let fine = build_zip(
        &[(".meta.json", forged), ("index.html", b"ok")],
        CompressionMethod::Stored,
    );
    upload(&hub, "alpha", "run1", &fine, Some(ReportKind::Jmeter), false)
        .await
        .unwrap();
    let reports = hub.list_reports("alpha", ReportKind::Jmeter).await.unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].name, "run1");
}
