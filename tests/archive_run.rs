//! End-to-end archive runs against a scripted mailbox
//!
//! These tests drive [`Archiver::run`] over whole months and check what lands
//! on disk: one zip per month, the progress ledger, and the remote calls made
//! (or not made) on a rerun.

mod common;

use std::fs;
use std::io::Read;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use common::{
    APRIL_DATES, MARCH_DATES, MockMailbox, archiver_for, email_with_attachment, fast_config,
    plain_email,
};
use mail_archiver::{DateRange, Error, Event, ServiceError};

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn spring_mailbox() -> Arc<MockMailbox> {
    let mailbox = Arc::new(MockMailbox::new());
    for (i, (date, d)) in MARCH_DATES.iter().zip([1, 15, 31]).enumerate() {
        mailbox.insert(
            &format!("mar{i}"),
            day(2024, 3, d),
            plain_email("Alice <alice@example.com>", &format!("march-{i}"), date, "hello"),
        );
    }
    for (i, (date, d)) in APRIL_DATES.iter().zip([1, 30]).enumerate() {
        mailbox.insert(
            &format!("apr{i}"),
            day(2024, 4, d),
            plain_email("Bob <bob@example.com>", &format!("april-{i}"), date, "hi"),
        );
    }
    mailbox
}

fn zip_entries(path: &std::path::Path) -> Vec<String> {
    let file = fs::File::open(path).unwrap();
    let archive = zip::ZipArchive::new(file).unwrap();
    let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
    names.sort();
    names
}

#[tokio::test]
async fn two_months_produce_two_archives_and_ledger_entries() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    let archiver = archiver_for(fast_config(dir.path()), mailbox.clone());

    let range = DateRange::parse("03-01-2024", "04-30-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.total_emails, 5);
    assert_eq!(stats.emails_archived, 5);
    assert_eq!(stats.partitions_completed, 2);
    assert_eq!(stats.archives_created, 2);

    let ledger = fs::read_to_string(dir.path().join("completed_partitions.txt")).unwrap();
    assert_eq!(ledger, "2024/03\n2024/04\n");

    assert!(dir.path().join("2024/03.zip").is_file());
    assert!(dir.path().join("2024/04.zip").is_file());
    assert!(!dir.path().join("2024/03").exists());
    assert!(!dir.path().join("2024/04").exists());

    let march = zip_entries(&dir.path().join("2024/03.zip"));
    assert_eq!(march.iter().filter(|n| n.ends_with("/email.txt")).count(), 3);
    assert_eq!(march.iter().filter(|n| n.ends_with("/headers.txt")).count(), 3);

    let queries = mailbox.list_queries();
    assert!(queries[0].contains("after:2024/03/01 before:2024/04/01"));
    assert!(queries[1].contains("after:2024/04/01 before:2024/05/01"));
}

#[tokio::test]
async fn partial_month_range_narrows_query() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    let archiver = archiver_for(fast_config(dir.path()), mailbox.clone());

    let range = DateRange::parse("03-10-2024", "03-20-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.emails_archived, 1);
    assert!(mailbox.list_queries()[0].contains("after:2024/03/10 before:2024/03/21"));
}

#[tokio::test]
async fn rerun_skips_ledgered_month_without_remote_calls() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("completed_partitions.txt"), "2024/03\n").unwrap();
    let mailbox = spring_mailbox();
    let archiver = archiver_for(fast_config(dir.path()), mailbox.clone());

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.partitions_skipped, 1);
    assert!(mailbox.list_queries().is_empty());
    assert_eq!(mailbox.get_count(), 0);
    assert!(!dir.path().join("2024/03.zip").exists());
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    let range = DateRange::parse("03-01-2024", "04-30-2024").unwrap();

    archiver_for(fast_config(dir.path()), mailbox.clone())
        .run(&range)
        .await
        .unwrap();
    let gets_after_first = mailbox.get_count();

    let stats = archiver_for(fast_config(dir.path()), mailbox.clone())
        .run(&range)
        .await
        .unwrap();

    assert_eq!(stats.partitions_skipped, 2);
    assert_eq!(mailbox.get_count(), gets_after_first);
}

#[tokio::test]
async fn existing_archive_is_skipped_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("2024")).unwrap();
    fs::write(dir.path().join("2024/03.zip"), b"placeholder").unwrap();
    let mailbox = spring_mailbox();
    let archiver = archiver_for(fast_config(dir.path()), mailbox.clone());
    let mut events = archiver.subscribe();

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.partitions_skipped, 1);
    assert_eq!(mailbox.get_count(), 0);
    assert_eq!(
        fs::read(dir.path().join("2024/03.zip")).unwrap(),
        b"placeholder"
    );
    let ledger = fs::read_to_string(dir.path().join("completed_partitions.txt")).unwrap();
    assert_eq!(ledger, "2024/03\n");
    assert!(matches!(
        events.try_recv().unwrap(),
        Event::PartitionSkipped { .. }
    ));
}

#[tokio::test]
async fn attachments_are_extracted_into_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MockMailbox::new());
    mailbox.insert(
        "att1",
        day(2024, 3, 5),
        email_with_attachment(
            "carol@example.com",
            "Tue, 05 Mar 2024 10:00:00 +0000",
            "report.pdf",
        ),
    );
    let archiver = archiver_for(fast_config(dir.path()), mailbox);

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();
    assert_eq!(stats.attachments_saved, 1);

    let zip_path = dir.path().join("2024/03.zip");
    let names = zip_entries(&zip_path);
    assert!(names.iter().any(|n| n.ends_with("/email.txt")));
    assert!(names.iter().any(|n| n.ends_with("/email.html")));
    let pdf = names.iter().find(|n| n.ends_with("/report.pdf")).unwrap();

    let mut archive = zip::ZipArchive::new(fs::File::open(&zip_path).unwrap()).unwrap();
    let mut data = Vec::new();
    archive.by_name(pdf).unwrap().read_to_end(&mut data).unwrap();
    assert!(data.starts_with(b"%PDF-1.4"));
}

#[tokio::test]
async fn rate_limited_fetch_backs_off_then_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = Arc::new(MockMailbox::new());
    mailbox.insert(
        "slow",
        day(2024, 3, 15),
        plain_email("a@example.com", "slow", MARCH_DATES[1], "body"),
    );
    mailbox.fail_get("slow", [ServiceError::RateLimited, ServiceError::RateLimited]);

    let mut config = fast_config(dir.path());
    config.retry.initial_delay = Duration::from_millis(20);
    config.retry.max_delay = Duration::from_secs(1);
    let archiver = archiver_for(config, mailbox.clone());

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let start = Instant::now();
    let stats = archiver.run(&range).await.unwrap();

    // 20ms then 40ms of backoff
    assert!(start.elapsed() >= Duration::from_millis(60));
    assert_eq!(stats.emails_archived, 1);
    assert_eq!(stats.fetch_failures, 0);
    assert_eq!(mailbox.get_count_for("slow"), 3);
}

#[tokio::test]
async fn rate_limited_listing_pauses_and_resumes() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    mailbox.fail_list([ServiceError::RateLimited]);
    let archiver = archiver_for(fast_config(dir.path()), mailbox.clone());

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.emails_archived, 3);
    assert_eq!(mailbox.list_queries().len(), 2);
}

#[tokio::test]
async fn persistent_failure_is_counted_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    mailbox.fail_get(
        "mar1",
        [ServiceError::Rejected {
            status: 500,
            message: "Backend Error".into(),
        }],
    );
    let archiver = archiver_for(fast_config(dir.path()), mailbox);

    let range = DateRange::parse("03-01-2024", "03-31-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.emails_archived, 2);
    assert_eq!(stats.fetch_failures, 1);
    assert_eq!(stats.partitions_completed, 1);
}

#[tokio::test]
async fn delete_after_archive_empties_the_mailbox() {
    let dir = tempfile::tempdir().unwrap();
    let mailbox = spring_mailbox();
    let mut config = fast_config(dir.path());
    config.archive.delete_after_archive = true;
    let archiver = archiver_for(config, mailbox.clone());

    let range = DateRange::parse("03-01-2024", "04-30-2024").unwrap();
    let stats = archiver.run(&range).await.unwrap();

    assert_eq!(stats.emails_deleted, 5);
    assert_eq!(mailbox.delete_batches(), vec![3, 2]);
    assert_eq!(mailbox.remaining(), 0);
}

#[tokio::test]
async fn cancelled_run_leaves_month_unrecorded() {
    let dir = tempfile::tempdir().unwrap();
    let archiver = archiver_for(fast_config(dir.path()), spring_mailbox());
    archiver.cancellation_token().cancel();

    let range = DateRange::parse("03-01-2024", "04-30-2024").unwrap();
    let result = archiver.run(&range).await;

    assert!(matches!(result, Err(Error::Cancelled)));
    let ledger = fs::read_to_string(dir.path().join("completed_partitions.txt")).unwrap();
    assert!(ledger.is_empty());
}

#[test]
fn reversed_range_is_rejected() {
    assert!(matches!(
        DateRange::parse("04-30-2024", "03-01-2024"),
        Err(Error::InvalidRange { .. })
    ));
}
