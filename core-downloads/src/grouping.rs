//! Day-grouped view of the download queue.

use chrono::{NaiveDate, TimeZone};
use std::collections::BTreeMap;

use crate::models::DownloadRecord;

/// Records enqueued on one local calendar day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayGroup {
    pub day: NaiveDate,
    /// Newest post first; ties broken by id
    pub records: Vec<DownloadRecord>,
}

/// Bucket records by the local day of `enqueued_at` in `tz`.
///
/// Buckets are ordered newest day first. Inside a bucket records are sorted
/// by the post's `published_at` descending, then by id, so the output does
/// not depend on the input order.
pub fn group_by_day<'a, Tz, I>(records: I, tz: &Tz) -> Vec<DayGroup>
where
    Tz: TimeZone,
    I: IntoIterator<Item = &'a DownloadRecord>,
{
    let mut buckets: BTreeMap<NaiveDate, Vec<DownloadRecord>> = BTreeMap::new();
    for record in records {
        let day = record.enqueued_at.with_timezone(tz).date_naive();
        buckets.entry(day).or_default().push(record.clone());
    }

    buckets
        .into_iter()
        .rev()
        .map(|(day, mut records)| {
            records.sort_by(|a, b| {
                b.post
                    .published_at
                    .cmp(&a.post.published_at)
                    .then_with(|| a.id.cmp(&b.id))
            });
            DayGroup { day, records }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DownloadReason, PostSnapshot};
    use chrono::{DateTime, Duration, FixedOffset, Utc};

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339).unwrap().with_timezone(&Utc)
    }

    fn record(id: &str, published: &str, enqueued: &str) -> DownloadRecord {
        let post = PostSnapshot::new(id, "c-1", at(published))
            .with_media_url(format!("https://cdn.example.com/{}.mp3", id));
        DownloadRecord::new(post, DownloadReason::Manual, at(enqueued)).unwrap()
    }

    fn ids(group: &DayGroup) -> Vec<&str> {
        group.records.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_groups_newest_day_first_and_sorts_by_publication() {
        let records = vec![
            record("a", "2024-03-01T08:00:00Z", "2024-03-10T09:00:00Z"),
            record("b", "2024-03-05T08:00:00Z", "2024-03-10T18:00:00Z"),
            record("c", "2024-03-02T08:00:00Z", "2024-03-11T07:00:00Z"),
        ];

        let groups = group_by_day(&records, &Utc);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].day, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(ids(&groups[0]), vec!["c"]);
        assert_eq!(groups[1].day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());
        assert_eq!(ids(&groups[1]), vec!["b", "a"]);
    }

    #[test]
    fn test_local_day_boundary_follows_timezone() {
        let records = vec![record("late", "2024-03-01T08:00:00Z", "2024-03-10T23:30:00Z")];

        let utc = group_by_day(&records, &Utc);
        assert_eq!(utc[0].day, NaiveDate::from_ymd_opt(2024, 3, 10).unwrap());

        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        let local = group_by_day(&records, &tokyo);
        assert_eq!(local[0].day, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
    }

    #[test]
    fn test_output_is_independent_of_input_order() {
        let base = at("2024-03-10T10:00:00Z");
        let mut records: Vec<DownloadRecord> = (0..6)
            .map(|i| {
                let mut r = record(
                    &format!("p-{}", i),
                    "2024-03-01T00:00:00Z",
                    "2024-03-10T10:00:00Z",
                );
                r.enqueued_at = base + Duration::hours(i * 7);
                r
            })
            .collect();

        let forward = group_by_day(&records, &Utc);
        records.reverse();
        let backward = group_by_day(&records, &Utc);
        assert_eq!(forward, backward);

        // Same publication time everywhere, so ids decide.
        for group in &forward {
            let mut sorted = ids(group);
            sorted.sort();
            assert_eq!(ids(group), sorted);
        }
    }

    #[test]
    fn test_empty_input() {
        let records: Vec<DownloadRecord> = Vec::new();
        assert!(group_by_day(&records, &Utc).is_empty());
    }
}
